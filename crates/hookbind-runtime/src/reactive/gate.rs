#![forbid(unsafe_code)]

//! Mutation gate: capability check in front of a control's mutating calls.
//!
//! A [`MutationGate`] knows which operations of its control change the
//! control's model (clear, insert, remove, set-text, ...). Those operations
//! only run while the trusted [`ReentrancyGuard`] is active, i.e. while the
//! owning coordinator is pushing state. Called from anywhere else they fail
//! with [`BindingError::GuardViolation`] and leave the control untouched.
//!
//! Operations the gate does not list pass through. Read-only queries and
//! user-input events never reach the gate at all.
//!
//! # Invariants
//!
//! 1. [`OpId::WRITE`] is always gated.
//! 2. A gate trusts at most one guard; attaching a different guard fails
//!    until the first one is detached.
//! 3. A detached (or never attached) gate refuses every gated operation.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;

use super::guard::ReentrancyGuard;
use crate::error::BindingError;

/// Identifier of a control operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(&'static str);

impl OpId {
    /// The coordinator's state→control write.
    pub const WRITE: OpId = OpId("write");

    /// Create an operation id.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The operation name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Per-control enforcement point for gated mutations.
pub struct MutationGate {
    trusted: RefCell<Option<ReentrancyGuard>>,
    allowed: HashSet<OpId>,
    violations: Cell<u64>,
}

impl MutationGate {
    /// Create a gate for the given model-mutating operations.
    /// [`OpId::WRITE`] is added implicitly.
    pub fn new(ops: impl IntoIterator<Item = OpId>) -> Self {
        let mut allowed: HashSet<OpId> = ops.into_iter().collect();
        allowed.insert(OpId::WRITE);
        Self {
            trusted: RefCell::new(None),
            allowed,
            violations: Cell::new(0),
        }
    }

    /// Whether `op` is subject to the guard check.
    #[must_use]
    pub fn is_gated(&self, op: OpId) -> bool {
        self.allowed.contains(&op)
    }

    /// Gated operations, sorted by name.
    #[must_use]
    pub fn gated_operations(&self) -> Vec<OpId> {
        let mut ops: Vec<OpId> = self.allowed.iter().copied().collect();
        ops.sort_unstable();
        ops
    }

    /// Trust `guard`. Re-attaching the same guard is a no-op.
    ///
    /// # Errors
    ///
    /// [`BindingError::ControlAlreadyBound`] if a different guard is trusted.
    pub fn attach(&self, guard: &ReentrancyGuard) -> Result<(), BindingError> {
        let mut trusted = self.trusted.borrow_mut();
        match trusted.as_ref() {
            Some(current) if current.ptr_eq(guard) => Ok(()),
            Some(_) => Err(BindingError::ControlAlreadyBound),
            None => {
                *trusted = Some(guard.clone());
                Ok(())
            }
        }
    }

    /// Stop trusting any guard. Returns `false` if none was attached.
    pub fn detach(&self) -> bool {
        self.trusted.borrow_mut().take().is_some()
    }

    /// Whether a guard is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.trusted.borrow().is_some()
    }

    /// Whether the trusted guard is currently active.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.trusted
            .borrow()
            .as_ref()
            .is_some_and(ReentrancyGuard::is_active)
    }

    /// Check whether `op` may run now.
    ///
    /// # Errors
    ///
    /// [`BindingError::GuardViolation`] if `op` is gated and the trusted
    /// guard is inactive or absent.
    pub fn check(&self, op: OpId) -> Result<(), BindingError> {
        if !self.is_gated(op) || self.is_open() {
            return Ok(());
        }
        self.violations.set(self.violations.get() + 1);
        tracing::warn!(
            op = op.name(),
            attached = self.is_attached(),
            "direct mutation of a bound control refused"
        );
        Err(BindingError::GuardViolation(op))
    }

    /// Run `thunk` if `op` may run now.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check). `thunk` is not called on error.
    pub fn guarded_call<R>(&self, op: OpId, thunk: impl FnOnce() -> R) -> Result<R, BindingError> {
        self.check(op)?;
        Ok(thunk())
    }

    /// Number of refused calls so far.
    #[must_use]
    pub fn violations(&self) -> u64 {
        self.violations.get()
    }
}

impl fmt::Debug for MutationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationGate")
            .field("gated", &self.gated_operations())
            .field("attached", &self.is_attached())
            .field("violations", &self.violations.get())
            .finish()
    }
}
