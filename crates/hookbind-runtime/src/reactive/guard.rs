#![forbid(unsafe_code)]

//! Re-entrancy guard for state→control pushes.
//!
//! A [`ReentrancyGuard`] is active exactly while its owner is writing state
//! into a control. Control events observed while it is active are echoes of
//! that write, not user edits, and must be ignored. Scopes are RAII tokens
//! ([`GuardScope`]); the guard closes on every exit path, including panics
//! unwinding through the scope.
//!
//! Nested scopes are counted: the guard stays active until the outermost
//! scope exits.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Depth-counted re-entrancy flag. Cloning shares the same counter.
#[derive(Clone, Default)]
pub struct ReentrancyGuard {
    depth: Rc<Cell<u32>>,
}

impl ReentrancyGuard {
    /// Create an inactive guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a guarded scope is currently open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.depth.get() > 0
    }

    /// Number of open scopes.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    /// Open a scope. The guard stays active until the returned token drops.
    #[must_use = "the guard closes as soon as the scope token is dropped"]
    pub fn enter(&self) -> GuardScope {
        self.depth.set(self.depth.get() + 1);
        GuardScope {
            depth: Rc::clone(&self.depth),
        }
    }

    /// Run `f` with the guard active.
    pub fn run_guarded<R>(&self, f: impl FnOnce() -> R) -> R {
        let _scope = self.enter();
        f()
    }

    /// Whether two handles share the same counter.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.depth, &other.depth)
    }
}

impl fmt::Debug for ReentrancyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrancyGuard")
            .field("depth", &self.depth.get())
            .finish()
    }
}

/// RAII token for an open guard scope.
#[must_use = "the guard closes as soon as the scope token is dropped"]
pub struct GuardScope {
    depth: Rc<Cell<u32>>,
}

impl Drop for GuardScope {
    fn drop(&mut self) {
        let depth = self.depth.get();
        debug_assert!(depth > 0, "guard scope closed more often than opened");
        self.depth.set(depth.saturating_sub(1));
    }
}

impl fmt::Debug for GuardScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardScope").finish_non_exhaustive()
    }
}
