#![forbid(unsafe_code)]

//! The binding coordinator: two-way sync between one [`StateCell`] and one
//! [`GatedControl`].
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──bind──▶ Bound ──dispose / drop──▶ Disposed
//!                          │ ▲
//!                          └─┘ push (state→control), commit (control→state)
//! ```
//!
//! **state→control.** The cell callback only enqueues the new value on the
//! coordinator's inbox and wakes the loop. On the next tick the coordinator
//! opens its guard and writes the value through the gate, unless the control
//! already displays it.
//!
//! **control→state.** A user change seen while the guard is active is an
//! echo and is dropped. Otherwise it is validated: a rejected candidate is
//! reverted to the committed value; an accepted one is proposed to the
//! debouncer, which commits the last value of a burst with `cell.set` outside
//! the guard.
//!
//! # Failure Modes
//!
//! - Validation rejection: control reverted, `warn!` logged, and
//!   [`BindingError::ValidationRejected`] returned to explicit `submit`
//!   callers.
//! - Disposed: inbound notifications and deadlines are ignored; explicit API
//!   calls return [`BindingError::DisposedBindingUsed`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use web_time::Instant;

use super::cell::{StateCell, Subscription};
use super::control::{Control, GatedControl, ListenerId};
use super::debounce::{DebounceHandle, DebounceStats, Debouncer};
use super::gate::OpId;
use super::guard::ReentrancyGuard;
use crate::config::DebounceInterval;
use crate::error::BindingError;
use crate::event_loop::{EventLoop, LoopHandle, Pump};
use crate::panic_message;

/// Process-unique identifier of a coordinator, recorded on its spans.
pub type BindingId = u64;

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a [`Coordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Being wired up inside [`Coordinator::bind`].
    Uninitialized,
    /// Synchronizing.
    Bound,
    /// Torn down; inert.
    Disposed,
}

/// Counters describing a coordinator's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindingStats {
    /// Values written into the control.
    pub pushes: u64,
    /// Pushes skipped because the control already displayed the value.
    pub skipped_pushes: u64,
    /// Pushes refused by the gate.
    pub failed_pushes: u64,
    /// Control events dropped because the guard was active.
    pub echoes_suppressed: u64,
    /// User edits observed outside the guard.
    pub user_edits: u64,
    /// Candidates refused by the validator.
    pub rejections: u64,
    /// Values written into the cell.
    pub commits: u64,
}

/// Check applied to candidates on the control→state path.
pub struct Validator<V> {
    check: Rc<dyn Fn(&V) -> Result<(), String>>,
}

impl<V> Clone for Validator<V> {
    fn clone(&self) -> Self {
        Self {
            check: Rc::clone(&self.check),
        }
    }
}

impl<V: 'static> Validator<V> {
    /// A validator returning a rejection reason.
    pub fn new(check: impl Fn(&V) -> Result<(), String> + 'static) -> Self {
        Self {
            check: Rc::new(check),
        }
    }

    /// A validator from a boolean predicate.
    pub fn predicate(accept: impl Fn(&V) -> bool + 'static) -> Self {
        Self::new(move |v| {
            if accept(v) {
                Ok(())
            } else {
                Err(String::from("value refused by validator"))
            }
        })
    }

    /// Run the check. A panicking validator rejects the candidate.
    ///
    /// # Errors
    ///
    /// [`BindingError::ValidationRejected`] with the validator's reason.
    pub fn check(&self, candidate: &V) -> Result<(), BindingError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.check)(candidate))) {
            Ok(verdict) => verdict.map_err(BindingError::rejected),
            Err(payload) => {
                let reason = format!("validator panicked: {}", panic_message(payload.as_ref()));
                tracing::error!(%reason, "validator panicked; candidate rejected");
                Err(BindingError::rejected(reason))
            }
        }
    }
}

impl<V> fmt::Debug for Validator<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

/// Per-binding configuration.
pub struct BindingOptions<V> {
    debounce: DebounceInterval,
    validator: Option<Validator<V>>,
    label: Option<String>,
}

impl<V> Default for BindingOptions<V> {
    fn default() -> Self {
        Self {
            debounce: DebounceInterval::Default,
            validator: None,
            label: None,
        }
    }
}

impl<V: 'static> BindingOptions<V> {
    /// Default options: process-wide debounce, no validator, no label.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce interval.
    #[must_use]
    pub fn debounce(mut self, interval: impl Into<DebounceInterval>) -> Self {
        self.debounce = interval.into();
        self
    }

    /// Set the validator.
    #[must_use]
    pub fn validator(mut self, validator: Validator<V>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Shorthand for a predicate validator.
    #[must_use]
    pub fn validate(self, accept: impl Fn(&V) -> bool + 'static) -> Self {
        self.validator(Validator::predicate(accept))
    }

    /// Label recorded on this binding's log events.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl<V> fmt::Debug for BindingOptions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingOptions")
            .field("debounce", &self.debounce)
            .field("validator", &self.validator.is_some())
            .field("label", &self.label)
            .finish()
    }
}

struct CoordinatorInner<C: Control> {
    id: BindingId,
    label: Option<String>,
    cell: StateCell<C::Value>,
    control: GatedControl<C>,
    guard: ReentrancyGuard,
    debouncer: Debouncer<C::Value>,
    validator: RefCell<Option<Validator<C::Value>>>,
    inbox: mpsc::Receiver<C::Value>,
    waker: LoopHandle,
    open: Arc<AtomicBool>,
    accepted: RefCell<Option<C::Value>>,
    subscription: RefCell<Option<Subscription>>,
    listener: Cell<Option<ListenerId>>,
    state: Cell<BindingState>,
    committing: Cell<bool>,
    stats: Cell<BindingStats>,
}

impl<C: Control> CoordinatorInner<C> {
    fn is_disposed(&self) -> bool {
        self.state.get() == BindingState::Disposed
    }

    fn ensure_live(&self) -> Result<(), BindingError> {
        if self.is_disposed() {
            Err(BindingError::DisposedBindingUsed)
        } else {
            Ok(())
        }
    }

    fn bump(&self, f: impl FnOnce(&mut BindingStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    /// Guarded state→control write. Returns whether the control changed.
    fn push(&self, value: &C::Value) -> Result<bool, BindingError> {
        if self.is_disposed() {
            return Ok(false);
        }
        let _span = tracing::debug_span!(
            "hookbind.push",
            binding = self.id,
            label = self.label.as_deref()
        )
        .entered();
        let result = self.guard.run_guarded(|| {
            self.control.call(OpId::WRITE, |control| {
                if control.value() == *value {
                    false
                } else {
                    control.write(value);
                    true
                }
            })
        });
        match result {
            Ok(true) => {
                self.bump(|s| s.pushes += 1);
                tracing::trace!("pushed state into control");
            }
            Ok(false) => self.bump(|s| s.skipped_pushes += 1),
            Err(_) => self.bump(|s| s.failed_pushes += 1),
        }
        result
    }

    fn push_logged(&self, value: &C::Value) {
        if let Err(err) = self.push(value) {
            tracing::warn!(binding = self.id, %err, "push into control failed");
        }
    }

    fn on_user_change(&self, value: &C::Value) {
        if self.is_disposed() {
            return;
        }
        if self.guard.is_active() {
            self.bump(|s| s.echoes_suppressed += 1);
            tracing::trace!(binding = self.id, "echo suppressed");
            return;
        }
        self.bump(|s| s.user_edits += 1);
        // Rejections are already logged and reverted.
        let _ = self.propose(value.clone(), None);
    }

    fn validate(&self, value: &C::Value) -> Result<(), BindingError> {
        let validator = self.validator.borrow().clone();
        match validator {
            Some(validator) => validator.check(value),
            None => Ok(()),
        }
    }

    fn reject(&self, err: &BindingError) {
        self.bump(|s| s.rejections += 1);
        tracing::warn!(
            binding = self.id,
            label = self.label.as_deref(),
            %err,
            "validation rejected candidate; reverting control"
        );
        self.debouncer.cancel();
        self.accepted.borrow_mut().take();
        self.push_logged(&self.cell.get());
    }

    fn propose(&self, value: C::Value, interval: Option<Duration>) -> Result<(), BindingError> {
        self.ensure_live()?;
        if let Err(err) = self.validate(&value) {
            self.reject(&err);
            return Err(err);
        }
        *self.accepted.borrow_mut() = Some(value.clone());
        let outcome = match interval {
            Some(interval) => self.debouncer.propose_with(value, interval),
            None => self.debouncer.propose(value),
        };
        tracing::debug!(binding = self.id, ?outcome, "edit proposed");
        Ok(())
    }

    fn commit(&self, value: C::Value) {
        if self.is_disposed() {
            return;
        }
        if self.committing.replace(true) {
            tracing::warn!(binding = self.id, "re-entrant commit dropped");
            return;
        }
        let _turn = CommitTurn(&self.committing);
        // Values handed in through a `Proposer` skipped `propose`.
        let validated = self.accepted.borrow_mut().take();
        if validated.as_ref() != Some(&value) {
            if let Err(err) = self.validate(&value) {
                self.reject(&err);
                return;
            }
        }
        let _span = tracing::debug_span!(
            "hookbind.commit",
            binding = self.id,
            label = self.label.as_deref()
        )
        .entered();
        self.cell.set(value);
        self.bump(|s| s.commits += 1);
        tracing::debug!(version = self.cell.version(), "committed edit to state");
    }

    fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        self.open.store(false, Ordering::Release);
        let cancelled = self.debouncer.cancel();
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        if let Some(listener) = self.listener.take() {
            self.control.remove_listener(listener);
        }
        self.control.gate().detach();
        self.state.set(BindingState::Disposed);
        while self.inbox.try_recv().is_ok() {}
        tracing::debug!(
            binding = self.id,
            label = self.label.as_deref(),
            cancelled_pending = cancelled,
            "binding disposed"
        );
    }
}

/// Clears the `committing` flag on every exit from `commit`.
struct CommitTurn<'a>(&'a Cell<bool>);

impl Drop for CommitTurn<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<C: Control> Pump for CoordinatorInner<C> {
    fn pump(&self) -> usize {
        let mut work = 0;
        while let Ok(value) = self.inbox.try_recv() {
            if self.is_disposed() {
                continue;
            }
            self.push_logged(&value);
            work += 1;
        }
        if !self.is_disposed() && self.debouncer.fire_due() {
            work += 1;
        }
        work
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    fn is_finished(&self) -> bool {
        self.is_disposed()
    }
}

/// Binds one [`StateCell`] to one [`GatedControl`] on an [`EventLoop`].
///
/// Dropping the coordinator disposes it.
pub struct Coordinator<C: Control> {
    inner: Rc<CoordinatorInner<C>>,
}

impl<C: Control> Coordinator<C> {
    /// Bind `cell` and `control` and push the cell's current value into the
    /// control.
    ///
    /// # Errors
    ///
    /// [`BindingError::ControlAlreadyBound`] if another coordinator owns the
    /// control's gate.
    pub fn bind(
        event_loop: &EventLoop,
        cell: StateCell<C::Value>,
        control: GatedControl<C>,
        options: BindingOptions<C::Value>,
    ) -> Result<Self, BindingError> {
        let guard = ReentrancyGuard::new();
        control.gate().attach(&guard)?;

        let BindingOptions {
            debounce,
            validator,
            label,
        } = options;
        let (tx, inbox) = mpsc::channel();
        let clock = event_loop.clock();
        let waker = event_loop.handle();

        let inner = Rc::new_cyclic(|weak: &Weak<CoordinatorInner<C>>| {
            let weak = weak.clone();
            CoordinatorInner {
                id: NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed),
                label,
                cell: cell.clone(),
                control: control.clone(),
                guard,
                debouncer: Debouncer::new(debounce, clock, move |value| {
                    if let Some(inner) = weak.upgrade() {
                        inner.commit(value);
                    }
                }),
                validator: RefCell::new(validator),
                inbox,
                waker: waker.clone(),
                open: Arc::new(AtomicBool::new(true)),
                accepted: RefCell::new(None),
                subscription: RefCell::new(None),
                listener: Cell::new(None),
                state: Cell::new(BindingState::Uninitialized),
                committing: Cell::new(false),
                stats: Cell::new(BindingStats::default()),
            }
        });

        let weak = Rc::downgrade(&inner);
        let listener = control.on_user_change(move |value| {
            if let Some(inner) = weak.upgrade() {
                inner.on_user_change(value);
            }
        });
        inner.listener.set(Some(listener));

        let open = Arc::clone(&inner.open);
        let subscription = cell.subscribe(move |value| {
            if open.load(Ordering::Acquire) && tx.send(value.clone()).is_ok() {
                waker.wake();
            }
        });
        *inner.subscription.borrow_mut() = Some(subscription);

        let pump: Weak<CoordinatorInner<C>> = Rc::downgrade(&inner);
        let pump: Weak<dyn Pump> = pump;
        event_loop.register(pump);

        inner.state.set(BindingState::Bound);
        let binding = Self { inner };
        binding.inner.push(&cell.get())?;
        tracing::debug!(
            binding = binding.id(),
            label = binding.label(),
            "binding established"
        );
        Ok(binding)
    }

    /// Bind a fresh private cell holding `value`.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_value(
        event_loop: &EventLoop,
        value: C::Value,
        control: GatedControl<C>,
        options: BindingOptions<C::Value>,
    ) -> Result<Self, BindingError> {
        Self::bind(event_loop, StateCell::new(value), control, options)
    }

    /// Process-unique id.
    #[must_use]
    pub fn id(&self) -> BindingId {
        self.inner.id
    }

    /// Label given in [`BindingOptions::label`].
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BindingState {
        self.inner.state.get()
    }

    /// Whether the coordinator has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// The bound cell.
    #[must_use]
    pub fn cell(&self) -> &StateCell<C::Value> {
        &self.inner.cell
    }

    /// The bound control.
    #[must_use]
    pub fn control(&self) -> &GatedControl<C> {
        &self.inner.control
    }

    /// Whether a state→control push is in progress.
    #[must_use]
    pub fn is_pushing(&self) -> bool {
        self.inner.guard.is_active()
    }

    /// The committed value.
    ///
    /// # Errors
    ///
    /// [`BindingError::DisposedBindingUsed`] after disposal.
    pub fn value(&self) -> Result<C::Value, BindingError> {
        self.inner.ensure_live()?;
        Ok(self.inner.cell.get())
    }

    /// Propose `value` as if the user had entered it, using the binding's
    /// debounce interval.
    ///
    /// # Errors
    ///
    /// [`BindingError::ValidationRejected`] (the control is reverted) or
    /// [`BindingError::DisposedBindingUsed`].
    pub fn submit(&self, value: C::Value) -> Result<(), BindingError> {
        self.inner.propose(value, None)
    }

    /// Like [`submit`](Self::submit) with a one-off interval. A zero interval
    /// commits immediately.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub fn submit_with(&self, value: C::Value, interval: Duration) -> Result<(), BindingError> {
        self.inner.propose(value, Some(interval))
    }

    /// A `Send` handle proposing edits from other threads.
    ///
    /// Proposals share this binding's pending slot (last write wins) and are
    /// validated when they fire on the loop.
    #[must_use]
    pub fn proposer(&self) -> Proposer<C::Value> {
        Proposer {
            handle: self.inner.debouncer.handle(),
            waker: self.inner.waker.clone(),
            open: Arc::clone(&self.inner.open),
        }
    }

    /// Re-push the committed value into the control. Returns whether the
    /// control changed.
    ///
    /// # Errors
    ///
    /// [`BindingError::DisposedBindingUsed`], or a gate error.
    pub fn invalidate(&self) -> Result<bool, BindingError> {
        self.inner.ensure_live()?;
        self.inner.push(&self.inner.cell.get())
    }

    /// Run the gated operation `op` on the control inside this binding's
    /// update scope.
    ///
    /// If the operation leaves the control displaying something other than
    /// the committed value (e.g. the selected item was removed), the displayed
    /// value is proposed as an edit.
    ///
    /// # Errors
    ///
    /// [`BindingError::DisposedBindingUsed`], or a gate error.
    pub fn apply<R>(&self, op: OpId, f: impl FnOnce(&mut C) -> R) -> Result<R, BindingError> {
        self.inner.ensure_live()?;
        let result = self
            .inner
            .guard
            .run_guarded(|| self.inner.control.call(op, f))?;
        let shown = self.inner.control.value();
        if shown != self.inner.cell.get() {
            tracing::debug!(
                binding = self.inner.id,
                op = op.name(),
                "operation changed displayed value"
            );
            // A rejection reverts the control and is logged by `propose`.
            let _ = self.inner.propose(shown, None);
        }
        Ok(result)
    }

    /// Commit the pending edit now. Returns whether one was pending.
    ///
    /// # Errors
    ///
    /// [`BindingError::DisposedBindingUsed`] after disposal.
    pub fn flush(&self) -> Result<bool, BindingError> {
        self.inner.ensure_live()?;
        Ok(self.inner.debouncer.flush())
    }

    /// Whether an edit is waiting for its debounce deadline.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner.debouncer.is_pending()
    }

    /// Deadline of the pending edit, if any.
    #[must_use]
    pub fn pending_deadline(&self) -> Option<Instant> {
        self.inner.debouncer.next_deadline()
    }

    /// Change the debounce interval for future edits.
    ///
    /// # Errors
    ///
    /// [`BindingError::DisposedBindingUsed`] after disposal.
    pub fn set_debounce(&self, interval: impl Into<DebounceInterval>) -> Result<(), BindingError> {
        self.inner.ensure_live()?;
        self.inner.debouncer.set_interval(interval.into());
        Ok(())
    }

    /// Replace (or remove) the validator.
    ///
    /// # Errors
    ///
    /// [`BindingError::DisposedBindingUsed`] after disposal.
    pub fn set_validator(
        &self,
        validator: Option<Validator<C::Value>>,
    ) -> Result<(), BindingError> {
        self.inner.ensure_live()?;
        *self.inner.validator.borrow_mut() = validator;
        Ok(())
    }

    /// Snapshot of the binding counters.
    #[must_use]
    pub fn stats(&self) -> BindingStats {
        self.inner.stats.get()
    }

    /// Snapshot of the debouncer counters.
    #[must_use]
    pub fn debounce_stats(&self) -> DebounceStats {
        self.inner.debouncer.stats()
    }

    /// Tear the binding down. A pending edit never commits. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Alias of [`dispose`](Self::dispose).
    pub fn close(&self) {
        self.dispose();
    }
}

/// Proposes edits to a [`Coordinator`] from any thread.
///
/// See [`Coordinator::proposer`].
pub struct Proposer<V> {
    handle: DebounceHandle<V>,
    waker: LoopHandle,
    open: Arc<AtomicBool>,
}

impl<V> Proposer<V> {
    /// Propose `value` with the binding's debounce interval and wake the
    /// loop. Returns `false` once the binding is disposed.
    pub fn propose(&self, value: V) -> bool {
        if !self.open.load(Ordering::Acquire) {
            return false;
        }
        self.handle.propose(value);
        self.waker.wake();
        true
    }

    /// Whether the binding still accepts proposals.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl<V> Clone for Proposer<V> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            waker: self.waker.clone(),
            open: Arc::clone(&self.open),
        }
    }
}

impl<V> fmt::Debug for Proposer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proposer")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl<C: Control> Drop for Coordinator<C> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl<C: Control> fmt::Debug for Coordinator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
