#![forbid(unsafe_code)]

//! Test harness for hookbind.
//!
//! - [`Counter`] / [`NoisyCounter`]: minimal integer controls that count writes.
//! - [`NotificationLog`]: records every notification a cell delivers.
//! - [`Fixture`]: a manual-clock loop, a cell, a counting control and its coordinator.
//! - [`init_test_tracing`]: installs a test-writer subscriber once.

use std::sync::{Arc, Mutex, Once, PoisonError};
use std::time::Duration;

use hookbind_runtime::{
    BindingOptions, Control, Coordinator, DebounceInterval, EventLoop, GatedControl, ManualClock,
    OpId, StateCell, Subscription,
};
use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber writing through the test harness.
/// Filtered by `RUST_LOG`; later calls are no-ops.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Integer control that counts programmatic writes.
///
/// `EMITS` selects whether programmatic writes emit change signals.
#[derive(Debug, Default)]
pub struct CountingControl<const EMITS: bool> {
    value: i64,
    writes: u64,
    resets: u64,
}

/// Counter that stays quiet on programmatic writes.
pub type Counter = CountingControl<false>;

/// Counter that signals programmatic writes like a toolkit widget.
pub type NoisyCounter = CountingControl<true>;

impl<const EMITS: bool> CountingControl<EMITS> {
    /// Gated model operation: reset to zero.
    pub const RESET: OpId = RESET_OP;

    /// Simulated user edit.
    pub fn type_value(&mut self, value: i64) {
        self.value = value;
    }

    /// Programmatic writes received.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Model reset (gated by [`Self::RESET`]).
    pub fn reset(&mut self) {
        self.value = 0;
        self.resets += 1;
    }

    /// Resets performed.
    #[must_use]
    pub fn resets(&self) -> u64 {
        self.resets
    }
}

const RESET_OP: OpId = OpId::new("reset");

impl<const EMITS: bool> Control for CountingControl<EMITS> {
    type Value = i64;
    const GATED_OPS: &'static [OpId] = &[RESET_OP];
    const EMITS_ON_WRITE: bool = EMITS;

    fn value(&self) -> i64 {
        self.value
    }

    fn write(&mut self, value: &i64) {
        self.value = *value;
        self.writes += 1;
    }
}

/// Records the values a cell notifies, from any thread.
pub struct NotificationLog<T> {
    seen: Arc<Mutex<Vec<T>>>,
    _subscription: Subscription,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> NotificationLog<T> {
    /// Subscribe to `cell`.
    #[must_use]
    pub fn attach(cell: &StateCell<T>) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = cell.subscribe(move |v: &T| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(v.clone());
        });
        Self {
            seen,
            _subscription: subscription,
        }
    }

    /// Number of notifications.
    #[must_use]
    pub fn count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The notified values in order.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A deterministic binding setup on a [`ManualClock`].
pub struct Fixture<C: Control> {
    /// Drives time.
    pub clock: ManualClock,
    /// The loop owning the coordinator.
    pub event_loop: EventLoop,
    /// The bound cell.
    pub cell: StateCell<C::Value>,
    /// The bound control.
    pub control: GatedControl<C>,
    /// The coordinator.
    pub binding: Coordinator<C>,
}

impl<C: Control> Fixture<C> {
    /// Bind `control` to a new cell holding `initial`, debounced by
    /// `debounce_ms`.
    ///
    /// # Panics
    ///
    /// If binding fails, which only happens for an already bound control.
    pub fn new(initial: C::Value, control: C, debounce_ms: u64) -> Self {
        Self::with_options(
            initial,
            control,
            BindingOptions::new().debounce(DebounceInterval::millis(debounce_ms)),
        )
    }

    /// Like [`new`](Self::new) with explicit options.
    ///
    /// # Panics
    ///
    /// If binding fails.
    pub fn with_options(
        initial: C::Value,
        control: C,
        options: BindingOptions<C::Value>,
    ) -> Self {
        let clock = ManualClock::new();
        let event_loop = EventLoop::with_clock(Arc::new(clock.clone()));
        let cell = StateCell::new(initial);
        let control = GatedControl::new(control);
        let binding = Coordinator::bind(&event_loop, cell.clone(), control.clone(), options)
            .expect("fresh control binds");
        Self {
            clock,
            event_loop,
            cell,
            control,
            binding,
        }
    }

    /// Advance the clock by `ms` and run the loop until idle.
    pub fn advance(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
        self.event_loop.run_until_idle();
    }

    /// Run the loop until idle without moving time.
    pub fn settle(&self) {
        self.event_loop.run_until_idle();
    }
}
