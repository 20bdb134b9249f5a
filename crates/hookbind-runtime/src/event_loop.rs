#![forbid(unsafe_code)]

//! The single-threaded loop that owns bindings.
//!
//! All control mutation and all guard/gate logic run on one [`EventLoop`].
//! Other threads never touch a coordinator directly: a state change made on a
//! background thread lands in the coordinator's inbox channel and the thread
//! wakes the loop through a [`LoopHandle`]. The loop drains inboxes and fires
//! due debounce deadlines on each [`tick`](EventLoop::tick).
//!
//! # How It Works
//!
//! 1. Coordinators register themselves as [`Pump`]s (held weakly).
//! 2. [`LoopHandle::wake`] and [`LoopHandle::invoke`] send messages over an
//!    `mpsc` channel; any thread may hold a handle.
//! 3. `tick()` runs queued `invoke` closures, then pumps every live
//!    coordinator once.
//! 4. [`run_for`](EventLoop::run_for) repeats ticks and sleeps until the next
//!    debounce deadline or message, never past its budget.
//!
//! # Failure Modes
//!
//! A panic inside an invoked closure or a pump is caught and logged; the rest
//! of the tick proceeds.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use web_time::Instant;

use crate::clock::{Clock, SystemClock};
use crate::panic_message;

/// Upper bound on ticks performed by one [`EventLoop::run_until_idle`] call.
pub const MAX_IDLE_TICKS: usize = 10_000;

/// Work source driven by an [`EventLoop`].
pub trait Pump {
    /// Process queued work. Returns the number of items handled.
    fn pump(&self) -> usize;

    /// Earliest instant at which the pump has deferred work.
    fn next_deadline(&self) -> Option<Instant>;

    /// Whether the pump is finished and may be dropped from the loop.
    fn is_finished(&self) -> bool;
}

enum LoopMessage {
    Wake,
    Invoke(Box<dyn FnOnce() + Send>),
}

/// `Send + Clone` handle to an [`EventLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    tx: mpsc::Sender<LoopMessage>,
}

impl LoopHandle {
    /// Wake the loop. Returns `false` if the loop is gone.
    pub fn wake(&self) -> bool {
        self.tx.send(LoopMessage::Wake).is_ok()
    }

    /// Run `f` on the loop during its next tick. Returns `false` if the loop
    /// is gone (and `f` will never run).
    pub fn invoke(&self, f: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(LoopMessage::Invoke(Box::new(f))).is_ok()
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle").finish_non_exhaustive()
    }
}

/// What one [`EventLoop::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Wake messages received.
    pub wakes: usize,
    /// Invoked closures run.
    pub invoked: usize,
    /// Work items handled by pumps.
    pub work: usize,
    /// Live pumps after pruning.
    pub pumps: usize,
}

impl TickReport {
    /// Whether the tick ran neither closures nor pump work.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.invoked == 0 && self.work == 0
    }
}

struct LoopInner {
    clock: Arc<dyn Clock>,
    tx: mpsc::Sender<LoopMessage>,
    rx: mpsc::Receiver<LoopMessage>,
    backlog: RefCell<VecDeque<LoopMessage>>,
    pumps: RefCell<Vec<Weak<dyn Pump>>>,
    ticks: Cell<u64>,
}

/// Cooperative event loop owning coordinators. Not `Send`; cloning shares
/// the same loop.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<LoopInner>,
}

impl EventLoop {
    /// A loop on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// A loop on `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            inner: Rc::new(LoopInner {
                clock,
                tx,
                rx,
                backlog: RefCell::new(VecDeque::new()),
                pumps: RefCell::new(Vec::new()),
                ticks: Cell::new(0),
            }),
        }
    }

    /// The loop's clock.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    /// Current time on the loop's clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.inner.clock.now()
    }

    /// A handle other threads can use to wake this loop.
    #[must_use]
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            tx: self.inner.tx.clone(),
        }
    }

    /// Register a pump. The loop holds it weakly and drops it once it is
    /// finished or deallocated.
    pub fn register(&self, pump: Weak<dyn Pump>) {
        self.inner.pumps.borrow_mut().push(pump);
    }

    /// Number of live pumps.
    #[must_use]
    pub fn pump_count(&self) -> usize {
        self.live_pumps().len()
    }

    /// Ticks performed so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.get()
    }

    /// Run queued closures, then pump every live coordinator once.
    pub fn tick(&self) -> TickReport {
        self.inner.ticks.set(self.inner.ticks.get() + 1);
        let mut report = TickReport::default();

        let mut messages: Vec<LoopMessage> = self.inner.backlog.borrow_mut().drain(..).collect();
        while let Ok(message) = self.inner.rx.try_recv() {
            messages.push(message);
        }
        for message in messages {
            match message {
                LoopMessage::Wake => report.wakes += 1,
                LoopMessage::Invoke(f) => {
                    report.invoked += 1;
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
                        tracing::error!(
                            panic = %panic_message(payload.as_ref()),
                            "invoked closure panicked"
                        );
                    }
                }
            }
        }

        let pumps = self.live_pumps();
        report.pumps = pumps.len();
        for pump in pumps {
            match panic::catch_unwind(AssertUnwindSafe(|| pump.pump())) {
                Ok(work) => report.work += work,
                Err(payload) => tracing::error!(
                    panic = %panic_message(payload.as_ref()),
                    "binding pump panicked"
                ),
            }
        }

        if !report.is_idle() {
            tracing::trace!(
                invoked = report.invoked,
                work = report.work,
                pumps = report.pumps,
                "event loop tick"
            );
        }
        report
    }

    /// Tick until a tick does no work. Returns the number of busy ticks.
    pub fn run_until_idle(&self) -> usize {
        let mut busy = 0;
        while busy < MAX_IDLE_TICKS {
            if self.tick().is_idle() {
                return busy;
            }
            busy += 1;
        }
        tracing::warn!(ticks = busy, "event loop did not settle; giving up");
        busy
    }

    /// Earliest deferred deadline across live pumps.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.live_pumps()
            .iter()
            .filter_map(|p| p.next_deadline())
            .min()
    }

    /// Process work for `budget` of real time, sleeping until the next
    /// deadline or message in between.
    pub fn run_for(&self, budget: Duration) {
        let real_end = Instant::now() + budget;
        loop {
            self.run_until_idle();
            let real_now = Instant::now();
            if real_now >= real_end {
                return;
            }
            let mut wait = real_end - real_now;
            if let Some(deadline) = self.next_deadline() {
                wait = wait.min(deadline.saturating_duration_since(self.now()));
            }
            match self.inner.rx.recv_timeout(wait) {
                Ok(message) => self.inner.backlog.borrow_mut().push_back(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    fn live_pumps(&self) -> Vec<Rc<dyn Pump>> {
        let mut pumps = self.inner.pumps.borrow_mut();
        let mut live = Vec::with_capacity(pumps.len());
        pumps.retain(|weak| match weak.upgrade() {
            Some(pump) if !pump.is_finished() => {
                live.push(pump);
                true
            }
            _ => false,
        });
        live
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("pumps", &self.inner.pumps.borrow().len())
            .field("ticks", &self.inner.ticks.get())
            .finish()
    }
}
