#![forbid(unsafe_code)]

//! Trailing-edge debounce of proposed commits.
//!
//! A [`Debouncer`] holds a single pending slot. Every [`propose`] replaces
//! the pending value and pushes the deadline out by the interval; once the
//! deadline passes, [`fire_due`] hands the *last* proposed value to the
//! commit callback exactly once. Intermediate values are discarded.
//!
//! The debouncer owns no timer thread. The event loop that owns it calls
//! [`fire_due`] on each tick and uses [`next_deadline`] to decide how long it
//! may sleep. Cancelling clears the slot under its lock, so a cancelled value
//! can never fire afterwards.
//!
//! # Cross-thread proposals
//!
//! [`handle`] returns a `Send + Sync` [`DebounceHandle`] sharing the same
//! slot. Proposals from any number of threads serialize on the slot lock with
//! last-write-wins semantics; the owning loop fires them.
//!
//! [`propose`]: Debouncer::propose
//! [`fire_due`]: Debouncer::fire_due
//! [`next_deadline`]: Debouncer::next_deadline
//! [`handle`]: Debouncer::handle

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use web_time::Instant;

use crate::clock::Clock;
use crate::config::DebounceInterval;
use crate::lock;

/// Counters describing a debouncer's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceStats {
    /// Values proposed.
    pub proposals: u64,
    /// Values handed to the commit callback.
    pub commits: u64,
    /// Pending values replaced by a newer proposal.
    pub superseded: u64,
    /// Pending values dropped by `cancel`.
    pub cancelled: u64,
}

/// Outcome of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proposal {
    /// The interval was zero; the value was committed synchronously.
    Committed,
    /// The value is pending until `deadline`.
    Scheduled {
        /// When the value fires unless superseded or cancelled.
        deadline: Instant,
    },
}

struct Slot<V> {
    pending: Option<V>,
    deadline: Option<Instant>,
    stats: DebounceStats,
}

impl<V> Slot<V> {
    fn schedule(&mut self, value: V, deadline: Instant) {
        self.stats.proposals += 1;
        if self.pending.replace(value).is_some() {
            self.stats.superseded += 1;
        }
        self.deadline = Some(deadline);
    }

    fn take(&mut self) -> Option<V> {
        self.deadline = None;
        let value = self.pending.take();
        if value.is_some() {
            self.stats.commits += 1;
        }
        value
    }

    fn clear(&mut self) -> bool {
        self.deadline = None;
        let had = self.pending.take().is_some();
        if had {
            self.stats.cancelled += 1;
        }
        had
    }
}

/// Single-slot trailing-edge debouncer. Lives on the owning event loop.
pub struct Debouncer<V> {
    slot: Arc<Mutex<Slot<V>>>,
    interval: Arc<ArcSwap<DebounceInterval>>,
    clock: Arc<dyn Clock>,
    on_commit: Box<dyn Fn(V)>,
}

impl<V: Send + 'static> Debouncer<V> {
    /// Create a debouncer that passes fired values to `on_commit`.
    pub fn new(
        interval: DebounceInterval,
        clock: Arc<dyn Clock>,
        on_commit: impl Fn(V) + 'static,
    ) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                pending: None,
                deadline: None,
                stats: DebounceStats::default(),
            })),
            interval: Arc::new(ArcSwap::from_pointee(interval)),
            clock,
            on_commit: Box::new(on_commit),
        }
    }

    /// The configured interval policy.
    #[must_use]
    pub fn interval(&self) -> DebounceInterval {
        DebounceInterval::clone(&self.interval.load())
    }

    /// Replace the interval policy. A pending value keeps its deadline.
    pub fn set_interval(&self, interval: DebounceInterval) {
        self.interval.store(Arc::new(interval));
    }

    /// Propose `value` using the configured interval.
    pub fn propose(&self, value: V) -> Proposal {
        let interval = self.interval.load().resolve();
        self.propose_with(value, interval)
    }

    /// Propose `value` with a one-off interval.
    ///
    /// A zero interval cancels any pending value and commits `value` now.
    pub fn propose_with(&self, value: V, interval: Duration) -> Proposal {
        if interval.is_zero() {
            {
                let mut slot = lock(&self.slot);
                slot.stats.proposals += 1;
                if slot.pending.take().is_some() {
                    slot.stats.superseded += 1;
                }
                slot.deadline = None;
                slot.stats.commits += 1;
            }
            tracing::trace!("debounce bypassed, committing synchronously");
            (self.on_commit)(value);
            return Proposal::Committed;
        }
        let deadline = self.clock.now() + interval;
        lock(&self.slot).schedule(value, deadline);
        tracing::trace!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "debounce scheduled"
        );
        Proposal::Scheduled { deadline }
    }

    /// Fire the pending value if its deadline has passed.
    /// Returns `true` if a value was committed.
    pub fn fire_due(&self) -> bool {
        let now = self.clock.now();
        let due = {
            let mut slot = lock(&self.slot);
            match slot.deadline {
                Some(deadline) if now >= deadline => slot.take(),
                _ => None,
            }
        };
        self.commit(due)
    }

    /// Fire the pending value now, regardless of its deadline.
    pub fn flush(&self) -> bool {
        let value = lock(&self.slot).take();
        self.commit(value)
    }

    /// Drop the pending value without firing it.
    /// Returns `true` if a value was pending.
    pub fn cancel(&self) -> bool {
        let cancelled = lock(&self.slot).clear();
        if cancelled {
            tracing::trace!("debounce cancelled");
        }
        cancelled
    }

    /// Whether a value is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }

    /// Deadline of the pending value, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        lock(&self.slot).deadline
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> DebounceStats {
        lock(&self.slot).stats
    }

    /// A thread-safe proposer sharing this debouncer's slot.
    #[must_use]
    pub fn handle(&self) -> DebounceHandle<V> {
        DebounceHandle {
            slot: Arc::clone(&self.slot),
            interval: Arc::clone(&self.interval),
            clock: Arc::clone(&self.clock),
        }
    }

    fn commit(&self, value: Option<V>) -> bool {
        match value {
            Some(value) => {
                (self.on_commit)(value);
                true
            }
            None => false,
        }
    }
}

impl<V: Clone> Debouncer<V> {
    /// Clone of the pending value, if any.
    #[must_use]
    pub fn pending_value(&self) -> Option<V> {
        lock(&self.slot).pending.clone()
    }
}

impl<V> fmt::Debug for Debouncer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = lock(&self.slot);
        f.debug_struct("Debouncer")
            .field("interval", &**self.interval.load())
            .field("pending", &slot.pending.is_some())
            .field("stats", &slot.stats)
            .finish()
    }
}

/// `Send + Sync` proposer for a [`Debouncer`] owned by another thread.
///
/// Proposals land in the shared slot; the owning loop fires them. A zero
/// interval makes the value due immediately rather than committing on the
/// calling thread.
pub struct DebounceHandle<V> {
    slot: Arc<Mutex<Slot<V>>>,
    interval: Arc<ArcSwap<DebounceInterval>>,
    clock: Arc<dyn Clock>,
}

impl<V> Clone for DebounceHandle<V> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            interval: Arc::clone(&self.interval),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<V> DebounceHandle<V> {
    /// Propose `value`; returns its deadline.
    pub fn propose(&self, value: V) -> Instant {
        let deadline = self.clock.now() + self.interval.load().resolve();
        lock(&self.slot).schedule(value, deadline);
        deadline
    }

    /// Drop the pending value without firing it.
    pub fn cancel(&self) -> bool {
        lock(&self.slot).clear()
    }
}

impl<V> fmt::Debug for DebounceHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebounceHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread;

    fn setup(ms: u64) -> (Debouncer<i32>, ManualClock, Rc<RefCell<Vec<i32>>>) {
        let clock = ManualClock::new();
        let commits = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&commits);
        let debouncer = Debouncer::new(
            DebounceInterval::millis(ms),
            Arc::new(clock.clone()),
            move |v| sink.borrow_mut().push(v),
        );
        (debouncer, clock, commits)
    }

    #[test]
    fn burst_collapses_to_last_value() {
        let (d, clock, commits) = setup(50);
        d.propose(1);
        clock.advance_ms(3);
        d.propose(2);
        clock.advance_ms(3);
        d.propose(3);

        clock.advance_ms(49);
        assert!(!d.fire_due());
        assert!(commits.borrow().is_empty());

        clock.advance_ms(1);
        assert!(d.fire_due());
        assert_eq!(*commits.borrow(), vec![3]);
        assert!(!d.fire_due(), "fires exactly once");

        let stats = d.stats();
        assert_eq!(stats.proposals, 3);
        assert_eq!(stats.superseded, 2);
        assert_eq!(stats.commits, 1);
    }

    #[test]
    fn new_proposal_resets_deadline() {
        let (d, clock, commits) = setup(50);
        d.propose(1);
        clock.advance_ms(40);
        d.propose(2);
        clock.advance_ms(40);
        assert!(!d.fire_due());
        clock.advance_ms(10);
        assert!(d.fire_due());
        assert_eq!(*commits.borrow(), vec![2]);
    }

    #[test]
    fn zero_interval_commits_synchronously_and_supersedes_pending() {
        let (d, _clock, commits) = setup(50);
        d.propose(1);
        assert_eq!(d.propose_with(2, Duration::ZERO), Proposal::Committed);
        assert_eq!(*commits.borrow(), vec![2]);
        assert!(!d.is_pending());
    }

    #[test]
    fn cancel_prevents_fire() {
        let (d, clock, commits) = setup(20);
        d.propose(7);
        assert!(d.cancel());
        clock.advance_ms(100);
        assert!(!d.fire_due());
        assert!(commits.borrow().is_empty());
        assert_eq!(d.stats().cancelled, 1);
        assert!(!d.cancel());
    }

    #[test]
    fn flush_fires_early() {
        let (d, _clock, commits) = setup(1_000);
        d.propose(5);
        assert_eq!(d.pending_value(), Some(5));
        assert!(d.flush());
        assert_eq!(*commits.borrow(), vec![5]);
        assert_eq!(d.next_deadline(), None);
    }

    #[test]
    fn interval_change_applies_to_next_proposal() {
        let (d, clock, commits) = setup(100);
        d.set_interval(DebounceInterval::millis(10));
        d.propose(1);
        clock.advance_ms(10);
        assert!(d.fire_due());
        assert_eq!(*commits.borrow(), vec![1]);
    }

    #[test]
    fn handle_proposals_from_threads_are_last_write_wins() {
        let (d, clock, commits) = setup(10);
        let handle = d.handle();
        let workers: Vec<_> = (0..4)
            .map(|t| {
                let h = handle.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        h.propose(t * 100 + i);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        // All 200 proposals landed in one slot.
        assert_eq!(d.stats().proposals, 200);
        assert_eq!(d.stats().superseded, 199);

        clock.advance_ms(10);
        assert!(d.fire_due());
        assert_eq!(commits.borrow().len(), 1);
        assert_eq!(commits.borrow()[0] % 100, 49, "a thread's final value survives");
    }

    proptest! {
        #[test]
        fn each_quiet_gap_commits_the_preceding_burst(
            gaps in proptest::collection::vec(0_u64..120, 1..40),
        ) {
            let (d, clock, commits) = setup(50);
            let mut expected = Vec::new();
            let mut pending: Option<i32> = None;

            for (i, gap) in (0_i32..).zip(gaps.iter().copied()) {
                clock.advance_ms(gap);
                d.fire_due();
                if gap >= 50 {
                    expected.extend(pending.take());
                }
                d.propose(i);
                pending = Some(i);
            }
            clock.advance_ms(50);
            d.fire_due();
            expected.extend(pending.take());

            prop_assert_eq!(&*commits.borrow(), &expected);
            prop_assert_eq!(d.stats().proposals, gaps.len() as u64);
            prop_assert_eq!(d.stats().commits, expected.len() as u64);
            prop_assert!(!d.is_pending());
        }
    }
}
