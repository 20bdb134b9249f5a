#![forbid(unsafe_code)]

//! Shared, version-tracked value with ordered change notification.
//!
//! # Design
//!
//! [`StateCell<T>`] wraps a value in `Arc`-shared storage so that background
//! producers on any thread can `set` it while the owning event loop reads and
//! binds it. When the value changes (determined by `PartialEq`), all live
//! subscribers are notified in registration order.
//!
//! The subscriber list is a copy-on-write snapshot (`ArcSwap<Vec<..>>`):
//! notification iterates a snapshot while `subscribe`/`unsubscribe` publish a
//! new list. Each entry carries a liveness flag, so a subscriber removed while
//! a notification is in flight is skipped for the rest of that notification.
//!
//! # Re-entrant sets
//!
//! A `set` issued while a notification is being delivered (from a subscriber
//! callback, or from another thread) is queued. The call returns immediately;
//! the delivering call applies queued values strictly in arrival order after
//! the current notification completes. Recursion depth therefore stays
//! constant no matter how subscribers feed back into the cell.
//!
//! # Failure Modes
//!
//! - **Panicking subscriber**: caught and logged; the remaining subscribers of
//!   the same notification still run.
//! - **Subscriber leak**: a callback that captures a clone of its own cell
//!   keeps the cell alive. Drop the [`Subscription`] to break the cycle.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use arc_swap::ArcSwap;

use crate::{lock, panic_message};

/// Identifier of one subscription on one cell.
pub type SubscriptionId = u64;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscriber<T> {
    id: SubscriptionId,
    live: AtomicBool,
    callback: Callback<T>,
}

struct Versioned<T> {
    value: T,
    version: u64,
}

struct Delivery<T> {
    queue: VecDeque<T>,
    delivering: bool,
}

struct CellInner<T> {
    state: Mutex<Versioned<T>>,
    subscribers: ArcSwap<Vec<Arc<Subscriber<T>>>>,
    delivery: Mutex<Delivery<T>>,
    next_id: AtomicU64,
}

/// Releases the delivery role if a `set` unwinds (e.g. a panicking
/// `PartialEq`), so later sets are not queued forever.
struct DeliveryTurn<'a, T> {
    delivery: &'a Mutex<Delivery<T>>,
    armed: bool,
}

impl<T> Drop for DeliveryTurn<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.delivery).delivering = false;
        }
    }
}

/// Removes a subscription by id; lets [`Subscription`] stay non-generic.
trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

impl<T: Send + Sync + 'static> Unsubscribe for CellInner<T> {
    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut found = false;
        for sub in self.subscribers.load().iter() {
            if sub.id == id {
                sub.live.store(false, Ordering::Release);
                found = true;
            }
        }
        if found {
            self.subscribers.rcu(|subs| {
                subs.iter()
                    .filter(|s| s.id != id)
                    .cloned()
                    .collect::<Vec<_>>()
            });
        }
        found
    }
}

/// A shared value with change notification, safe to mutate from any thread.
///
/// Cloning a `StateCell` creates another handle to the **same** value and
/// subscriber list.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 for each value-changing mutation.
/// 2. `set(v)` where `v == current` is a no-op.
/// 3. Subscribers are notified in registration order.
/// 4. A subscriber removed during a notification is not invoked afterwards.
/// 5. Values set during delivery are applied in arrival order, after the
///    notification in progress.
pub struct StateCell<T> {
    inner: Arc<CellInner<T>>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("StateCell")
            .field("value", &state.value)
            .field("version", &state.version)
            .field("subscriber_count", &self.inner.subscribers.load().len())
            .finish()
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> StateCell<T> {
    /// Create a cell holding `value`, at version 0, without subscribers.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(CellInner {
                state: Mutex::new(Versioned { value, version: 0 }),
                subscribers: ArcSwap::from_pointee(Vec::new()),
                delivery: Mutex::new(Delivery {
                    queue: VecDeque::new(),
                    delivering: false,
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        lock(&self.inner.state).value.clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// The cell's lock is held while `f` runs: `f` must not call back into
    /// the same cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&lock(&self.inner.state).value)
    }

    /// Set a new value and notify subscribers if it differs from the current
    /// one.
    ///
    /// When a notification is already being delivered the value is queued
    /// and this call returns immediately.
    pub fn set(&self, value: T) {
        {
            let mut delivery = lock(&self.inner.delivery);
            delivery.queue.push_back(value);
            if delivery.delivering {
                tracing::trace!(queued = delivery.queue.len(), "state cell set queued");
                return;
            }
            delivery.delivering = true;
        }

        let mut turn = DeliveryTurn {
            delivery: &self.inner.delivery,
            armed: true,
        };
        loop {
            let next = {
                let mut delivery = lock(&self.inner.delivery);
                match delivery.queue.pop_front() {
                    Some(value) => value,
                    None => {
                        // Released under the same lock that saw the queue empty.
                        delivery.delivering = false;
                        turn.armed = false;
                        return;
                    }
                }
            };
            if let Some((snapshot, version)) = self.store(next) {
                self.notify(&snapshot, version);
            }
        }
    }

    /// Modify a copy of the current value with `f` and [`set`](Self::set) it.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Subscribe to value changes. The callback receives each new value.
    ///
    /// The returned [`Subscription`] unsubscribes when dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let sub = Arc::new(Subscriber {
            id,
            live: AtomicBool::new(true),
            callback: Arc::new(callback),
        });
        self.inner.subscribers.rcu(|subs| {
            let mut next = Vec::with_capacity(subs.len() + 1);
            next.extend(subs.iter().cloned());
            next.push(Arc::clone(&sub));
            next
        });
        let weak: Weak<CellInner<T>> = Arc::downgrade(&self.inner);
        let owner: Weak<dyn Unsubscribe> = weak;
        Subscription {
            id,
            owner: Some(owner),
        }
    }

    /// Remove the subscription `id`. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }

    /// Number of value-changing mutations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        lock(&self.inner.state).version
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load().len()
    }

    /// Whether two handles refer to the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn store(&self, value: T) -> Option<(T, u64)> {
        let mut state = lock(&self.inner.state);
        if state.value == value {
            return None;
        }
        state.value = value;
        state.version += 1;
        Some((state.value.clone(), state.version))
    }

    fn notify(&self, value: &T, version: u64) {
        let subscribers = self.inner.subscribers.load_full();
        tracing::trace!(version, subscribers = subscribers.len(), "state cell notify");
        for sub in subscribers.iter() {
            if !sub.live.load(Ordering::Acquire) {
                continue;
            }
            let callback = Arc::clone(&sub.callback);
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
                tracing::error!(
                    subscription = sub.id,
                    version,
                    panic = %panic_message(payload.as_ref()),
                    "state cell subscriber panicked"
                );
            }
        }
    }
}

/// RAII handle for a subscriber callback.
///
/// Dropping the `Subscription` unsubscribes; [`forget`](Self::forget) keeps
/// the callback registered for the lifetime of the cell.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    owner: Option<Weak<dyn Unsubscribe>>,
}

impl Subscription {
    /// The id this subscription was registered under.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Unsubscribe now. Returns `false` if the cell is gone or the id was
    /// already removed.
    pub fn unsubscribe(mut self) -> bool {
        self.release()
    }

    /// Keep the callback registered without holding a guard.
    pub fn forget(mut self) {
        self.owner = None;
    }

    fn release(&mut self) -> bool {
        self.owner
            .take()
            .and_then(|owner| owner.upgrade())
            .is_some_and(|owner| owner.unsubscribe(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.owner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let c = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&c), c)
    }

    #[test]
    fn get_set_basic() {
        let cell = StateCell::new(42);
        assert_eq!(cell.get(), 42);
        assert_eq!(cell.version(), 0);

        cell.set(99);
        assert_eq!(cell.get(), 99);
        assert_eq!(cell.version(), 1);
    }

    #[test]
    fn no_change_no_version_bump() {
        let cell = StateCell::new(42);
        cell.set(42);
        assert_eq!(cell.version(), 0);
    }

    #[test]
    fn with_and_update() {
        let cell = StateCell::new(vec![1, 2, 3]);
        assert_eq!(cell.with(|v| v.iter().sum::<i32>()), 6);
        cell.update(|v| v.push(4));
        assert_eq!(cell.get(), vec![1, 2, 3, 4]);
        assert_eq!(cell.version(), 1);
    }

    #[test]
    fn change_notification_skips_equal_values() {
        let cell = StateCell::new(0);
        let (count, seen) = counter();
        let _sub = cell.subscribe(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(1);
        cell.set(2);
        cell.set(2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let cell = StateCell::new(0);
        let (count, seen) = counter();
        let sub = cell.subscribe(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        cell.set(1);
        drop(sub);
        cell.set(2);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn explicit_unsubscribe_by_id() {
        let cell = StateCell::new(0);
        let sub = cell.subscribe(|_| {});
        let id = sub.id();
        sub.forget();
        assert_eq!(cell.subscriber_count(), 1);
        assert!(cell.unsubscribe(id));
        assert!(!cell.unsubscribe(id));
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn notification_order_is_registration_order() {
        let cell = StateCell::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));
        let subs: Vec<_> = ['A', 'B', 'C']
            .into_iter()
            .map(|tag| {
                let log = Arc::clone(&log);
                cell.subscribe(move |_| log.lock().unwrap().push(tag))
            })
            .collect();

        cell.set(1);
        assert_eq!(*log.lock().unwrap(), vec!['A', 'B', 'C']);
        drop(subs);
    }

    #[test]
    fn nested_set_is_queued_after_current_notification() {
        let cell = StateCell::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));

        let feedback = cell.clone();
        let log_a = Arc::clone(&log);
        let sub_a = cell.subscribe(move |v| {
            log_a.lock().unwrap().push(('a', *v));
            if *v == 1 {
                feedback.set(2);
            }
        });
        let log_b = Arc::clone(&log);
        let _sub_b = cell.subscribe(move |v| log_b.lock().unwrap().push(('b', *v)));

        cell.set(1);
        assert_eq!(
            *log.lock().unwrap(),
            vec![('a', 1), ('b', 1), ('a', 2), ('b', 2)]
        );
        assert_eq!(cell.get(), 2);
        assert_eq!(cell.version(), 2);
        drop(sub_a);
    }

    #[test]
    fn subscriber_removed_mid_notification_is_not_invoked() {
        let cell = StateCell::new(0);
        let victim: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let (count, seen) = counter();

        let handle = cell.clone();
        let target = Arc::clone(&victim);
        let killer = cell.subscribe(move |_| {
            if let Some(id) = target.lock().unwrap().take() {
                handle.unsubscribe(id);
            }
        });
        let sub_b = cell.subscribe(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        *victim.lock().unwrap() = Some(sub_b.id());
        sub_b.forget();

        cell.set(1);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        drop(killer);
    }

    #[test]
    fn panicking_subscriber_does_not_starve_others() {
        let cell = StateCell::new(0);
        let _bad = cell.subscribe(|v| {
            if *v == 1 {
                panic!("boom");
            }
        });
        let (count, seen) = counter();
        let _good = cell.subscribe(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(1);
        cell.set(2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    /// Equality panics when the incoming value is 13.
    #[derive(Debug, Clone)]
    struct Touchy(i32);

    impl PartialEq for Touchy {
        fn eq(&self, other: &Self) -> bool {
            assert!(other.0 != 13, "unlucky comparison");
            self.0 == other.0
        }
    }

    #[test]
    fn set_recovers_after_unwinding_comparison() {
        let cell = StateCell::new(Touchy(0));
        let (count, seen) = counter();
        let _sub = cell.subscribe(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        let h = cell.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| h.set(Touchy(13))));
        assert!(result.is_err());

        cell.set(Touchy(2));
        assert_eq!(cell.get().0, 2);
        assert_eq!(cell.version(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clone_shares_state_and_subscribers() {
        let a = StateCell::new(0);
        let b = a.clone();
        let (count, seen) = counter();
        let _sub = a.subscribe(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        b.set(5);
        assert_eq!(a.get(), 5);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn concurrent_setters_each_bump_version_once() {
        let cell = StateCell::new(0u64);
        let handles: Vec<_> = (1..=4u64)
            .map(|t| {
                let cell = cell.clone();
                thread::spawn(move || {
                    for i in 0..100u64 {
                        cell.set(t * 1_000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cell.version(), 400);
    }

    #[test]
    fn debug_format() {
        let cell = StateCell::new(42);
        let dbg = format!("{cell:?}");
        assert!(dbg.contains("StateCell"));
        assert!(dbg.contains("42"));
        assert!(dbg.contains("version"));
    }
}
