#![forbid(unsafe_code)]

//! Two-way binding runtime for hookbind.
//!
//! Keeps a shared [`StateCell`] and a UI control in sync in both directions
//! without update cycles. A [`Coordinator`] pushes state into its control
//! inside a [`ReentrancyGuard`] scope, treats control events seen inside that
//! scope as echoes, debounces user edits before committing them, and refuses
//! (through the control's [`MutationGate`]) any model mutation of the control
//! that does not come from its own update scope.
//!
//! Coordinators live on a single-threaded [`EventLoop`]; cells may be set from
//! any thread.
//!
//! # Example
//!
//! ```ignore
//! let event_loop = EventLoop::new();
//! let cell = StateCell::new(String::from("hello"));
//! let control = GatedControl::new(MyTextField::default());
//! let binding = Coordinator::bind(&event_loop, cell.clone(), control.clone(), BindingOptions::new())?;
//!
//! cell.set("world".into());
//! event_loop.run_until_idle();
//! assert_eq!(control.value(), "world");
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod reactive;

use std::any::Any;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BUILTIN_DEBOUNCE, DEBOUNCE_ENV_VAR, DebounceInterval, DebounceOverride, default_debounce,
    override_default_debounce, set_default_debounce,
};
pub use error::BindingError;
pub use event_loop::{EventLoop, LoopHandle, Pump, TickReport};
pub use reactive::{
    BindingId, BindingOptions, BindingState, BindingStats, Control, Coordinator, DebounceHandle,
    DebounceStats, Debouncer, GatedControl, GuardScope, ListenerId, MutationGate, OpId, Proposal,
    Proposer, ReentrancyGuard, StateCell, Subscription, SubscriptionId, Validator,
};

/// Lock `m`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let err = panic::catch_unwind(|| panic!("plain")).unwrap_err();
        assert_eq!(panic_message(err.as_ref()), "plain");

        let err = panic::catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        assert_eq!(panic_message(err.as_ref()), "formatted 7");

        let err = panic::catch_unwind(|| std::panic::panic_any(42_u8)).unwrap_err();
        assert_eq!(panic_message(err.as_ref()), "non-string panic payload");
    }

    #[test]
    fn lock_recovers_from_poison() {
        let m = std::sync::Arc::new(Mutex::new(1));
        let m2 = std::sync::Arc::clone(&m);
        let _ = std::thread::spawn(move || {
            let _g = m2.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(m.is_poisoned());
        *lock(&m) += 1;
        assert_eq!(*lock(&m), 2);
    }
}
