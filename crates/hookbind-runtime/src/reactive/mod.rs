#![forbid(unsafe_code)]

//! Binding primitives.
//!
//! - [`StateCell`]: a shared, version-tracked value with change notification,
//!   safe to set from any thread.
//! - [`Subscription`]: RAII handle that unsubscribes on drop.
//! - [`ReentrancyGuard`]: depth-counted flag, active while a coordinator pushes
//!   state into its control.
//! - [`MutationGate`]: refuses gated control mutations outside the trusted
//!   guard.
//! - [`GatedControl`]: wraps a [`Control`] behind its gate and fans out
//!   user-change events.
//! - [`Debouncer`]: trailing-edge coalescing of proposed commits.
//! - [`Coordinator`]: ties one cell to one control.
//!
//! # Architecture
//!
//! `StateCell<T>` is `Arc`-based; everything on the control side is
//! `Rc`-based and lives on one [`EventLoop`](crate::EventLoop). The only
//! bridge between the two is the coordinator's inbox channel: the cell
//! callback enqueues the new value and wakes the loop, and the loop pushes it
//! into the control on its next tick.
//!
//! # Invariants
//!
//! 1. Control events observed while a coordinator's guard is active are
//!    echoes and never reach the cell.
//! 2. A burst of user edits within the debounce interval produces exactly one
//!    `set` on the cell, carrying the last value.
//! 3. Gated mutations of a bound control only succeed inside its
//!    coordinator's guard.
//! 4. After disposal a coordinator neither touches its control nor commits.

pub mod cell;
pub mod control;
pub mod coordinator;
pub mod debounce;
pub mod gate;
pub mod guard;

pub use cell::{StateCell, Subscription, SubscriptionId};
pub use control::{Control, GatedControl, ListenerId};
pub use coordinator::{
    BindingId, BindingOptions, BindingState, BindingStats, Coordinator, Proposer, Validator,
};
pub use debounce::{DebounceHandle, DebounceStats, Debouncer, Proposal};
pub use gate::{MutationGate, OpId};
pub use guard::{GuardScope, ReentrancyGuard};
