#![forbid(unsafe_code)]

//! hookbind public facade crate.
//!
//! Binds shared [`StateCell`]s to UI controls in both directions: state
//! changes are pushed into the control, user edits are debounced and
//! committed back, echoes are suppressed, and direct mutation of a bound
//! control is refused.
//!
//! ```ignore
//! use hookbind::prelude::*;
//!
//! let event_loop = EventLoop::new();
//! let cell = StateCell::new(1_i64);
//! let entry = GatedControl::new(IntegerEntry::new(0));
//! let binding = Coordinator::bind(&event_loop, cell.clone(), entry.clone(), BindingOptions::new())?;
//!
//! entry.user_input(|e| {
//!     e.edit_text("42");
//!     e.finish_editing();
//! });
//! binding.flush()?;
//! assert_eq!(cell.get(), 42);
//! ```

pub use hookbind_runtime as runtime;
pub use hookbind_widgets as widgets;

pub use hookbind_runtime::{
    BindingError, BindingOptions, BindingState, Control, Coordinator, EventLoop, GatedControl,
    StateCell,
};

pub mod prelude {
    pub use hookbind_runtime::{
        BindingError, BindingOptions, BindingState, BindingStats, Clock, Control, Coordinator,
        DebounceInterval, EventLoop, GatedControl, LoopHandle, ManualClock, OpId, Proposer, StateCell,
        Subscription, SystemClock, Validator,
    };
    pub use hookbind_widgets::{
        CheckBox, ComboBox, ComboBoxOps, DisplayValue, DoubleListSelection, FloatEntry,
        IntegerEntry, OptionalTextEntry, RadioButtons, SingleListSelection, TextEntry,
    };
}
