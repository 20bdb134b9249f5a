#![forbid(unsafe_code)]

//! Headless reference controls for hookbind.
//!
//! Each control implements [`Control`](hookbind_runtime::Control) and models
//! just enough of a real widget to be bound: the displayed value, the text
//! buffer a user edits, and the model operations a toolkit would expose.
//! User interaction goes through
//! [`GatedControl::user_input`](hookbind_runtime::GatedControl::user_input);
//! model operations go through the gate.

pub mod check_box;
pub mod combo_box;
pub mod display;
pub mod format;
pub mod list_selection;
pub mod numeric;
pub mod radio;
pub mod text;

pub use check_box::CheckBox;
pub use combo_box::{ComboBox, ComboBoxOps};
pub use display::DisplayValue;
pub use format::{Formatter, display_formatter};
pub use list_selection::{DoubleListSelection, SingleListSelection};
pub use numeric::{EntryNumber, FloatEntry, IntegerEntry, NumberEntry};
pub use radio::RadioButtons;
pub use text::{OptionalTextEntry, TextEntry};
