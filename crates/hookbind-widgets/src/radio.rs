#![forbid(unsafe_code)]

//! A group of mutually exclusive radio buttons.
//!
//! The bound value is the checked option (`Option<T>`). One button per
//! option; the option set is model state gated by [`RadioButtons::ADD_OPTION`]
//! and [`RadioButtons::REMOVE_OPTION`]. Checking a button programmatically
//! fires `toggled` in most toolkits, so the group emits on write.

use std::fmt;

use hookbind_runtime::{Control, OpId};

use crate::format::{Formatter, display_formatter};

const ADD_OPTION: OpId = OpId::new("add_option");
const REMOVE_OPTION: OpId = OpId::new("remove_option");

/// Radio buttons over a list of options.
pub struct RadioButtons<T> {
    options: Vec<T>,
    checked: Option<usize>,
    formatter: Formatter<T>,
}

impl<T> RadioButtons<T> {
    /// Add an option (and its button).
    pub const ADD_OPTION: OpId = ADD_OPTION;
    /// Remove an option (and its button).
    pub const REMOVE_OPTION: OpId = REMOVE_OPTION;
}

impl<T: Clone + PartialEq + fmt::Display> RadioButtons<T> {
    /// One button per option, none checked.
    #[must_use]
    pub fn new(options: impl IntoIterator<Item = T>) -> Self {
        Self::with_formatter(options, display_formatter())
    }
}

impl<T: Clone + PartialEq> RadioButtons<T> {
    /// Buttons captioned by `formatter`.
    #[must_use]
    pub fn with_formatter(options: impl IntoIterator<Item = T>, formatter: Formatter<T>) -> Self {
        Self {
            options: options.into_iter().collect(),
            checked: None,
            formatter,
        }
    }

    /// The options in button order.
    #[must_use]
    pub fn options(&self) -> &[T] {
        &self.options
    }

    /// Button captions.
    #[must_use]
    pub fn captions(&self) -> Vec<String> {
        self.options.iter().map(|o| (self.formatter)(o)).collect()
    }

    /// Index of the checked button.
    #[must_use]
    pub fn checked_index(&self) -> Option<usize> {
        self.checked
    }

    /// Click the button at `index` (user action). Clicking the checked
    /// button keeps it checked. Returns whether the index was valid.
    pub fn click(&mut self, index: usize) -> bool {
        if index < self.options.len() {
            self.checked = Some(index);
            true
        } else {
            false
        }
    }

    /// Append `option` unless already present. Model operation
    /// ([`Self::ADD_OPTION`]).
    pub fn add_option(&mut self, option: T) -> bool {
        if self.options.contains(&option) {
            return false;
        }
        self.options.push(option);
        true
    }

    /// Remove `option`. Removing the checked option unchecks the group.
    /// Model operation ([`Self::REMOVE_OPTION`]).
    pub fn remove_option(&mut self, option: &T) -> bool {
        let Some(index) = self.options.iter().position(|o| o == option) else {
            return false;
        };
        self.options.remove(index);
        self.checked = match self.checked {
            Some(c) if c == index => None,
            Some(c) if c > index => Some(c - 1),
            other => other,
        };
        true
    }
}

impl<T> Control for RadioButtons<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = Option<T>;
    const GATED_OPS: &'static [OpId] = &[ADD_OPTION, REMOVE_OPTION];
    const EMITS_ON_WRITE: bool = true;

    fn value(&self) -> Option<T> {
        self.checked.and_then(|i| self.options.get(i)).cloned()
    }

    /// Checks `value`; an unknown option gets a new button.
    fn write(&mut self, value: &Option<T>) {
        self.checked = value.as_ref().map(|option| {
            match self.options.iter().position(|o| o == option) {
                Some(index) => index,
                None => {
                    self.options.push(option.clone());
                    self.options.len() - 1
                }
            }
        });
    }
}

impl<T: fmt::Debug> fmt::Debug for RadioButtons<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadioButtons")
            .field("options", &self.options)
            .field("checked", &self.checked)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookbind_runtime::{
        BindingError, BindingOptions, Coordinator, DebounceInterval, EventLoop, GatedControl,
        StateCell,
    };

    fn sizes() -> RadioButtons<&'static str> {
        RadioButtons::new(["S", "M", "L"])
    }

    #[test]
    fn click_checks_one_button() {
        let control = GatedControl::new(sizes());
        assert!(control.user_input(|r| {
            r.click(1);
        }));
        assert!(!control.user_input(|r| {
            r.click(1);
        }));
        assert_eq!(control.value(), Some("M"));
        assert!(!control.user_input(|r| {
            r.click(7);
        }));
    }

    #[test]
    fn removing_checked_option_unchecks() {
        let mut radio = sizes();
        radio.click(2);
        assert!(radio.remove_option(&"S"));
        assert_eq!(radio.checked_index(), Some(1));
        assert!(radio.remove_option(&"L"));
        assert_eq!(radio.value(), None);
        assert!(!radio.add_option("M"));
        assert_eq!(radio.captions(), vec!["M"]);
    }

    #[test]
    fn bound_group_follows_state_and_gates_options() {
        let event_loop = EventLoop::new();
        let cell = StateCell::new(Some("L"));
        let control = GatedControl::new(sizes());
        let binding = Coordinator::bind(
            &event_loop,
            cell.clone(),
            control.clone(),
            BindingOptions::new().debounce(DebounceInterval::immediate()),
        )
        .unwrap();
        assert_eq!(control.read(RadioButtons::checked_index), Some(2));

        assert_eq!(
            control.call(RadioButtons::<&str>::ADD_OPTION, |r| r.add_option("XL")),
            Err(BindingError::GuardViolation(RadioButtons::<&str>::ADD_OPTION))
        );
        assert_eq!(
            binding.apply(RadioButtons::<&str>::ADD_OPTION, |r| r.add_option("XL")),
            Ok(true)
        );

        control.user_input(|r| {
            r.click(3);
        });
        assert_eq!(cell.get(), Some("XL"));
    }
}
