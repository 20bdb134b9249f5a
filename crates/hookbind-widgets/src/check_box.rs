#![forbid(unsafe_code)]

use hookbind_runtime::Control;

/// A two-state check box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckBox {
    checked: bool,
    label: String,
}

impl CheckBox {
    /// A check box with a caption.
    #[must_use]
    pub fn new(label: impl Into<String>, checked: bool) -> Self {
        Self {
            checked,
            label: label.into(),
        }
    }

    /// Caption text.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the box is checked.
    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// Flip the state (user click).
    pub fn toggle(&mut self) {
        self.checked = !self.checked;
    }

    /// Set the state (user action).
    pub fn set_checked(&mut self, checked: bool) {
        self.checked = checked;
    }
}

impl Control for CheckBox {
    type Value = bool;

    fn value(&self) -> bool {
        self.checked
    }

    fn write(&mut self, value: &bool) {
        self.checked = *value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookbind_runtime::GatedControl;

    #[test]
    fn toggle_emits_each_click() {
        let control = GatedControl::new(CheckBox::new("Enabled", false));
        assert!(control.user_input(CheckBox::toggle));
        assert!(control.user_input(CheckBox::toggle));
        assert!(!control.user_input(|c| c.set_checked(false)));
        assert_eq!(control.emitted_changes(), 2);
        assert_eq!(control.read(|c| c.label().to_owned()), "Enabled");
    }
}
