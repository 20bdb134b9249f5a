#![forbid(unsafe_code)]

//! Single-line text entries.

use hookbind_runtime::Control;

/// A single-line text field. The displayed value is the text itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextEntry {
    text: String,
}

impl TextEntry {
    /// An entry showing `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Current text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text (user typing).
    pub fn type_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Append to the text (user typing).
    pub fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    /// Clear the text (user action).
    pub fn clear(&mut self) {
        self.text.clear();
    }
}

impl Control for TextEntry {
    type Value = String;

    fn value(&self) -> String {
        self.text.clone()
    }

    fn write(&mut self, value: &String) {
        self.text.clone_from(value);
    }
}

/// A text field whose empty text means "no value".
///
/// Surrounding whitespace is not significant: `"  "` reads as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalTextEntry {
    text: String,
}

impl OptionalTextEntry {
    /// An entry showing `value` (empty for `None`).
    #[must_use]
    pub fn new(value: Option<&str>) -> Self {
        Self {
            text: value.unwrap_or_default().to_owned(),
        }
    }

    /// Current raw text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text (user typing).
    pub fn type_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Clear the text (user action).
    pub fn clear(&mut self) {
        self.text.clear();
    }
}

impl Control for OptionalTextEntry {
    type Value = Option<String>;

    fn value(&self) -> Option<String> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_owned())
    }

    fn write(&mut self, value: &Option<String>) {
        match value {
            Some(text) => self.text.clone_from(text),
            None => self.text.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookbind_runtime::GatedControl;

    #[test]
    fn text_entry_value_is_text() {
        let mut entry = TextEntry::new("ab");
        entry.push_str("c");
        assert_eq!(entry.value(), "abc");
        entry.write(&String::from("z"));
        assert_eq!(entry.text(), "z");
    }

    #[test]
    fn optional_entry_maps_blank_to_none() {
        let mut entry = OptionalTextEntry::new(None);
        assert_eq!(entry.value(), None);
        entry.type_text("   ");
        assert_eq!(entry.value(), None);
        entry.type_text(" x ");
        assert_eq!(entry.value(), Some(String::from("x")));
        entry.write(&None);
        assert_eq!(entry.text(), "");
    }

    #[test]
    fn whitespace_only_edit_does_not_emit() {
        let control = GatedControl::new(OptionalTextEntry::new(None));
        assert!(!control.user_input(|e| e.type_text("  ")));
        assert!(control.user_input(|e| e.type_text("a")));
    }
}
