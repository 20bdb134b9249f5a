#![forbid(unsafe_code)]

//! Numeric entries: a text buffer the user edits, parsed when editing ends.
//!
//! The displayed value only changes in [`NumberEntry::finish_editing`]. Text
//! that does not parse is replaced by the formatted current value, so the
//! value never changes (and nothing is emitted) for invalid input.

use std::fmt;
use std::rc::Rc;

use hookbind_runtime::Control;

use crate::format::{Formatter, display_formatter};

/// Numbers a [`NumberEntry`] can hold.
pub trait EntryNumber: Copy + PartialEq + fmt::Display + Send + Sync + 'static {
    /// Parse user text. Surrounding whitespace is ignored.
    fn parse_entry(text: &str) -> Option<Self>;
}

impl EntryNumber for i64 {
    fn parse_entry(text: &str) -> Option<Self> {
        text.trim().parse().ok()
    }
}

impl EntryNumber for f64 {
    fn parse_entry(text: &str) -> Option<Self> {
        text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// A numeric text field.
pub struct NumberEntry<N: EntryNumber> {
    value: N,
    text: String,
    formatter: Formatter<N>,
}

/// Integer entry.
pub type IntegerEntry = NumberEntry<i64>;

/// Floating-point entry. Non-finite input is rejected.
pub type FloatEntry = NumberEntry<f64>;

impl<N: EntryNumber> NumberEntry<N> {
    /// An entry holding `value`, formatted with `Display`.
    #[must_use]
    pub fn new(value: N) -> Self {
        Self::with_formatter(value, display_formatter())
    }

    /// An entry holding `value`, formatted with `formatter`.
    #[must_use]
    pub fn with_formatter(value: N, formatter: Formatter<N>) -> Self {
        let text = formatter(&value);
        Self {
            value,
            text,
            formatter,
        }
    }

    /// Current text buffer.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text buffer (user typing). The value is unchanged until
    /// [`finish_editing`](Self::finish_editing).
    pub fn edit_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Parse the text buffer. On success the value changes and the text is
    /// reformatted; otherwise the text reverts. Returns whether it parsed.
    pub fn finish_editing(&mut self) -> bool {
        match N::parse_entry(&self.text) {
            Some(parsed) => {
                self.value = parsed;
                self.reformat();
                true
            }
            None => {
                tracing::debug!(text = %self.text, "unparsable entry reverted");
                self.reformat();
                false
            }
        }
    }

    /// Replace the formatter and reformat the text.
    pub fn set_formatter(&mut self, formatter: impl Fn(&N) -> String + 'static) {
        self.formatter = Rc::new(formatter);
        self.reformat();
    }

    fn reformat(&mut self) {
        self.text = (self.formatter)(&self.value);
    }
}

impl<N: EntryNumber + Default> Default for NumberEntry<N> {
    fn default() -> Self {
        Self::new(N::default())
    }
}

impl<N: EntryNumber> Control for NumberEntry<N> {
    type Value = N;

    fn value(&self) -> N {
        self.value
    }

    fn write(&mut self, value: &N) {
        self.value = *value;
        self.reformat();
    }
}

impl<N: EntryNumber + fmt::Debug> fmt::Debug for NumberEntry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumberEntry")
            .field("value", &self.value)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}
