#![forbid(unsafe_code)]

use std::fmt;
use std::rc::Rc;

use hookbind_runtime::Control;

use crate::format::{Formatter, display_formatter};

/// A read-only label showing a formatted value. It has no user actions, so
/// a binding to it is one-way.
pub struct DisplayValue<T> {
    value: T,
    text: String,
    formatter: Formatter<T>,
}

impl<T: fmt::Display> DisplayValue<T> {
    /// A label formatting `value` with `Display`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::with_formatter(value, display_formatter())
    }
}

impl<T> DisplayValue<T> {
    /// A label formatting `value` with `formatter`.
    #[must_use]
    pub fn with_formatter(value: T, formatter: Formatter<T>) -> Self {
        let text = formatter(&value);
        Self {
            value,
            text,
            formatter,
        }
    }

    /// The rendered text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the formatter and re-render.
    pub fn set_formatter(&mut self, formatter: impl Fn(&T) -> String + 'static) {
        self.formatter = Rc::new(formatter);
        self.text = (self.formatter)(&self.value);
    }
}

impl<T> Control for DisplayValue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn value(&self) -> T {
        self.value.clone()
    }

    fn write(&mut self, value: &T) {
        self.value = value.clone();
        self.text = (self.formatter)(&self.value);
    }
}

impl<T: fmt::Debug> fmt::Debug for DisplayValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayValue")
            .field("value", &self.value)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}
