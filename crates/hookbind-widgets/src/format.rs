#![forbid(unsafe_code)]

//! Value → text formatters shared by the display-capable controls.

use std::fmt::Display;
use std::rc::Rc;

/// Renders a value as display text.
pub type Formatter<T> = Rc<dyn Fn(&T) -> String>;

/// Formatter using the value's `Display` impl.
#[must_use]
pub fn display_formatter<T: Display>() -> Formatter<T> {
    Rc::new(|v: &T| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formatter_uses_display() {
        let f = display_formatter::<f64>();
        assert_eq!(f(&1.5), "1.5");
    }
}
