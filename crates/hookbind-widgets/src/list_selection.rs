#![forbid(unsafe_code)]

//! List selection controls.
//!
//! - [`SingleListSelection`]: one list, at most one selected item
//!   (`Option<T>`). With deselection allowed, clicking the selected item
//!   clears the selection; otherwise an attempt to clear is ignored.
//! - [`DoubleListSelection`]: an "available" list and a "selected" list with
//!   move buttons between them. The bound value is the selected items in
//!   option order (`Vec<T>`).
//!
//! In both, the option list is model state gated by `SET_OPTIONS`.

use std::fmt;

use hookbind_runtime::{Control, OpId};

const SET_OPTIONS: OpId = OpId::new("set_options");

/// A list allowing at most one selected item.
#[derive(Clone, PartialEq, Eq)]
pub struct SingleListSelection<T> {
    options: Vec<T>,
    selected: Option<usize>,
    allow_deselection: bool,
}

impl<T> SingleListSelection<T> {
    /// Replace the option list.
    pub const SET_OPTIONS: OpId = SET_OPTIONS;
}

impl<T: Clone + PartialEq> SingleListSelection<T> {
    /// A list over `options`, nothing selected, deselection allowed.
    #[must_use]
    pub fn new(options: impl IntoIterator<Item = T>) -> Self {
        Self {
            options: options.into_iter().collect(),
            selected: None,
            allow_deselection: true,
        }
    }

    /// Whether the user may clear the selection.
    #[must_use]
    pub fn allow_deselection(mut self, allow: bool) -> Self {
        self.allow_deselection = allow;
        self
    }

    /// The options.
    #[must_use]
    pub fn options(&self) -> &[T] {
        &self.options
    }

    /// Index of the selected item.
    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    /// Click the item at `index` (user action).
    pub fn click(&mut self, index: usize) {
        if index >= self.options.len() {
            return;
        }
        self.selected = if self.allow_deselection && self.selected == Some(index) {
            None
        } else {
            Some(index)
        };
    }

    /// Clear the selection (user action). Ignored when deselection is not
    /// allowed.
    pub fn clear_selection(&mut self) {
        if self.allow_deselection {
            self.selected = None;
        }
    }

    /// Replace the options, keeping the selected item when it survives.
    /// Model operation ([`Self::SET_OPTIONS`]).
    pub fn set_options(&mut self, options: impl IntoIterator<Item = T>) {
        let kept = self.value_ref().cloned();
        self.options = options.into_iter().collect();
        self.selected = kept.and_then(|item| self.options.iter().position(|o| *o == item));
    }

    fn value_ref(&self) -> Option<&T> {
        self.selected.and_then(|i| self.options.get(i))
    }
}

impl<T> Control for SingleListSelection<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = Option<T>;
    const GATED_OPS: &'static [OpId] = &[SET_OPTIONS];

    fn value(&self) -> Option<T> {
        self.value_ref().cloned()
    }

    fn write(&mut self, value: &Option<T>) {
        self.selected = value.as_ref().map(|item| {
            match self.options.iter().position(|o| o == item) {
                Some(index) => index,
                None => {
                    self.options.push(item.clone());
                    self.options.len() - 1
                }
            }
        });
    }
}

impl<T: fmt::Debug> fmt::Debug for SingleListSelection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleListSelection")
            .field("options", &self.options)
            .field("selected", &self.selected)
            .field("allow_deselection", &self.allow_deselection)
            .finish()
    }
}

/// Two lists, "available" and "selected", with items moved between them.
#[derive(Clone, PartialEq, Eq)]
pub struct DoubleListSelection<T> {
    options: Vec<T>,
    chosen: Vec<bool>,
}

impl<T> DoubleListSelection<T> {
    /// Replace the option list.
    pub const SET_OPTIONS: OpId = SET_OPTIONS;
}

impl<T: Clone + PartialEq> DoubleListSelection<T> {
    /// Every option starts in the available list.
    #[must_use]
    pub fn new(options: impl IntoIterator<Item = T>) -> Self {
        let options: Vec<T> = options.into_iter().collect();
        let chosen = vec![false; options.len()];
        Self { options, chosen }
    }

    /// Items in the available list.
    #[must_use]
    pub fn available(&self) -> Vec<T> {
        self.side(false)
    }

    /// Items in the selected list.
    #[must_use]
    pub fn selected(&self) -> Vec<T> {
        self.side(true)
    }

    /// Move `items` from the available to the selected list (user action).
    /// Unknown items are ignored.
    pub fn move_to_selected(&mut self, items: &[T]) {
        self.mark(items, true);
    }

    /// Move `items` back to the available list (user action).
    pub fn move_to_available(&mut self, items: &[T]) {
        self.mark(items, false);
    }

    /// Replace the options. Selected items that survive stay selected.
    /// Model operation ([`Self::SET_OPTIONS`]).
    pub fn set_options(&mut self, options: impl IntoIterator<Item = T>) {
        let kept = self.selected();
        self.options = options.into_iter().collect();
        self.chosen = self.options.iter().map(|o| kept.contains(o)).collect();
    }

    fn side(&self, chosen: bool) -> Vec<T> {
        self.options
            .iter()
            .zip(&self.chosen)
            .filter(|(_, c)| **c == chosen)
            .map(|(o, _)| o.clone())
            .collect()
    }

    fn mark(&mut self, items: &[T], chosen: bool) {
        for (option, flag) in self.options.iter().zip(self.chosen.iter_mut()) {
            if items.contains(option) {
                *flag = chosen;
            }
        }
    }
}

impl<T> Control for DoubleListSelection<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = Vec<T>;
    const GATED_OPS: &'static [OpId] = &[SET_OPTIONS];

    fn value(&self) -> Vec<T> {
        self.selected()
    }

    /// Selects exactly `value`; unknown items are added as options.
    fn write(&mut self, value: &Vec<T>) {
        for item in value {
            if !self.options.contains(item) {
                self.options.push(item.clone());
                self.chosen.push(false);
            }
        }
        for (option, flag) in self.options.iter().zip(self.chosen.iter_mut()) {
            *flag = value.contains(option);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DoubleListSelection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoubleListSelection")
            .field("options", &self.options)
            .field("chosen", &self.chosen)
            .finish()
    }
}
