#![forbid(unsafe_code)]

//! A selection combo box.
//!
//! The bound value is the selected item (`Option<T>`). The item list is
//! model state: [`ComboBox::CLEAR`], [`ComboBox::ADD_ITEM`],
//! [`ComboBox::INSERT_ITEM`] and [`ComboBox::REMOVE_ITEM`] are gated, so on a
//! bound combo box they only succeed through the owning coordinator
//! ([`Coordinator::apply`](hookbind_runtime::Coordinator::apply)).
//!
//! Like most toolkits, the combo box signals a selection change for
//! programmatic writes too (`EMITS_ON_WRITE`); the coordinator drops those as
//! echoes.

use std::fmt;

use hookbind_runtime::{BindingError, Control, GatedControl, OpId};

use crate::format::{Formatter, display_formatter};

const CLEAR: OpId = OpId::new("clear");
const ADD_ITEM: OpId = OpId::new("add_item");
const INSERT_ITEM: OpId = OpId::new("insert_item");
const REMOVE_ITEM: OpId = OpId::new("remove_item");

/// A drop-down selection over a list of items.
pub struct ComboBox<T> {
    items: Vec<T>,
    selected: Option<usize>,
    formatter: Formatter<T>,
}

impl<T> ComboBox<T> {
    /// Remove every item.
    pub const CLEAR: OpId = CLEAR;
    /// Append an item.
    pub const ADD_ITEM: OpId = ADD_ITEM;
    /// Insert an item at an index.
    pub const INSERT_ITEM: OpId = INSERT_ITEM;
    /// Remove the item at an index.
    pub const REMOVE_ITEM: OpId = REMOVE_ITEM;
}

impl<T: Clone + PartialEq + fmt::Display> ComboBox<T> {
    /// A combo box over `items` with nothing selected.
    #[must_use]
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self::with_formatter(items, display_formatter())
    }
}

impl<T: Clone + PartialEq> ComboBox<T> {
    /// A combo box rendering items with `formatter`.
    #[must_use]
    pub fn with_formatter(items: impl IntoIterator<Item = T>, formatter: Formatter<T>) -> Self {
        Self {
            items: items.into_iter().collect(),
            selected: None,
            formatter,
        }
    }

    /// The items.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index of the selected item.
    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    /// Display text of every item.
    #[must_use]
    pub fn item_texts(&self) -> Vec<String> {
        self.items.iter().map(|i| (self.formatter)(i)).collect()
    }

    /// Display text of the selection, empty when nothing is selected.
    #[must_use]
    pub fn current_text(&self) -> String {
        self.selected
            .and_then(|i| self.items.get(i))
            .map(|item| (self.formatter)(item))
            .unwrap_or_default()
    }

    /// Select by index (user action). Out-of-range indices are ignored.
    /// Returns whether the index was valid.
    pub fn select_index(&mut self, index: usize) -> bool {
        if index < self.items.len() {
            self.selected = Some(index);
            true
        } else {
            false
        }
    }

    /// Select the first item equal to `item` (user action).
    pub fn select_item(&mut self, item: &T) -> bool {
        match self.position(item) {
            Some(index) => self.select_index(index),
            None => false,
        }
    }

    /// Deselect (user action).
    pub fn select_none(&mut self) {
        self.selected = None;
    }

    /// Remove every item. Model operation ([`Self::CLEAR`]).
    pub fn clear(&mut self) {
        self.items.clear();
        self.selected = None;
    }

    /// Append `item`. Model operation ([`Self::ADD_ITEM`]).
    pub fn add_item(&mut self, item: T) {
        self.items.push(item);
    }

    /// Insert `item` at `index`, clamped to the end. Model operation
    /// ([`Self::INSERT_ITEM`]).
    pub fn insert_item(&mut self, index: usize, item: T) {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
        if let Some(sel) = self.selected.filter(|&sel| sel >= index) {
            self.selected = Some(sel + 1);
        }
    }

    /// Remove the item at `index`. Removing the selected item clears the
    /// selection. Model operation ([`Self::REMOVE_ITEM`]).
    pub fn remove_item(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        self.selected = match self.selected {
            Some(sel) if sel == index => None,
            Some(sel) if sel > index => Some(sel - 1),
            other => other,
        };
        Some(removed)
    }

    fn position(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }
}

impl<T> Control for ComboBox<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = Option<T>;
    const GATED_OPS: &'static [OpId] = &[CLEAR, ADD_ITEM, INSERT_ITEM, REMOVE_ITEM];
    const EMITS_ON_WRITE: bool = true;

    fn value(&self) -> Option<T> {
        self.selected.and_then(|i| self.items.get(i)).cloned()
    }

    /// Selects `value`, appending it first if it is not an item yet.
    fn write(&mut self, value: &Option<T>) {
        self.selected = match value {
            None => None,
            Some(item) => match self.position(item) {
                Some(index) => Some(index),
                None => {
                    self.items.push(item.clone());
                    Some(self.items.len() - 1)
                }
            },
        };
    }
}

impl<T: fmt::Debug> fmt::Debug for ComboBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComboBox")
            .field("items", &self.items)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

/// Gated item operations on a [`GatedControl`] wrapping a [`ComboBox`].
///
/// Each call fails with [`BindingError::GuardViolation`] unless the owning
/// coordinator's update scope is open.
pub trait ComboBoxOps<T> {
    /// Remove every item.
    ///
    /// # Errors
    ///
    /// [`BindingError::GuardViolation`] outside the update scope.
    fn clear_items(&self) -> Result<(), BindingError>;

    /// Append `item`.
    ///
    /// # Errors
    ///
    /// [`BindingError::GuardViolation`] outside the update scope.
    fn add_item(&self, item: T) -> Result<(), BindingError>;

    /// Insert `item` at `index`.
    ///
    /// # Errors
    ///
    /// [`BindingError::GuardViolation`] outside the update scope.
    fn insert_item(&self, index: usize, item: T) -> Result<(), BindingError>;

    /// Remove the item at `index`.
    ///
    /// # Errors
    ///
    /// [`BindingError::GuardViolation`] outside the update scope.
    fn remove_item(&self, index: usize) -> Result<Option<T>, BindingError>;
}

impl<T> ComboBoxOps<T> for GatedControl<ComboBox<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clear_items(&self) -> Result<(), BindingError> {
        self.call(CLEAR, ComboBox::clear)
    }

    fn add_item(&self, item: T) -> Result<(), BindingError> {
        self.call(ADD_ITEM, |c| c.add_item(item))
    }

    fn insert_item(&self, index: usize, item: T) -> Result<(), BindingError> {
        self.call(INSERT_ITEM, |c| c.insert_item(index, item))
    }

    fn remove_item(&self, index: usize) -> Result<Option<T>, BindingError> {
        self.call(REMOVE_ITEM, |c| c.remove_item(index))
    }
}
