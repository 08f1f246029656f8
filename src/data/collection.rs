//! Ordered collections
//!
//! A sequence whose members carry their own order index. After every
//! successful mutation the indices are exactly `0..len`, matching
//! sequence position. A failed mutation changes nothing: all bounds are
//! checked before the first write.

use std::ops::RangeInclusive;

use serde::{Deserialize, Deserializer, Serialize};

use super::models::{OrderIndex, Slot};
use crate::error::{AppError, Result};
use crate::metrics::COLLECTION_MUTATIONS_TOTAL;

/// Member of an ordered collection
pub trait Ordered {
    /// Metrics/log label of collections holding this type
    const COLLECTION: &'static str;

    fn order_index(&self) -> OrderIndex;

    fn set_order_index(&mut self, index: OrderIndex);
}

/// Sequence with unique, dense order indices
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OrderedCollection<T> {
    items: Vec<T>,
}

impl<T: Ordered> OrderedCollection<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build from externally sourced members, renumbering them in the
    /// given order. Incoming order indices are not trusted.
    pub fn from_items(items: Vec<T>) -> Self {
        let mut collection = Self { items };
        if !collection.items.is_empty() {
            collection.renumber(0..=collection.items.len() - 1);
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Position of the first member matching `predicate`
    pub fn position_of(&self, predicate: impl Fn(&T) -> bool) -> Option<usize> {
        self.items.iter().position(predicate)
    }

    /// Insert a member
    ///
    /// Appends when `at` is `None`. The member receives order index `at`
    /// (or the old length) and every later member shifts up by one.
    ///
    /// # Errors
    /// `IndexOutOfRange` if `at > len`
    pub fn insert(&mut self, mut element: T, at: Option<usize>) -> Result<usize> {
        let len = self.items.len();
        let index = at.unwrap_or(len);
        if index > len {
            return Err(AppError::IndexOutOfRange { index, len }.recorded());
        }

        element.set_order_index(Slot::Assigned(index));
        self.items.insert(index, element);
        self.renumber(index..=len);

        self.record("insert", index);
        Ok(index)
    }

    /// Remove the member at `index`
    ///
    /// Later members shift down by one. The returned member no longer
    /// carries an order index.
    ///
    /// # Errors
    /// `IndexOutOfRange` if `index >= len`
    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        let len = self.items.len();
        if index >= len {
            return Err(AppError::IndexOutOfRange { index, len }.recorded());
        }

        let mut removed = self.items.remove(index);
        removed.set_order_index(Slot::Unassigned);
        if index < len - 1 {
            self.renumber(index..=len - 2);
        }

        self.record("remove", index);
        Ok(removed)
    }

    /// Move the member at `from` to position `to`
    ///
    /// Every member between the two positions (inclusive) is reindexed.
    ///
    /// # Errors
    /// `IndexOutOfRange` if either position is `>= len`
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.items.len();
        for index in [from, to] {
            if index >= len {
                return Err(AppError::IndexOutOfRange { index, len }.recorded());
            }
        }

        if from != to {
            let element = self.items.remove(from);
            self.items.insert(to, element);
            self.renumber(from.min(to)..=from.max(to));
        }

        self.record("reorder", to);
        Ok(())
    }

    /// Check uniqueness and density of order indices
    pub fn validate(&self) -> bool {
        self.items
            .iter()
            .enumerate()
            .all(|(position, item)| item.order_index() == Slot::Assigned(position))
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    fn renumber(&mut self, range: RangeInclusive<usize>) {
        for position in range {
            if let Some(item) = self.items.get_mut(position) {
                item.set_order_index(Slot::Assigned(position));
            }
        }
    }

    fn record(&self, operation: &'static str, index: usize) {
        COLLECTION_MUTATIONS_TOTAL
            .with_label_values(&[T::COLLECTION, operation])
            .inc();
        tracing::debug!(
            collection = T::COLLECTION,
            operation,
            index,
            len = self.items.len(),
            "Ordered collection mutated"
        );
    }
}

impl<T: Ordered> Default for OrderedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'de, T> Deserialize<'de> for OrderedCollection<T>
where
    T: Ordered + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from_items)
    }
}

impl<'a, T> IntoIterator for &'a OrderedCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
