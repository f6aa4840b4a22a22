//! Pending deltas, kept sorted by a caller-supplied comparator.

use core::cmp::Ordering;
use core::fmt;
use std::collections::VecDeque;

use crate::compare::{compare_sequences, Relation};
use crate::delta::DeltaEvent;

/// A queue that keeps its items sorted on insertion.
///
/// Duplicates are kept; deciding whether an item is stale is left to the
/// consumer.
pub struct OrderedBuffer<T, F = fn(&T, &T) -> Ordering> {
    items: VecDeque<T>,
    compare: F,
}

impl<T, F> OrderedBuffer<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    #[must_use]
    pub const fn new(compare: F) -> Self {
        Self {
            items: VecDeque::new(),
            compare,
        }
    }

    /// Inserts `item` in front of the first element that is not less than it.
    pub fn enqueue(&mut self, item: T) {
        let position = self
            .items
            .iter()
            .position(|existing| (self.compare)(existing, &item) != Ordering::Less)
            .unwrap_or(self.items.len());

        self.items.insert(position, item);
    }

    /// Removes and returns the lowest item.
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: fmt::Debug, F> fmt::Debug for OrderedBuffer<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedBuffer")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

/// Orders deltas by their base sequence. An absent or empty base sorts
/// before everything else.
pub fn delta_order<T>(a: &DeltaEvent<T>, b: &DeltaEvent<T>) -> Ordering {
    let a = a.base_sequence.as_ref().filter(|base| !base.is_empty());
    let b = b.base_sequence.as_ref().filter(|base| !base.is_empty());

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match compare_sequences(a, b).relation {
            Relation::IncomingNewer => Ordering::Less,
            Relation::LocalNewer => Ordering::Greater,
            Relation::Equal | Relation::Desync => Ordering::Equal,
        },
    }
}

/// A delta buffer ordered by [`delta_order`].
impl<T> Default for OrderedBuffer<DeltaEvent<T>> {
    fn default() -> Self {
        Self::new(delta_order::<T>)
    }
}
