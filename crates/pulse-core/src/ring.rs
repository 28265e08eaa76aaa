//! Fixed-capacity FIFO buffer.

use std::collections::VecDeque;

use serde::{Serialize, Serializer};

/// A bounded buffer that evicts its oldest entry once capacity is exceeded.
///
/// Entries are kept in insertion order, so iteration always goes from the
/// oldest to the newest sample.
///
/// # Example
///
/// ```
/// use pulse_core::Ring;
///
/// let mut ring = Ring::new(2);
/// ring.push(1);
/// ring.push(2);
/// assert_eq!(ring.push(3), Some(1));
/// assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct Ring<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> Ring<T> {
    /// Creates an empty ring. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends an item, returning the evicted oldest item if the ring was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        self.items.push_back(item);
        if self.items.len() > self.capacity {
            self.items.pop_front()
        } else {
            None
        }
    }

    /// Keeps only the items matching the predicate. Returns how many were dropped.
    pub fn retain<F>(&mut self, f: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.items.len();
        self.items.retain(f);
        before - self.items.len()
    }

    /// Drops the oldest items until at most `max` remain. Returns how many were dropped.
    pub fn truncate_oldest(&mut self, max: usize) -> usize {
        let excess = self.items.len().saturating_sub(max);
        self.items.drain(..excess);
        excess
    }

    /// Removes and returns the oldest item.
    pub fn pop_oldest(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recently pushed item.
    pub fn newest(&self) -> Option<&T> {
        self.items.back()
    }

    /// The oldest item still retained.
    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }
}

impl<T: Serialize> Serialize for Ring<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_within_capacity_keeps_everything() {
        let mut ring = Ring::new(3);
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.oldest(), Some(&1));
        assert_eq!(ring.newest(), Some(&2));
    }

    #[test]
    fn test_overflow_evicts_oldest_first() {
        let mut ring = Ring::new(1000);
        for i in 0..1001 {
            ring.push(i);
        }

        assert_eq!(ring.len(), 1000);
        assert_eq!(ring.oldest(), Some(&1));
        assert_eq!(ring.newest(), Some(&1000));
    }

    #[test]
    fn test_zero_capacity_behaves_as_one() {
        let mut ring = Ring::new(0);
        ring.push("a");
        assert_eq!(ring.push("b"), Some("a"));
        assert_eq!(ring.capacity(), 1);
    }

    #[test]
    fn test_retain_reports_dropped_count() {
        let mut ring = Ring::new(10);
        for i in 0..10 {
            ring.push(i);
        }

        let dropped = ring.retain(|i| i % 2 == 0);
        assert_eq!(dropped, 5);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_truncate_oldest() {
        let mut ring = Ring::new(10);
        for i in 0..6 {
            ring.push(i);
        }

        assert_eq!(ring.truncate_oldest(4), 2);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4, 5]);
        assert_eq!(ring.truncate_oldest(10), 0);
    }

    #[test]
    fn test_pop_oldest_drains_in_push_order() {
        let mut ring = Ring::new(3);
        ring.push('a');
        ring.push('b');

        assert_eq!(ring.pop_oldest(), Some('a'));
        assert_eq!(ring.pop_oldest(), Some('b'));
        assert_eq!(ring.pop_oldest(), None);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_serializes_as_sequence() {
        let mut ring = Ring::new(2);
        ring.push(1);
        ring.push(2);
        ring.push(3);

        assert_eq!(serde_json::to_string(&ring).unwrap(), "[2,3]");
    }
}
