//! A "bag" of `u64`s supporting O(1) uniformly-random removal.
//!
//! Used to hold pre-generated, packed Base-53 ids of a given length so a
//! `put` at that length can hand one out without re-running id generation
//! (and, during recovery, without re-walking the whole id space on startup).

use crate::error::RandomBagEmpty;
use parking_lot::Mutex;
use rand::{rngs::OsRng, Rng};

/// Swap-remove random bag: popping swaps the chosen slot with the last
/// element and truncates, so both push and pop are O(1).
#[derive(Debug, Default)]
struct Bag {
    items: Vec<u64>,
}

impl Bag {
    fn pop_random(&mut self) -> Option<u64> {
        if self.items.is_empty() {
            return None;
        }
        let idx = OsRng.gen_range(0..self.items.len());
        let last = self.items.len() - 1;
        self.items.swap(idx, last);
        self.items.pop()
    }

    fn push(&mut self, value: u64) {
        self.items.push(value);
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Thread-safe wrapper around [`Bag`].
#[derive(Debug, Default)]
pub struct RandomBag64 {
    inner: Mutex<Bag>,
}

impl RandomBag64 {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Bag::default()) }
    }

    pub fn from_vec(items: Vec<u64>) -> Self {
        Self { inner: Mutex::new(Bag { items }) }
    }

    /// Removes and returns a uniformly-random element, or `Err` if empty.
    pub fn pop_random(&self) -> Result<u64, RandomBagEmpty> {
        self.inner.lock().pop_random().ok_or(RandomBagEmpty)
    }

    pub fn push(&self, value: u64) {
        self.inner.lock().push(value);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn pop_random_on_empty_bag_errors() {
        let bag = RandomBag64::new();
        assert_eq!(bag.pop_random(), Err(RandomBagEmpty));
    }

    #[test]
    fn push_then_pop_round_trips() {
        let bag = RandomBag64::new();
        bag.push(42);
        assert_eq!(bag.pop_random(), Ok(42));
        assert_eq!(bag.pop_random(), Err(RandomBagEmpty));
    }

    #[test]
    fn pop_random_drains_every_element_exactly_once() {
        let values: Vec<u64> = (0..200).collect();
        let bag = RandomBag64::from_vec(values.clone());
        let mut seen = HashSet::new();
        while let Ok(v) = bag.pop_random() {
            assert!(seen.insert(v), "value {v} popped twice");
        }
        assert_eq!(seen.len(), values.len());
        for v in values {
            assert!(seen.contains(&v));
        }
    }

    #[test]
    fn len_tracks_pushes_and_pops() {
        let bag = RandomBag64::new();
        assert_eq!(bag.len(), 0);
        bag.push(1);
        bag.push(2);
        assert_eq!(bag.len(), 2);
        bag.pop_random().unwrap();
        assert_eq!(bag.len(), 1);
    }
}
