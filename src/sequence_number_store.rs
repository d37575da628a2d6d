/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Compact membership tracking for a stream of sequence numbers.
//!
//! A [`SequenceNumberStore`] remembers which sequences have been seen using a counter of the
//! smallest sequence not yet seen (`first_not_stored`) and a sparse set of the sequences above
//! it. Memory is therefore proportional to the number of out-of-order gaps, not to the number of
//! sequences seen.
//!
//! The store itself is not synchronized. Shared stores are wrapped in a `Mutex` owned by the
//! structure that holds them, so each store has its own lock.

use std::collections::HashSet;

use crate::types::Sequence;

#[derive(Clone, Debug, Default)]
pub struct SequenceNumberStore {
    first_not_stored: Sequence,
    sparse: HashSet<Sequence>,
}

impl SequenceNumberStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `seq` as seen. Returns whether it was already contained.
    pub fn add(&mut self, seq: Sequence) -> bool {
        let contained = self.contains(seq);

        if seq > self.first_not_stored {
            self.sparse.insert(seq);
        } else if seq == self.first_not_stored {
            self.first_not_stored += 1;
            while self.sparse.remove(&self.first_not_stored) {
                self.first_not_stored += 1;
            }
        }

        contained
    }

    pub fn contains(&self, seq: Sequence) -> bool {
        seq < self.first_not_stored || self.sparse.contains(&seq)
    }

    /// The smallest sequence that has not been seen.
    pub fn first_not_stored(&self) -> Sequence {
        self.first_not_stored
    }

    /// Number of sequences seen out of order and not yet absorbed into the counter.
    pub fn gaps(&self) -> usize {
        self.sparse.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_adds_only_move_the_counter() {
        let mut store = SequenceNumberStore::new();
        for seq in 0..100 {
            assert!(!store.add(seq));
        }
        assert_eq!(store.first_not_stored(), 100);
        assert_eq!(store.gaps(), 0);
        assert!(store.contains(99));
        assert!(!store.contains(100));
    }

    #[test]
    fn out_of_order_adds_are_compacted_when_gap_fills() {
        let mut store = SequenceNumberStore::new();
        assert!(!store.add(3));
        assert!(!store.add(1));
        assert!(!store.add(2));
        assert_eq!(store.first_not_stored(), 0);
        assert_eq!(store.gaps(), 3);
        assert!(store.contains(2));
        assert!(!store.contains(0));

        assert!(!store.add(0));
        assert_eq!(store.first_not_stored(), 4);
        assert_eq!(store.gaps(), 0);
    }

    #[test]
    fn add_is_idempotent() {
        let mut store = SequenceNumberStore::new();
        assert!(!store.add(5));
        assert!(store.add(5));
        assert!(!store.add(0));
        assert!(store.add(0));
        assert_eq!(store.first_not_stored(), 1);
    }

    #[test]
    fn any_permutation_ends_at_n() {
        // A fixed scramble of 0..64: multiplying by a unit modulo 64 is a permutation.
        let n: Sequence = 64;
        let mut store = SequenceNumberStore::new();
        for i in 0..n {
            let seq = (i * 37 + 11) % n;
            assert!(!store.add(seq));
        }
        assert_eq!(store.first_not_stored(), n);
        assert_eq!(store.gaps(), 0);
        for seq in 0..n {
            assert!(store.add(seq));
        }
    }
}
