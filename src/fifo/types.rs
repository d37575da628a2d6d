/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Per-source reassembly of URB deliveries into broadcast order.

use std::collections::HashMap;

use crate::types::Sequence;

/// The reordering state of one source: the next sequence to deliver, and the messages that
/// arrived ahead of it.
pub struct FifoReceptionStore<P> {
    expected: Sequence,
    pending: HashMap<Sequence, P>,
}

impl<P> FifoReceptionStore<P> {
    pub fn new() -> Self {
        Self {
            expected: 0,
            pending: HashMap::new(),
        }
    }

    /// Accept message `seq` and return every message that became deliverable, in sequence order.
    ///
    /// # Errors
    ///
    /// Returns `Err(expected)` if `seq` was already delivered.
    pub fn receive(&mut self, seq: Sequence, payload: P) -> Result<Vec<(Sequence, P)>, Sequence> {
        if seq < self.expected {
            return Err(self.expected);
        }
        if seq > self.expected {
            self.pending.insert(seq, payload);
            return Ok(Vec::new());
        }

        let mut ready = vec![(seq, payload)];
        self.expected += 1;
        while let Some(next) = self.pending.remove(&self.expected) {
            ready.push((self.expected, next));
            self.expected += 1;
        }
        Ok(ready)
    }

    /// The next sequence to be delivered from this source.
    pub fn expected(&self) -> Sequence {
        self.expected
    }

    /// Number of messages waiting for an earlier one.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<P> Default for FifoReceptionStore<P> {
    fn default() -> Self {
        Self::new()
    }
}
