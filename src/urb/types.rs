/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Quorum bookkeeping for uniform reliable broadcast.

use std::collections::{HashMap, HashSet};

use crate::{
    sequence_number_store::SequenceNumberStore,
    types::{MessageID, ProcessID, Sequence},
};

/// What [`UrbReceptionStore::add_message`] learned from one echo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reception {
    /// This is the first copy of the message seen locally, so it must be echoed onward.
    pub first_seen: bool,

    /// The echo completed a quorum, so the message must be delivered now. Holds the size of the
    /// acknowledgment set.
    pub quorum: Option<usize>,
}

/// Collects the acknowledgment sets of undelivered messages, and remembers which messages were
/// delivered.
///
/// A message's acknowledgment set is discarded as soon as it exceeds half of the hosts. From then
/// on only the delivered store remembers the message, so later echoes of it are ignored.
pub struct UrbReceptionStore {
    num_hosts: usize,
    acks: HashMap<MessageID, HashSet<ProcessID>>,
    delivered: HashMap<ProcessID, SequenceNumberStore>,
}

impl UrbReceptionStore {
    pub fn new(num_hosts: usize) -> Self {
        Self {
            num_hosts,
            acks: HashMap::new(),
            delivered: HashMap::new(),
        }
    }

    /// Record that `acknowledger` echoed message `(emitter, seq)`.
    ///
    /// Echoes of an already delivered message are no-ops. Repeated echoes from the same
    /// acknowledger count once.
    pub fn add_message(
        &mut self,
        emitter: ProcessID,
        seq: Sequence,
        acknowledger: ProcessID,
    ) -> Reception {
        let ignored = Reception {
            first_seen: false,
            quorum: None,
        };
        if self.is_delivered(emitter, seq) {
            return ignored;
        }

        let first_seen = !self.acks.contains_key(&(emitter, seq));
        let acknowledgers = self.acks.entry((emitter, seq)).or_default();
        acknowledgers.insert(acknowledger);

        let quorum = if acknowledgers.len() > self.num_hosts / 2 {
            let size = acknowledgers.len();
            self.acks.remove(&(emitter, seq));
            self.delivered.entry(emitter).or_default().add(seq);
            Some(size)
        } else {
            None
        };

        Reception { first_seen, quorum }
    }

    pub fn is_delivered(&self, emitter: ProcessID, seq: Sequence) -> bool {
        self.delivered
            .get(&emitter)
            .map_or(false, |store| store.contains(seq))
    }

    /// Number of messages seen but not yet delivered.
    pub fn pending(&self) -> usize {
        self.acks.len()
    }
}
