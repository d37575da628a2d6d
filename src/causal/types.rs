/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of types specific to localized causal broadcast.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::{self, Display, Formatter},
};

use crate::types::{MessageID, ProcessID, Sequence};

use super::messages::CausalPacket;

/// Returned by [`configure`](super::LocalizedCausalBroadcast::configure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigureError {
    /// The dependency set was already fixed, by the configuration or an earlier call.
    AlreadyConfigured,
}

impl Display for ConfigureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigureError::AlreadyConfigured => write!(f, "dependencies are already configured"),
        }
    }
}

impl std::error::Error for ConfigureError {}

/// Outcome of handing one URB delivery to a [`CausalReceptionStore`].
#[derive(Debug, PartialEq, Eq)]
pub enum CausalReception<P> {
    /// The message, and every buffered message it unblocked, in delivery order.
    Delivered(Vec<(MessageID, P)>),

    /// The message waits for `missing` of its dependencies.
    Buffered { missing: usize },

    /// The source's messages were already delivered up to `expected`, which excludes this one.
    AlreadyDelivered { expected: Sequence },
}

/// The delivery state of one process: how many messages it delivered from each source, the
/// messages it cannot deliver yet, and which of those each future delivery may unblock.
///
/// ## Implications
///
/// A buffered message is registered once for every dependency `(d, s)` it is missing, under the
/// key `(d, s)`. That key is looked up exactly when the count of delivered messages from `d`
/// reaches `s`, so each delivery revisits only the messages it can possibly unblock. A message
/// with several missing dependencies is revisited once per dependency and delivered on the last.
pub struct CausalReceptionStore<P> {
    expected: HashMap<ProcessID, Sequence>,
    pending: HashMap<MessageID, CausalPacket<P>>,
    implications: HashMap<MessageID, BTreeSet<MessageID>>,
}

impl<P> CausalReceptionStore<P> {
    pub fn new() -> Self {
        Self {
            expected: HashMap::new(),
            pending: HashMap::new(),
            implications: HashMap::new(),
        }
    }

    /// Accept message `(source, seq)`, delivering it and whatever it unblocks if all of its
    /// dependencies are met, or buffering it otherwise.
    ///
    /// A message always depends on its source's previous messages, whether or not its dependency
    /// vector says so.
    pub fn receive(
        &mut self,
        source: ProcessID,
        seq: Sequence,
        packet: CausalPacket<P>,
    ) -> CausalReception<P> {
        let expected = self.expected(source);
        if seq < expected {
            return CausalReception::AlreadyDelivered { expected };
        }

        let missing = self.missing(source, seq, &packet.dependencies);
        if missing.is_empty() {
            return CausalReception::Delivered(self.deliver_cascade(source, seq, packet.payload));
        }

        let id = (source, seq);
        if !self.pending.contains_key(&id) {
            for dependency in &missing {
                self.implications.entry(*dependency).or_default().insert(id);
            }
            self.pending.insert(id, packet);
        }
        CausalReception::Buffered {
            missing: missing.len(),
        }
    }

    /// Number of messages delivered from `source`, which is also the next sequence expected from
    /// it.
    pub fn expected(&self, source: ProcessID) -> Sequence {
        self.expected.get(&source).copied().unwrap_or(0)
    }

    /// The delivered counts of `processes`, to be attached to a new message.
    pub fn vector_clock(&self, processes: &[ProcessID]) -> BTreeMap<ProcessID, Sequence> {
        processes
            .iter()
            .map(|process| (*process, self.expected(*process)))
            .collect()
    }

    /// Number of buffered messages.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn missing(
        &self,
        source: ProcessID,
        seq: Sequence,
        dependencies: &BTreeMap<ProcessID, Sequence>,
    ) -> BTreeSet<MessageID> {
        dependencies
            .iter()
            .map(|(process, seq)| (*process, *seq))
            .chain(std::iter::once((source, seq)))
            .filter(|(process, seq)| self.expected(*process) < *seq)
            .collect()
    }

    fn deliver_cascade(
        &mut self,
        source: ProcessID,
        seq: Sequence,
        payload: P,
    ) -> Vec<(MessageID, P)> {
        let mut delivered = Vec::new();
        let mut ready = vec![((source, seq), payload)];

        while let Some(((source, seq), payload)) = ready.pop() {
            let expected = self.expected.entry(source).or_insert(0);
            *expected += 1;
            let unblocked_key = (source, *expected);
            delivered.push(((source, seq), payload));

            let Some(waiting) = self.implications.remove(&unblocked_key) else {
                continue;
            };
            for id in waiting {
                let deliverable = match self.pending.get(&id) {
                    Some(packet) => self.missing(id.0, id.1, &packet.dependencies).is_empty(),
                    None => false,
                };
                if deliverable {
                    if let Some(packet) = self.pending.remove(&id) {
                        ready.push((id, packet.payload));
                    }
                }
            }
        }

        delivered
    }
}

impl<P> Default for CausalReceptionStore<P> {
    fn default() -> Self {
        Self::new()
    }
}
