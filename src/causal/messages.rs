/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The packet a localized causal broadcast hands to URB.
//!
//! ```text
//! [payload...][process: 8 bytes][sequence: 8 bytes]...
//! ```
//!
//! The dependency pairs run to the end of the buffer, so a [`CausalPacket`] must be the last value
//! in any encoding that embeds it. The URB packet carries it as its final field.

use std::collections::BTreeMap;

use crate::{
    payload::{read_u64, write_u64, DecodeError, Payload},
    types::{ProcessID, Sequence},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CausalPacket<P> {
    pub payload: P,

    /// For every dependency `d`, the number of messages from `d` a process must have delivered
    /// before it may deliver this one. The entry of the emitter itself is the message's own
    /// sequence.
    pub dependencies: BTreeMap<ProcessID, Sequence>,
}

impl<P: Payload> Payload for CausalPacket<P> {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.payload.encode(buf);
        for (process, seq) in &self.dependencies {
            write_u64(buf, process.int());
            write_u64(buf, *seq);
        }
    }

    fn decode_from(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        let payload = P::decode_from(buf)?;
        let mut dependencies = BTreeMap::new();
        while !buf.is_empty() {
            let process = ProcessID::new(read_u64(buf)?);
            let seq = read_u64(buf)?;
            dependencies.insert(process, seq);
        }
        Ok(Self {
            payload,
            dependencies,
        })
    }
}
