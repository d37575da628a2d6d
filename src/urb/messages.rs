/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The packet every process echoes for a uniformly reliable broadcast.
//!
//! ```text
//! [emitter: 8 bytes][sequence: 8 bytes][inner payload...]
//! ```

use crate::{
    payload::{read_u64, write_u64, DecodeError, Payload},
    types::{MessageID, ProcessID, Sequence},
};

/// A broadcast message together with its identity. The identity is assigned by the emitter and
/// travels unchanged through every echo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrbPacket<P> {
    pub emitter: ProcessID,
    pub seq: Sequence,
    pub payload: P,
}

impl<P> UrbPacket<P> {
    pub fn id(&self) -> MessageID {
        (self.emitter, self.seq)
    }
}

impl<P: Payload> Payload for UrbPacket<P> {
    fn encode(&self, buf: &mut Vec<u8>) {
        write_u64(buf, self.emitter.int());
        write_u64(buf, self.seq);
        self.payload.encode(buf);
    }

    fn decode_from(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        let emitter = ProcessID::new(read_u64(buf)?);
        let seq = read_u64(buf)?;
        let payload = P::decode_from(buf)?;
        Ok(Self {
            emitter,
            seq,
            payload,
        })
    }
}
