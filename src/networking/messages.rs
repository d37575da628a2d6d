/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Wire format of the perfect link.
//!
//! ```text
//! [sequence: 8 bytes, big-endian][payload bytes...]
//! ```
//!
//! An empty payload makes the packet an acknowledgment of `sequence`; otherwise the packet carries
//! data numbered `sequence`.

use crate::{
    payload::{read_u64, write_u64, DecodeError},
    types::Sequence,
};

/// Bytes in front of the payload.
pub const HEADER_SIZE: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkPacket {
    Data { seq: Sequence, payload: Vec<u8> },
    Ack { seq: Sequence },
}

impl LinkPacket {
    /// Encode a data packet straight from borrowed payload bytes.
    pub fn encode_data(seq: Sequence, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        write_u64(&mut buf, seq);
        buf.extend_from_slice(payload);
        buf
    }

    pub fn encode_ack(seq: Sequence) -> Vec<u8> {
        seq.to_be_bytes().to_vec()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            LinkPacket::Data { seq, payload } => Self::encode_data(*seq, payload),
            LinkPacket::Ack { seq } => Self::encode_ack(*seq),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = bytes;
        let seq = read_u64(&mut buf)?;
        if buf.is_empty() {
            Ok(LinkPacket::Ack { seq })
        } else {
            Ok(LinkPacket::Data {
                seq,
                payload: buf.to_vec(),
            })
        }
    }
}
