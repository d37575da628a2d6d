/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The encode/decode capability that every payload carried by the stack must implement.
//!
//! All multi-byte integers are big-endian on the wire. A payload decodes itself from the front of
//! a byte slice and leaves the rest for whoever comes after it, which is how layer packets nest:
//! a [causal packet](crate::causal::CausalPacket) appends its dependency vector after the inner
//! payload, so the inner payload must know its own length.
//!
//! A payload must also encode to at least one byte, since an empty perfect-link body is read as
//! an acknowledgment.

use std::fmt::{self, Display, Formatter};

pub trait Payload: Clone + Send + Sync + 'static {
    /// Append the encoding of `self` to `buf`.
    fn encode(&self, buf: &mut Vec<u8>);

    /// Decode a value from the front of `buf`, advancing `buf` past the consumed bytes.
    fn decode_from(buf: &mut &[u8]) -> Result<Self, DecodeError>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    /// Decode a value that must span all of `bytes`.
    fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = bytes;
        let value = Self::decode_from(&mut buf)?;
        if !buf.is_empty() {
            return Err(DecodeError::TrailingBytes(buf.len()));
        }
        Ok(value)
    }
}

/// Enumerates the ways decoding a packet can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended before a complete value could be read.
    Truncated { needed: usize, available: usize },

    /// A complete value was read but bytes were left over.
    TrailingBytes(usize),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { needed, available } => write!(
                f,
                "truncated packet: needed {} bytes, {} available",
                needed, available
            ),
            DecodeError::TrailingBytes(n) => write!(f, "{} trailing bytes after packet", n),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Split `n` bytes off the front of `buf`.
pub(crate) fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8], DecodeError> {
    if buf.len() < n {
        return Err(DecodeError::Truncated {
            needed: n,
            available: buf.len(),
        });
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

pub(crate) fn read_u64(buf: &mut &[u8]) -> Result<u64, DecodeError> {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(take(buf, 8)?);
    Ok(u64::from_be_bytes(bytes))
}

pub(crate) fn write_u64(buf: &mut Vec<u8>, int: u64) {
    buf.extend_from_slice(&int.to_be_bytes());
}

macro_rules! impl_payload_for_int {
    ($($int:ty),*) => {
        $(
            impl Payload for $int {
                fn encode(&self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.to_be_bytes());
                }

                fn decode_from(buf: &mut &[u8]) -> Result<Self, DecodeError> {
                    let mut bytes = [0u8; std::mem::size_of::<$int>()];
                    bytes.copy_from_slice(take(buf, std::mem::size_of::<$int>())?);
                    Ok(<$int>::from_be_bytes(bytes))
                }
            }
        )*
    };
}

impl_payload_for_int!(u8, u16, u32, u64, i64);

impl<const N: usize> Payload for [u8; N] {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }

    fn decode_from(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(take(buf, N)?);
        Ok(bytes)
    }
}
