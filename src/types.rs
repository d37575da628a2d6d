/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types shared by every layer of the stack.
//!
//! These are "inert" types: they are sent around and inspected, but have no behavior of their own.

use std::{
    fmt::{self, Display, Formatter},
    net::SocketAddr,
};

/// Identifier of a process in the fixed process set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessID(u64);

impl ProcessID {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for ProcessID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<u64> for ProcessID {
    fn from(int: u64) -> Self {
        Self(int)
    }
}

/// Position of a message in a monotonically increasing stream of messages. Sequences start at 0.
pub type Sequence = u64;

/// Globally unique identity of a broadcast message: its emitter and the emitter's sequence for it.
pub type MessageID = (ProcessID, Sequence);

/// An entry of the fixed, ordered host list supplied at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Host {
    pub id: ProcessID,
    pub address: SocketAddr,
}

impl Host {
    pub fn new(id: ProcessID, address: SocketAddr) -> Self {
        Self { id, address }
    }
}
