/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! FIFO broadcast: every process delivers each source's messages in the order the source
//! broadcast them.
//!
//! Built over [uniform reliable broadcast](crate::urb), which already identifies each message by
//! `(source, seq)` with consecutive sequences per source. A per-source
//! [`FifoReceptionStore`](types::FifoReceptionStore) delivers the expected sequence immediately,
//! buffers anything ahead of it, and drains the buffer whenever the gap closes. No order is
//! imposed between different sources.

pub(crate) mod implementation;

pub mod types;

pub use implementation::FifoBroadcast;
