/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Localized causal broadcast: a message is delivered only after every message it causally
//! depends on, where causality is restricted to a configured set of processes.
//!
//! # Dependency vectors
//!
//! Each process declares a fixed set of processes it depends on. When it broadcasts, it attaches
//! the number of messages it has delivered so far from each of them, together with the sequence of
//! the new message under its own ID:
//!
//! ```text
//! dependencies = { d: delivered(d) for d in configured } + { me: seq }
//! ```
//!
//! A receiver delivers the message once, for every entry `(d, s)`, it has delivered at least `s`
//! messages from `d`. The entry of the emitter makes every process deliver each emitter's
//! messages in the order they were broadcast.
//!
//! # Buffering
//!
//! Messages that arrive before their dependencies are buffered by the
//! [`CausalReceptionStore`](types::CausalReceptionStore), which links them to the exact
//! deliveries that can unblock them. A single delivery may release an arbitrarily long chain of
//! buffered messages; the chain is resolved iteratively.

pub mod messages;

pub(crate) mod implementation;

pub mod types;

pub use implementation::LocalizedCausalBroadcast;
