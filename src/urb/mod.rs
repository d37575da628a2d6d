/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Uniform reliable broadcast: if any process delivers a message, every correct process
//! eventually delivers it, provided a strict majority of processes is correct.
//!
//! # Echo broadcast
//!
//! Broadcasting a payload assigns it the next sequence of this emitter and wraps it in a
//! [`UrbPacket`](messages::UrbPacket). The emitter then treats the packet as if it had received
//! it from itself: it records its own acknowledgment and echoes the packet to every process
//! through [best-effort broadcast](crate::best_effort).
//!
//! Every process that receives a copy of `(emitter, seq)` from a process `p` records `p` in the
//! message's acknowledgment set. The first time a process sees a message it echoes it onward, so
//! every message is echoed by every correct process exactly once. A message is delivered as soon
//! as its acknowledgment set holds more than half of the hosts:
//!
//! ```text
//! |acks(emitter, seq)| > n / 2
//! ```
//!
//! Any two majorities intersect, so a delivered message has been echoed by at least one correct
//! process, and therefore reaches every correct process even if its emitter crashed.
//!
//! # Priorities
//!
//! Echoes of other processes' messages are queued on an unbounded queue that the sender worker
//! always drains first. Messages submitted by the application go through a bounded queue, so a
//! fast application is held back before the messages already in flight are.

pub mod messages;

pub(crate) mod implementation;

pub mod types;

pub use implementation::UniformReliableBroadcast;
