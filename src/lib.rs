/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A ladder of broadcast abstractions for a fixed, known set of processes communicating over an
//! unreliable datagram network.
//!
//! Each layer strengthens the delivery guarantee of the layer below it:
//! 1. [`FairLossLink`](networking::fair_loss_link::FairLossLink): unreliable datagrams between
//!    named processes.
//! 2. [`PerfectLink`](networking::perfect_link::PerfectLink): exactly-once point-to-point
//!    delivery through retransmission, acknowledgment and deduplication.
//! 3. [`BestEffortBroadcast`](best_effort::BestEffortBroadcast): one perfect link per
//!    destination.
//! 4. [`UniformReliableBroadcast`](urb::UniformReliableBroadcast): echo broadcast with
//!    majority acknowledgment.
//! 5. [`FifoBroadcast`](fifo::FifoBroadcast) and
//!    [`LocalizedCausalBroadcast`](causal::LocalizedCausalBroadcast): per-source FIFO and
//!    vector-clock causal delivery.
//!
//! Every layer runs its own worker threads and exposes an idempotent `stop`. All layers of one
//! stack share a single [`StopSignal`](stop::StopSignal), so stopping the top layer is observed
//! by every loop below it.
//!
//! ## Starting a process
//!
//! ```ignore
//! let configuration = Configuration::builder()
//!     .me(ProcessID::new(1))
//!     .hosts(hosts)
//!     .build();
//! let transport = UdpTransport::bind(address, configuration.poll_interval)?;
//! let fifo = FifoBroadcast::new(&configuration, transport, |payload: u64, source| {
//!     println!("d {} {}", source, payload);
//! })?;
//! fifo.broadcast(1);
//! ```
//!
//! The protocol assumes that strictly more than half of the processes are correct for the whole
//! run. This assumption is not checked.

pub mod best_effort;

pub mod bounded_queue;

pub mod broadcaster;

pub mod causal;

pub mod config;

pub mod fifo;

pub(crate) mod logging;

pub mod networking;

pub mod payload;

pub mod sequence_number_store;

pub mod stop;

pub mod types;

pub mod urb;
