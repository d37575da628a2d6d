/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Point-to-point links: a pluggable datagram [transport], the unreliable
//! [fair-loss link](fair_loss_link) on top of it, and the exactly-once
//! [perfect link](perfect_link) built by retransmitting over the fair-loss link.

pub mod transport;

pub mod fair_loss_link;

pub mod messages;

pub mod perfect_link;

pub(crate) mod window;

pub use fair_loss_link::{FairLossEndpoint, FairLossLink, LinkError};
pub use perfect_link::PerfectLink;
pub use transport::{Transport, UdpTransport};
