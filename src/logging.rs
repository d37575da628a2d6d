/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out protocol events.
//!
//! The logs defined in this module are printed if the user enabled them via the process's
//! [configuration](crate::config::Configuration).
//!
//! The crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the event in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a causal delivery is printed:
//!
//! ```text
//! CausalDeliver, 1701329264, 2, 5, AAAAAAA
//! ```
//!
//! In the snippet:
//! - The third value is the source process.
//! - The fourth value is the sequence of the message at its source.
//! - The fifth value is the first seven characters of the Base64 encoding of the payload.

use std::{net::SocketAddr, time::SystemTime};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::types::{ProcessID, Sequence};

// Names of each event in PascalCase for printing:
pub const TRANSMIT: &str = "Transmit";
pub const RETRANSMIT: &str = "Retransmit";
pub const RECEIVE_ACK: &str = "ReceiveAck";
pub const RESIZE_WINDOW: &str = "ResizeWindow";
pub const DISCARD_DATAGRAM: &str = "DiscardDatagram";

pub const ECHO: &str = "Echo";
pub const URB_DELIVER: &str = "UrbDeliver";

pub const FIFO_DELIVER: &str = "FifoDeliver";
pub const CAUSAL_DELIVER: &str = "CausalDeliver";
pub const BUFFER_MESSAGE: &str = "BufferMessage";

pub(crate) fn transmit(destination: ProcessID, seq: Sequence, first_time: bool) {
    log::trace!(
        "{}, {}, {}, {}",
        if first_time { TRANSMIT } else { RETRANSMIT },
        secs_since_unix_epoch(SystemTime::now()),
        destination,
        seq
    )
}

pub(crate) fn receive_ack(origin: ProcessID, seq: Sequence) {
    log::trace!(
        "{}, {}, {}, {}",
        RECEIVE_ACK,
        secs_since_unix_epoch(SystemTime::now()),
        origin,
        seq
    )
}

pub(crate) fn resize_window(destination: ProcessID, old: usize, new: usize) {
    log::debug!(
        "{}, {}, {}, {}, {}",
        RESIZE_WINDOW,
        secs_since_unix_epoch(SystemTime::now()),
        destination,
        old,
        new
    )
}

pub(crate) fn discard_datagram(origin: SocketAddr, len: usize) {
    log::trace!(
        "{}, {}, {}, {}",
        DISCARD_DATAGRAM,
        secs_since_unix_epoch(SystemTime::now()),
        origin,
        len
    )
}

pub(crate) fn echo(emitter: ProcessID, seq: Sequence) {
    log::trace!(
        "{}, {}, {}, {}",
        ECHO,
        secs_since_unix_epoch(SystemTime::now()),
        emitter,
        seq
    )
}

pub(crate) fn urb_deliver(emitter: ProcessID, seq: Sequence, acks: usize) {
    log::debug!(
        "{}, {}, {}, {}, {}",
        URB_DELIVER,
        secs_since_unix_epoch(SystemTime::now()),
        emitter,
        seq,
        acks
    )
}

pub(crate) fn ordered_deliver(event: &str, source: ProcessID, seq: Sequence, payload: &[u8]) {
    log::info!(
        "{}, {}, {}, {}, {}",
        event,
        secs_since_unix_epoch(SystemTime::now()),
        source,
        seq,
        first_seven_base64_chars(payload)
    )
}

pub(crate) fn buffer_message(source: ProcessID, seq: Sequence, missing: usize) {
    log::debug!(
        "{}, {}, {}, {}, {}",
        BUFFER_MESSAGE,
        secs_since_unix_epoch(SystemTime::now()),
        source,
        seq,
        missing
    )
}

/// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

pub(crate) fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
