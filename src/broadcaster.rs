/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! An application that broadcasts a fixed number of numbered messages and records what it
//! broadcast and delivered.
//!
//! ## Output format
//!
//! The output log has one line per event:
//! - `b <i>` is appended just before this process broadcasts payload `i`.
//! - `d <source> <i>` is appended when payload `i` from process `source` is delivered.
//!
//! Payloads are the numbers `1..=n`, so the delivered lines of each source are strictly
//! increasing under either broadcast mode.

use std::{
    fs,
    io,
    path::Path,
    sync::{Arc, Condvar, Mutex},
    time::Duration,
};

use crate::{
    causal::LocalizedCausalBroadcast,
    config::Configuration,
    fifo::FifoBroadcast,
    networking::{LinkError, Transport, UdpTransport},
    stop::{StopSignal, Stoppable},
    types::ProcessID,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BroadcastMode {
    Fifo,
    Causal,
}

enum Layer {
    Fifo(FifoBroadcast<u64>),
    Causal(LocalizedCausalBroadcast<u64>),
}

impl Layer {
    fn broadcast(&self, payload: u64) {
        match self {
            Layer::Fifo(fifo) => {
                fifo.broadcast(payload);
            }
            Layer::Causal(causal) => {
                causal.broadcast(payload);
            }
        }
    }

    fn stop(&self) {
        match self {
            Layer::Fifo(fifo) => fifo.stop(),
            Layer::Causal(causal) => causal.stop(),
        }
    }
}

#[derive(Default)]
struct Progress {
    output: String,
    own_delivered: u64,
}

/// Shared between the broadcasting thread and the delivery callback.
struct Tracker {
    progress: Mutex<Progress>,
    all_delivered: Condvar,
}

pub struct Broadcaster {
    me: ProcessID,
    num_messages: u64,
    tracker: Arc<Tracker>,
    stop: StopSignal,
    layer: Layer,
    poll_interval: Duration,
}

impl Broadcaster {
    /// Start the broadcast stack for `mode` over `transport`.
    pub fn new<T: Transport>(
        config: &Configuration,
        mode: BroadcastMode,
        num_messages: u64,
        transport: T,
    ) -> Result<Self, LinkError> {
        let me = config.me;
        let tracker = Arc::new(Tracker {
            progress: Mutex::new(Progress::default()),
            all_delivered: Condvar::new(),
        });
        let stop = StopSignal::new();

        let deliver_tracker = tracker.clone();
        let on_deliver = move |payload: u64, source: ProcessID| {
            let mut progress = deliver_tracker
                .progress
                .lock()
                .expect("broadcaster progress lock poisoned");
            progress.output.push_str(&format!("d {} {}\n", source, payload));
            if source == me {
                progress.own_delivered += 1;
                deliver_tracker.all_delivered.notify_all();
            }
        };

        let layer = match mode {
            BroadcastMode::Fifo => Layer::Fifo(FifoBroadcast::with_stop_signal(
                config,
                transport,
                stop.clone(),
                on_deliver,
            )?),
            BroadcastMode::Causal => Layer::Causal(LocalizedCausalBroadcast::with_stop_signal(
                config,
                transport,
                stop.clone(),
                on_deliver,
            )?),
        };

        Ok(Self {
            me,
            num_messages,
            tracker,
            stop,
            layer,
            poll_interval: config.poll_interval,
        })
    }

    /// Start the broadcast stack over a UDP socket bound to this process's address.
    pub fn bind(
        config: &Configuration,
        mode: BroadcastMode,
        num_messages: u64,
    ) -> Result<Self, LinkError> {
        let address = config
            .address_of(config.me)
            .ok_or(LinkError::UnknownProcess(config.me))?;
        let transport = UdpTransport::bind(address, config.poll_interval)?;
        Self::new(config, mode, num_messages, transport)
    }

    /// Broadcast payloads `1..=n`, then wait until all of them were delivered locally.
    ///
    /// Returns `false` if the broadcaster was stopped before that happened.
    pub fn broadcast_all(&self) -> bool {
        for i in 1..=self.num_messages {
            if self.stop.is_set() {
                return false;
            }
            self.tracker
                .progress
                .lock()
                .expect("broadcaster progress lock poisoned")
                .output
                .push_str(&format!("b {}\n", i));
            self.layer.broadcast(i);
        }

        let mut progress = self
            .tracker
            .progress
            .lock()
            .expect("broadcaster progress lock poisoned");
        while progress.own_delivered < self.num_messages {
            if self.stop.is_set() {
                return false;
            }
            progress = self
                .tracker
                .all_delivered
                .wait_timeout(progress, self.poll_interval)
                .expect("broadcaster progress lock poisoned")
                .0;
        }
        true
    }

    /// The output log accumulated since the last [`write_output`](Self::write_output).
    pub fn output(&self) -> String {
        self.tracker
            .progress
            .lock()
            .expect("broadcaster progress lock poisoned")
            .output
            .clone()
    }

    /// Write the accumulated output log to `path`, then clear it.
    pub fn write_output(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut progress = self
            .tracker
            .progress
            .lock()
            .expect("broadcaster progress lock poisoned");
        fs::write(path, progress.output.as_bytes())?;
        progress.output.clear();
        Ok(())
    }

    pub fn me(&self) -> ProcessID {
        self.me
    }
}

impl Stoppable for Broadcaster {
    fn stop(&self) {
        self.layer.stop();
        self.tracker.all_delivered.notify_all();
    }

    fn is_stopped(&self) -> bool {
        self.stop.is_set()
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.stop()
    }
}
