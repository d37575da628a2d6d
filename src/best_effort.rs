/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Best-effort broadcast: send to every process, including this one, over perfect links.
//!
//! If the sender stays correct, every correct process delivers the message exactly once. If the
//! sender crashes midway, some processes may never deliver it.

use crate::{
    config::Configuration,
    networking::{LinkError, PerfectLink, Transport},
    payload::Payload,
    stop::{StopSignal, Stoppable},
    types::ProcessID,
};

pub struct BestEffortBroadcast<P: Payload> {
    hosts: Vec<ProcessID>,
    link: PerfectLink<P>,
    stop: StopSignal,
}

impl<P: Payload> BestEffortBroadcast<P> {
    pub fn new<T, F>(config: &Configuration, transport: T, on_deliver: F) -> Result<Self, LinkError>
    where
        T: Transport,
        F: Fn(P, ProcessID) + Send + 'static,
    {
        Self::with_stop_signal(config, transport, StopSignal::new(), on_deliver)
    }

    pub(crate) fn with_stop_signal<T, F>(
        config: &Configuration,
        transport: T,
        stop: StopSignal,
        on_deliver: F,
    ) -> Result<Self, LinkError>
    where
        T: Transport,
        F: Fn(P, ProcessID) + Send + 'static,
    {
        let link = PerfectLink::with_stop_signal(config, transport, stop.clone(), on_deliver)?;
        Ok(Self {
            hosts: config.host_ids().collect(),
            link,
            stop,
        })
    }

    /// Send `payload` to every host in host-list order. Never blocks, even when some host has
    /// stopped acknowledging.
    pub fn broadcast(&self, payload: &P) {
        for &host in &self.hosts {
            if self.stop.is_set() {
                return;
            }
            self.link.send(payload, host);
        }
    }

    pub fn me(&self) -> ProcessID {
        self.link.me()
    }

    pub fn num_hosts(&self) -> usize {
        self.hosts.len()
    }
}

impl<P: Payload> Stoppable for BestEffortBroadcast<P> {
    fn stop(&self) {
        self.stop.set();
        self.link.stop();
    }

    fn is_stopped(&self) -> bool {
        self.stop.is_set()
    }
}
