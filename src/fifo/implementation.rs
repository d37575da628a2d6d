/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::{collections::HashMap, sync::Mutex};

use crate::{
    config::Configuration,
    logging,
    networking::{LinkError, Transport},
    payload::Payload,
    stop::{StopSignal, Stoppable},
    types::{ProcessID, Sequence},
    urb::UniformReliableBroadcast,
};

use super::types::FifoReceptionStore;

pub struct FifoBroadcast<P: Payload> {
    urb: UniformReliableBroadcast<P>,
}

impl<P: Payload> FifoBroadcast<P> {
    /// Start a FIFO broadcast instance. `on_deliver(payload, source)` is invoked once per message,
    /// in the order each source broadcast its messages.
    pub fn new<T, F>(config: &Configuration, transport: T, on_deliver: F) -> Result<Self, LinkError>
    where
        T: Transport,
        F: Fn(P, ProcessID) + Send + Sync + 'static,
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
        F: Fn(P, ProcessID) + Send + Sync + 'static,
    {
        let sources: HashMap<ProcessID, Mutex<FifoReceptionStore<P>>> = config
            .host_ids()
            .map(|id| (id, Mutex::new(FifoReceptionStore::new())))
            .collect();
        let log_events = config.log_events;

        let urb = UniformReliableBroadcast::with_stop_signal(
            config,
            transport,
            stop,
            move |payload: P, source: ProcessID, seq: Sequence| {
                let Some(store) = sources.get(&source) else {
                    log::warn!("fifo broadcast dropping message {} from unknown source {}", seq, source);
                    return;
                };

                // Deliveries from one source happen under its lock, so the callback observes them
                // in order even if URB delivers from several threads.
                let mut store = store.lock().expect("fifo store lock poisoned");
                match store.receive(seq, payload) {
                    Ok(ready) => {
                        for (seq, payload) in ready {
                            if log_events {
                                logging::ordered_deliver(
                                    logging::FIFO_DELIVER,
                                    source,
                                    seq,
                                    &payload.to_bytes(),
                                )
                            }
                            on_deliver(payload, source)
                        }
                    }
                    Err(expected) => log::warn!(
                        "fifo broadcast received message {} from {} after delivering up to {}",
                        seq,
                        source,
                        expected
                    ),
                }
            },
        )?;

        Ok(Self { urb })
    }

    /// Broadcast `payload`. Returns the sequence assigned to it.
    pub fn broadcast(&self, payload: P) -> Sequence {
        self.urb.broadcast(payload)
    }

    pub fn me(&self) -> ProcessID {
        self.urb.me()
    }
}

impl<P: Payload> Stoppable for FifoBroadcast<P> {
    fn stop(&self) {
        self.urb.stop()
    }

    fn is_stopped(&self) -> bool {
        self.urb.is_stopped()
    }
}
