/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::sync::{Arc, Mutex, OnceLock};

use crate::{
    config::Configuration,
    logging,
    networking::{LinkError, Transport},
    payload::Payload,
    stop::{StopSignal, Stoppable},
    types::{ProcessID, Sequence},
    urb::UniformReliableBroadcast,
};

use super::{
    messages::CausalPacket,
    types::{CausalReception, CausalReceptionStore, ConfigureError},
};

pub struct LocalizedCausalBroadcast<P: Payload> {
    me: ProcessID,
    dependencies: OnceLock<Vec<ProcessID>>,
    store: Arc<Mutex<CausalReceptionStore<P>>>,
    urb: UniformReliableBroadcast<CausalPacket<P>>,
}

impl<P: Payload> LocalizedCausalBroadcast<P> {
    /// Start a localized causal broadcast instance. The dependency set is taken from
    /// `config.dependencies` if present; otherwise it may be set once with
    /// [`configure`](Self::configure) before the first broadcast.
    ///
    /// `on_deliver(payload, source)` is invoked under the reception store's lock, so it must not
    /// call [`broadcast`](Self::broadcast).
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
        let store = Arc::new(Mutex::new(CausalReceptionStore::new()));
        let log_events = config.log_events;

        let urb_store = store.clone();
        let urb = UniformReliableBroadcast::with_stop_signal(
            config,
            transport,
            stop,
            move |packet: CausalPacket<P>, source: ProcessID, seq: Sequence| {
                let mut store = urb_store.lock().expect("causal store lock poisoned");
                match store.receive(source, seq, packet) {
                    CausalReception::Delivered(delivered) => {
                        for ((source, seq), payload) in delivered {
                            if log_events {
                                logging::ordered_deliver(
                                    logging::CAUSAL_DELIVER,
                                    source,
                                    seq,
                                    &payload.to_bytes(),
                                )
                            }
                            on_deliver(payload, source)
                        }
                    }
                    CausalReception::Buffered { missing } => {
                        if log_events {
                            logging::buffer_message(source, seq, missing)
                        }
                    }
                    CausalReception::AlreadyDelivered { expected } => log::warn!(
                        "causal broadcast received message {} from {} after delivering up to {}",
                        seq,
                        source,
                        expected
                    ),
                }
            },
        )?;

        let dependencies = OnceLock::new();
        if let Some(configured) = &config.dependencies {
            let _ = dependencies.set(configured.clone());
        }

        Ok(Self {
            me: config.me,
            dependencies,
            store,
            urb,
        })
    }

    /// Fix the set of processes whose deliveries this process's messages depend on.
    ///
    /// # Errors
    ///
    /// Fails if the set was already fixed by the configuration or an earlier call.
    pub fn configure(&self, dependencies: Vec<ProcessID>) -> Result<(), ConfigureError> {
        self.dependencies
            .set(dependencies)
            .map_err(|_| ConfigureError::AlreadyConfigured)
    }

    /// Broadcast `payload`, declaring as dependencies the messages delivered so far from every
    /// configured dependency, and every earlier message of this process. Returns the sequence
    /// assigned to it.
    pub fn broadcast(&self, payload: P) -> Sequence {
        let dependencies = self.dependencies.get().map(Vec::as_slice).unwrap_or(&[]);
        self.urb.broadcast_with(|seq| {
            let mut clock = self
                .store
                .lock()
                .expect("causal store lock poisoned")
                .vector_clock(dependencies);
            clock.insert(self.me, seq);
            CausalPacket {
                payload,
                dependencies: clock,
            }
        })
    }

    /// The number of messages delivered so far from `source`.
    pub fn delivered_from(&self, source: ProcessID) -> Sequence {
        self.store
            .lock()
            .expect("causal store lock poisoned")
            .expected(source)
    }

    pub fn me(&self) -> ProcessID {
        self.me
    }
}

impl<P: Payload> Stoppable for LocalizedCausalBroadcast<P> {
    fn stop(&self) {
        self.urb.stop()
    }

    fn is_stopped(&self) -> bool {
        self.urb.is_stopped()
    }
}
