/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Echo broadcast over [best-effort broadcast](crate::best_effort), with majority delivery.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use crate::{
    best_effort::BestEffortBroadcast,
    bounded_queue::BoundedQueue,
    config::Configuration,
    logging,
    networking::{LinkError, Transport},
    payload::Payload,
    stop::{StopSignal, Stoppable, Workers},
    types::{ProcessID, Sequence},
};

use super::{messages::UrbPacket, types::UrbReceptionStore};

/// How long the sender worker waits on the submission queue before checking the echo queue again.
const SUBMISSION_WAIT: Duration = Duration::from_millis(1);

type DeliverCallback<P> = dyn Fn(P, ProcessID, Sequence) + Send + Sync;

pub struct UniformReliableBroadcast<P: Payload> {
    me: ProcessID,
    state: Arc<UrbState<P>>,
    beb: Arc<BestEffortBroadcast<UrbPacket<P>>>,
    stop: StopSignal,
    poll_interval: Duration,
    sender: Workers,
}

impl<P: Payload> UniformReliableBroadcast<P> {
    /// Start a URB instance. `on_deliver(payload, emitter, seq)` is invoked exactly once per
    /// message, either on the perfect link's delivery worker or, when this process alone forms a
    /// majority, on the broadcasting thread.
    pub fn new<T, F>(config: &Configuration, transport: T, on_deliver: F) -> Result<Self, LinkError>
    where
        T: Transport,
        F: Fn(P, ProcessID, Sequence) + Send + Sync + 'static,
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
        F: Fn(P, ProcessID, Sequence) + Send + Sync + 'static,
    {
        let state = Arc::new(UrbState {
            store: Mutex::new(UrbReceptionStore::new(config.num_hosts())),
            next_seq: AtomicU64::new(0),
            echoes: BoundedQueue::unbounded(),
            submissions: BoundedQueue::new(config.broadcast_queue_capacity),
            on_deliver: Arc::new(on_deliver) as Arc<DeliverCallback<P>>,
            log_events: config.log_events,
        });

        let beb_state = state.clone();
        let beb = Arc::new(BestEffortBroadcast::with_stop_signal(
            config,
            transport,
            stop.clone(),
            move |packet: UrbPacket<P>, sender| beb_state.on_echo(packet, sender),
        )?);

        let worker_state = state.clone();
        let worker_beb = beb.clone();
        let worker_stop = stop.clone();
        let sender = thread::spawn(move || {
            while !worker_stop.is_set() {
                if let Some(packet) = worker_state.next_to_send() {
                    worker_beb.broadcast(&packet);
                }
            }
        });

        Ok(Self {
            me: config.me,
            state,
            beb,
            stop,
            poll_interval: config.poll_interval,
            sender: Workers::new(vec![sender]),
        })
    }

    /// Broadcast `payload`. Returns the sequence assigned to it.
    pub fn broadcast(&self, payload: P) -> Sequence {
        self.broadcast_with(|_| payload)
    }

    /// Assign the next sequence, build the payload from it, and broadcast the result. Blocks while
    /// the submission queue is full.
    pub fn broadcast_with(&self, build: impl FnOnce(Sequence) -> P) -> Sequence {
        let seq = self.state.next_seq.fetch_add(1, Ordering::SeqCst);
        let packet = UrbPacket {
            emitter: self.me,
            seq,
            payload: build(seq),
        };

        let reception = self
            .state
            .store
            .lock()
            .expect("urb store lock poisoned")
            .add_message(self.me, seq, self.me);

        if reception.first_seen {
            self.state.submissions.enqueue_until_stopped(
                packet.clone(),
                &self.stop,
                self.poll_interval,
            );
        }
        if let Some(acks) = reception.quorum {
            self.state.deliver(packet, acks);
        }

        seq
    }

    pub fn me(&self) -> ProcessID {
        self.me
    }

    pub fn num_hosts(&self) -> usize {
        self.beb.num_hosts()
    }
}

impl<P: Payload> Stoppable for UniformReliableBroadcast<P> {
    fn stop(&self) {
        self.stop.set();
        self.sender.join_all();
        self.beb.stop();
    }

    fn is_stopped(&self) -> bool {
        self.stop.is_set()
    }
}

impl<P: Payload> Drop for UniformReliableBroadcast<P> {
    fn drop(&mut self) {
        self.stop()
    }
}

struct UrbState<P> {
    store: Mutex<UrbReceptionStore>,
    next_seq: AtomicU64,
    /// Forwarded copies of other processes' messages. Unbounded, and drained before submissions.
    echoes: BoundedQueue<UrbPacket<P>>,
    submissions: BoundedQueue<UrbPacket<P>>,
    on_deliver: Arc<DeliverCallback<P>>,
    log_events: bool,
}

impl<P: Payload> UrbState<P> {
    /// The next packet to hand to best-effort broadcast. Echoes go first; a submission is taken
    /// only when no echo is waiting.
    fn next_to_send(&self) -> Option<UrbPacket<P>> {
        self.echoes
            .try_dequeue()
            .or_else(|| self.submissions.dequeue(SUBMISSION_WAIT))
    }

    /// Handle a copy of `packet` that `sender` broadcast.
    fn on_echo(&self, packet: UrbPacket<P>, sender: ProcessID) {
        let reception = self
            .store
            .lock()
            .expect("urb store lock poisoned")
            .add_message(packet.emitter, packet.seq, sender);

        if reception.first_seen {
            if self.log_events {
                logging::echo(packet.emitter, packet.seq)
            }
            self.echoes.enqueue(packet.clone());
        }
        if let Some(acks) = reception.quorum {
            self.deliver(packet, acks);
        }
    }

    fn deliver(&self, packet: UrbPacket<P>, acks: usize) {
        if self.log_events {
            logging::urb_deliver(packet.emitter, packet.seq, acks)
        }
        (self.on_deliver)(packet.payload, packet.emitter, packet.seq)
    }
}
