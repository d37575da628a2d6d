/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The perfect link: reliable, non-duplicating, non-spurious delivery between two processes.
//!
//! ## Sending
//!
//! [`PerfectLink::send`] tags the payload with the next sequence for its destination and places it
//! on that destination's send queue. A pool of sender workers owns the destinations
//! (each destination is owned by exactly one worker). In every cycle a worker, for each of its
//! destinations:
//! 1. Forgets the packets acknowledged since the last cycle,
//! 2. Retransmits every packet still unacknowledged, and
//! 3. Pulls newly queued packets and transmits them, as long as the destination's
//!    [window](super::window) has room.
//!
//! A cycle that finishes within the retransmit interval grows the windows that were full, and the
//! worker sleeps for the remaining time. A cycle that overruns shrinks every window. Retransmission
//! is unbounded in time: a packet is resent until it is acknowledged or the link stops.
//!
//! Send queues are unbounded and `send` never blocks, so a destination that stops acknowledging
//! (a crashed process) cannot hold up traffic to the others. Only the window's worth of packets is
//! ever retransmitted to it; the rest wait in its queue, and a warning is logged once the backlog
//! passes [`send_backlog_warning`](Configuration::send_backlog_warning).
//!
//! ## Receiving
//!
//! Every data packet is acknowledged immediately on the receive loop thread, then checked against
//! the sender's [`SequenceNumberStore`]. A first occurrence is placed on the bounded delivery queue,
//! a duplicate is dropped. A dedicated delivery worker drains the queue and invokes the delivery
//! callback, so a slow callback never delays acknowledgments. Acknowledgments update the
//! destination's acknowledged set and are never delivered.

use std::{
    collections::{BTreeMap, HashMap},
    marker::PhantomData,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    bounded_queue::BoundedQueue,
    config::Configuration,
    logging,
    payload::Payload,
    sequence_number_store::SequenceNumberStore,
    stop::{StopSignal, Stoppable, Workers},
    types::{ProcessID, Sequence},
};

use super::{
    fair_loss_link::{FairLossEndpoint, FairLossLink, LinkError, MAX_DATAGRAM_SIZE},
    messages::{LinkPacket, HEADER_SIZE},
    transport::Transport,
    window::SendWindow,
};

/// Largest encoded payload that still fits in one datagram.
pub const MAX_PAYLOAD_SIZE: usize = MAX_DATAGRAM_SIZE - HEADER_SIZE;

pub struct PerfectLink<P: Payload> {
    link: FairLossLink,
    outboxes: Arc<HashMap<ProcessID, Arc<Outbox>>>,
    stop: StopSignal,
    workers: Workers,
    _payload: PhantomData<fn(P)>,
}

impl<P: Payload> PerfectLink<P> {
    /// Start a perfect link over `transport`. `on_deliver` is invoked on the delivery worker, once
    /// per payload sent to this process by each sender.
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
        let endpoint = Arc::new(FairLossEndpoint::new(config, transport)?);

        let outboxes: Arc<HashMap<ProcessID, Arc<Outbox>>> = Arc::new(
            config
                .host_ids()
                .map(|id| (id, Arc::new(Outbox::new(config.send_backlog_warning))))
                .collect(),
        );
        let delivery: Arc<BoundedQueue<(P, ProcessID)>> =
            Arc::new(BoundedQueue::new(config.delivery_queue_capacity));

        let inbound = Inbound {
            endpoint: endpoint.clone(),
            outboxes: outboxes.clone(),
            delivered: config
                .host_ids()
                .map(|id| (id, Mutex::new(SequenceNumberStore::new())))
                .collect(),
            delivery: delivery.clone(),
            stop: stop.clone(),
            poll_interval: config.poll_interval,
            log_events: config.log_events,
        };
        let link = FairLossLink::start(endpoint.clone(), config, stop.clone(), move |datagram, origin| {
            inbound.on_datagram(datagram, origin)
        });

        let mut handles = Vec::new();
        for sender in SenderWorker::partition(config, &endpoint, &outboxes, &stop) {
            handles.push(thread::spawn(move || sender.run()));
        }
        let delivery_stop = stop.clone();
        let poll_interval = config.poll_interval;
        handles.push(thread::spawn(move || {
            while !delivery_stop.is_set() {
                if let Some((payload, origin)) = delivery.dequeue(poll_interval) {
                    if delivery_stop.is_set() {
                        break;
                    }
                    on_deliver(payload, origin)
                }
            }
        }));

        Ok(Self {
            link,
            outboxes,
            stop,
            workers: Workers::new(handles),
            _payload: PhantomData,
        })
    }

    /// Queue `payload` for reliable delivery to `destination`. Never blocks.
    ///
    /// Payloads that encode to nothing or to more than [`MAX_PAYLOAD_SIZE`] bytes are refused with
    /// a warning: the first would read as an acknowledgment, the second could never be sent.
    pub fn send(&self, payload: &P, destination: ProcessID) {
        if self.stop.is_set() {
            return;
        }
        let Some(outbox) = self.outboxes.get(&destination) else {
            log::warn!("perfect link has no process {}", destination);
            return;
        };

        let body = payload.to_bytes();
        if body.is_empty() {
            log::warn!("refusing to send an empty payload, it would read as an acknowledgment");
            return;
        }
        if body.len() > MAX_PAYLOAD_SIZE {
            log::warn!(
                "refusing to send a {} byte payload to {}, the limit is {}",
                body.len(),
                destination,
                MAX_PAYLOAD_SIZE
            );
            return;
        }
        let seq = outbox.next_seq.fetch_add(1, Ordering::SeqCst);
        outbox.push(seq, LinkPacket::encode_data(seq, &body), destination);
    }

    pub fn me(&self) -> ProcessID {
        self.link.endpoint().me()
    }
}

impl<P: Payload> Stoppable for PerfectLink<P> {
    fn stop(&self) {
        self.stop.set();
        self.workers.join_all();
        self.link.stop();
    }

    fn is_stopped(&self) -> bool {
        self.stop.is_set()
    }
}

impl<P: Payload> Drop for PerfectLink<P> {
    fn drop(&mut self) {
        self.stop()
    }
}

/// Per-destination sending state shared between `send` callers, the owning sender worker, and
/// the receive loop (which records acknowledgments).
struct Outbox {
    next_seq: AtomicU64,
    queue: BoundedQueue<(Sequence, Vec<u8>)>,
    /// Packets in `queue`.
    backlog: AtomicUsize,
    backlog_warning: usize,
    acked: Mutex<SequenceNumberStore>,
}

impl Outbox {
    fn new(backlog_warning: usize) -> Self {
        Self {
            next_seq: AtomicU64::new(0),
            queue: BoundedQueue::unbounded(),
            backlog: AtomicUsize::new(0),
            backlog_warning: backlog_warning.max(1),
            acked: Mutex::new(SequenceNumberStore::new()),
        }
    }

    fn push(&self, seq: Sequence, datagram: Vec<u8>, destination: ProcessID) {
        self.queue.enqueue((seq, datagram));
        let backlog = self.backlog.fetch_add(1, Ordering::SeqCst) + 1;
        if backlog == self.backlog_warning {
            log::warn!(
                "{} packets are waiting for process {}, it may have crashed",
                backlog,
                destination
            );
        }
    }

    fn pop(&self) -> Option<(Sequence, Vec<u8>)> {
        let packet = self.queue.try_dequeue()?;
        self.backlog.fetch_sub(1, Ordering::SeqCst);
        Some(packet)
    }
}

/// Receive-side state, owned by the fair-loss link's receive loop.
struct Inbound<P> {
    endpoint: Arc<FairLossEndpoint>,
    outboxes: Arc<HashMap<ProcessID, Arc<Outbox>>>,
    delivered: HashMap<ProcessID, Mutex<SequenceNumberStore>>,
    delivery: Arc<BoundedQueue<(P, ProcessID)>>,
    stop: StopSignal,
    poll_interval: Duration,
    log_events: bool,
}

impl<P: Payload> Inbound<P> {
    fn on_datagram(&self, datagram: &[u8], origin: ProcessID) {
        match LinkPacket::from_bytes(datagram) {
            Ok(LinkPacket::Ack { seq }) => {
                if let Some(outbox) = self.outboxes.get(&origin) {
                    outbox.acked.lock().expect("acked store lock poisoned").add(seq);
                    if self.log_events {
                        logging::receive_ack(origin, seq)
                    }
                }
            }
            Ok(LinkPacket::Data { seq, payload }) => {
                self.endpoint.send(&LinkPacket::encode_ack(seq), origin);

                let payload = match P::from_bytes(&payload) {
                    Ok(payload) => payload,
                    Err(e) => {
                        log::warn!("dropping undecodable packet {} from {}: {}", seq, origin, e);
                        return;
                    }
                };
                let Some(delivered) = self.delivered.get(&origin) else {
                    return;
                };
                let duplicate = delivered
                    .lock()
                    .expect("delivered store lock poisoned")
                    .add(seq);
                if !duplicate {
                    self.delivery
                        .enqueue_until_stopped((payload, origin), &self.stop, self.poll_interval);
                }
            }
            Err(e) => log::warn!("dropping malformed datagram from {}: {}", origin, e),
        }
    }
}

/// One destination as seen by the sender worker that owns it.
struct Destination {
    id: ProcessID,
    outbox: Arc<Outbox>,
    in_flight: BTreeMap<Sequence, Vec<u8>>,
    window: SendWindow,
    window_was_full: bool,
}

impl Destination {
    fn cycle(&mut self, endpoint: &FairLossEndpoint, log_events: bool) {
        {
            let acked = self.outbox.acked.lock().expect("acked store lock poisoned");
            self.in_flight.retain(|seq, _| !acked.contains(*seq));
        }

        for (seq, datagram) in &self.in_flight {
            endpoint.send(datagram, self.id);
            if log_events {
                logging::transmit(self.id, *seq, false)
            }
        }

        while self.window.has_room(self.in_flight.len()) {
            match self.outbox.pop() {
                Some((seq, datagram)) => {
                    endpoint.send(&datagram, self.id);
                    if log_events {
                        logging::transmit(self.id, seq, true)
                    }
                    self.in_flight.insert(seq, datagram);
                }
                None => break,
            }
        }

        self.window_was_full = !self.window.has_room(self.in_flight.len());
    }

    fn adapt(&mut self, cycle_had_slack: bool, log_events: bool) {
        // A window that was not full did not limit this cycle, so it has no reason to grow.
        if cycle_had_slack && !self.window_was_full {
            return;
        }
        if let Some(old) = self.window.adapt(cycle_had_slack) {
            if log_events {
                logging::resize_window(self.id, old, self.window.size())
            }
        }
    }
}

struct SenderWorker {
    endpoint: Arc<FairLossEndpoint>,
    destinations: Vec<Destination>,
    stop: StopSignal,
    retransmit_interval: Duration,
    poll_interval: Duration,
    log_events: bool,
}

impl SenderWorker {
    /// Split the destinations round-robin, in host-list order, among at most
    /// `config.sender_workers` workers.
    fn partition(
        config: &Configuration,
        endpoint: &Arc<FairLossEndpoint>,
        outboxes: &HashMap<ProcessID, Arc<Outbox>>,
        stop: &StopSignal,
    ) -> Vec<SenderWorker> {
        let num_workers = config.sender_workers().min(config.num_hosts().max(1));
        let (min, initial, max) = config.window_bounds();

        let mut workers: Vec<SenderWorker> = (0..num_workers)
            .map(|_| SenderWorker {
                endpoint: endpoint.clone(),
                destinations: Vec::new(),
                stop: stop.clone(),
                retransmit_interval: config.retransmit_interval,
                poll_interval: config.poll_interval,
                log_events: config.log_events,
            })
            .collect();

        for (index, id) in config.host_ids().enumerate() {
            if let Some(outbox) = outboxes.get(&id) {
                workers[index % num_workers].destinations.push(Destination {
                    id,
                    outbox: outbox.clone(),
                    in_flight: BTreeMap::new(),
                    window: SendWindow::new(min, initial, max),
                    window_was_full: false,
                });
            }
        }

        workers
    }

    fn run(mut self) {
        while !self.stop.is_set() {
            let cycle_start = Instant::now();
            for destination in &mut self.destinations {
                if self.stop.is_set() {
                    return;
                }
                destination.cycle(&self.endpoint, self.log_events);
            }

            let elapsed = cycle_start.elapsed();
            let cycle_had_slack = elapsed < self.retransmit_interval;
            for destination in &mut self.destinations {
                destination.adapt(cycle_had_slack, self.log_events);
            }

            if cycle_had_slack {
                self.idle(self.retransmit_interval - elapsed);
            }
        }
    }

    /// Sleep for `duration`, waking at least once per poll interval to check for a stop request.
    fn idle(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            let now = Instant::now();
            if now >= deadline || self.stop.is_set() {
                return;
            }
            thread::sleep((deadline - now).min(self.poll_interval));
        }
    }
}
