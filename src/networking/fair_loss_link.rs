/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The fair-loss link: best-effort datagrams between named processes.
//!
//! A [`FairLossLink`] translates process IDs to transport addresses through a static map built at
//! construction, and translates the origin address of every incoming datagram back to a process
//! ID. Datagrams from addresses outside the host list (including other address families) are
//! discarded silently. The link gives no delivery, ordering or duplication guarantees beyond those
//! of the underlying [`Transport`].
//!
//! Sending is synchronous and never waits for the peer. Receiving happens on a single receive
//! loop thread which polls the transport with a bounded wait so that it observes a stop request
//! promptly.

use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    io,
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
    time::Duration,
};

use crate::{
    config::Configuration,
    logging,
    stop::{StopSignal, Stoppable, Workers},
    types::ProcessID,
};

use super::transport::{Transport, UdpTransport};

/// Largest datagram the receive loop accepts. This is the largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Back-off after a transport error, so that a persistent error does not spin the receive loop.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(1);

/// Enumerates the ways constructing a link can fail. All of them are fatal for the link.
#[derive(Debug)]
pub enum LinkError {
    /// The socket could not be bound to this process's address.
    Bind(io::Error),

    /// This process's ID does not appear in the host list.
    UnknownProcess(ProcessID),

    /// Configuring the socket failed.
    Io(io::Error),
}

impl Display for LinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Bind(e) => write!(f, "failed to bind socket: {}", e),
            LinkError::UnknownProcess(id) => write!(f, "process {} is not in the host list", id),
            LinkError::Io(e) => write!(f, "socket error: {}", e),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkError::Bind(e) | LinkError::Io(e) => Some(e),
            LinkError::UnknownProcess(_) => None,
        }
    }
}

impl From<io::Error> for LinkError {
    fn from(value: io::Error) -> Self {
        LinkError::Io(value)
    }
}

/// The sending half of a fair-loss link, together with the process ID <-> address maps.
///
/// The maps are read-only after construction and are looked up without locking. The transport is
/// released when the owning [`FairLossLink`] stops; sends after that are dropped.
pub struct FairLossEndpoint {
    me: ProcessID,
    id_to_address: HashMap<ProcessID, SocketAddr>,
    address_to_id: HashMap<SocketAddr, ProcessID>,
    transport: RwLock<Option<Box<dyn Transport>>>,
}

impl FairLossEndpoint {
    pub fn new<T: Transport>(config: &Configuration, transport: T) -> Result<Self, LinkError> {
        let id_to_address: HashMap<ProcessID, SocketAddr> = config
            .hosts
            .iter()
            .map(|host| (host.id, host.address))
            .collect();
        if !id_to_address.contains_key(&config.me) {
            return Err(LinkError::UnknownProcess(config.me));
        }
        let address_to_id = config
            .hosts
            .iter()
            .map(|host| (host.address, host.id))
            .collect();

        Ok(Self {
            me: config.me,
            id_to_address,
            address_to_id,
            transport: RwLock::new(Some(Box::new(transport))),
        })
    }

    pub fn me(&self) -> ProcessID {
        self.me
    }

    /// Send `datagram` to `destination`, best effort. Transport errors are logged and otherwise
    /// treated like any other loss.
    pub fn send(&self, datagram: &[u8], destination: ProcessID) {
        let Some(address) = self.id_to_address.get(&destination) else {
            log::warn!("dropping datagram for unknown process {}", destination);
            return;
        };

        let transport = self.transport.read().expect("transport lock poisoned");
        if let Some(transport) = transport.as_ref() {
            if let Err(e) = transport.send_to(datagram, *address) {
                log::debug!("send to process {} failed: {}", destination, e);
            }
        }
    }

    /// The process bound to `address`, if any.
    pub fn resolve(&self, address: &SocketAddr) -> Option<ProcessID> {
        self.address_to_id.get(address).copied()
    }

    fn receive(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let transport = self.transport.read().expect("transport lock poisoned");
        match transport.as_ref() {
            Some(transport) => transport.recv_from(buf),
            None => Ok(None),
        }
    }

    fn close(&self) {
        self.transport
            .write()
            .expect("transport lock poisoned")
            .take();
    }
}

/// A fair-loss link: an endpoint plus the receive loop feeding `on_receive`.
pub struct FairLossLink {
    endpoint: Arc<FairLossEndpoint>,
    stop: StopSignal,
    receiver: Workers,
}

impl FairLossLink {
    /// Start a link over `transport`. `on_receive` is invoked on the receive loop thread once per
    /// datagram that arrives from a known process.
    pub fn new<T, F>(config: &Configuration, transport: T, on_receive: F) -> Result<Self, LinkError>
    where
        T: Transport,
        F: Fn(&[u8], ProcessID) + Send + 'static,
    {
        let endpoint = Arc::new(FairLossEndpoint::new(config, transport)?);
        Ok(Self::start(endpoint, config, StopSignal::new(), on_receive))
    }

    /// Start a link over a UDP socket bound to this process's address in the host list.
    pub fn bind<F>(config: &Configuration, on_receive: F) -> Result<Self, LinkError>
    where
        F: Fn(&[u8], ProcessID) + Send + 'static,
    {
        let address = config
            .address_of(config.me)
            .ok_or(LinkError::UnknownProcess(config.me))?;
        let transport = UdpTransport::bind(address, config.poll_interval)?;
        Self::new(config, transport, on_receive)
    }

    /// Spawn the receive loop over an existing endpoint, observing `stop`.
    pub(crate) fn start<F>(
        endpoint: Arc<FairLossEndpoint>,
        config: &Configuration,
        stop: StopSignal,
        on_receive: F,
    ) -> Self
    where
        F: Fn(&[u8], ProcessID) + Send + 'static,
    {
        let log_events = config.log_events;
        let loop_endpoint = endpoint.clone();
        let loop_stop = stop.clone();

        let receiver = thread::spawn(move || {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            while !loop_stop.is_set() {
                match loop_endpoint.receive(&mut buf) {
                    Ok(Some((len, origin))) => {
                        if loop_stop.is_set() {
                            break;
                        }
                        match loop_endpoint.resolve(&origin) {
                            Some(sender) if len > 0 => on_receive(&buf[..len], sender),
                            _ => {
                                if log_events {
                                    logging::discard_datagram(origin, len)
                                }
                            }
                        }
                    }
                    Ok(None) => (),
                    Err(e) => {
                        log::debug!("fair-loss link receive failed: {}", e);
                        thread::sleep(RECEIVE_ERROR_BACKOFF);
                    }
                }
            }
        });

        Self {
            endpoint,
            stop,
            receiver: Workers::new(vec![receiver]),
        }
    }

    pub fn send(&self, datagram: &[u8], destination: ProcessID) {
        if !self.stop.is_set() {
            self.endpoint.send(datagram, destination)
        }
    }

    pub fn endpoint(&self) -> &Arc<FairLossEndpoint> {
        &self.endpoint
    }
}

impl Stoppable for FairLossLink {
    fn stop(&self) {
        self.stop.set();
        self.receiver.join_all();
        self.endpoint.close();
    }

    fn is_stopped(&self) -> bool {
        self.stop.is_set()
    }
}

impl Drop for FairLossLink {
    fn drop(&mut self) {
        self.stop()
    }
}
