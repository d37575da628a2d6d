use std::{
    collections::{HashMap, HashSet},
    io,
    net::SocketAddr,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex, RwLock,
    },
    time::Duration,
};

use layered_broadcast::{
    networking::Transport,
    types::{Host, ProcessID},
};
use rand::Rng;

/// Decides whether a datagram travelling `from` -> `to` is dropped.
type DropFilter = Box<dyn Fn(ProcessID, ProcessID, &[u8]) -> bool + Send + Sync>;

/// Knobs shared by every stub of one mock network.
pub(crate) struct NetworkControl {
    ids: HashMap<SocketAddr, ProcessID>,
    loss: f64,
    duplication: f64,
    crashed: RwLock<HashSet<ProcessID>>,
    filter: RwLock<Option<DropFilter>>,
}

impl NetworkControl {
    /// Cut `process` off the network in both directions, as if it crashed.
    pub(crate) fn crash(&self, process: ProcessID) {
        self.crashed.write().unwrap().insert(process);
    }

    /// Drop every datagram for which `filter(from, to, datagram)` holds, until cleared.
    pub(crate) fn set_filter(
        &self,
        filter: impl Fn(ProcessID, ProcessID, &[u8]) -> bool + Send + Sync + 'static,
    ) {
        *self.filter.write().unwrap() = Some(Box::new(filter));
    }

    pub(crate) fn clear_filter(&self) {
        *self.filter.write().unwrap() = None;
    }

    fn drops(&self, from: ProcessID, to: ProcessID, datagram: &[u8]) -> bool {
        {
            let crashed = self.crashed.read().unwrap();
            if crashed.contains(&from) || crashed.contains(&to) {
                return true;
            }
        }
        if let Some(filter) = self.filter.read().unwrap().as_ref() {
            if filter(from, to, datagram) {
                return true;
            }
        }
        self.loss > 0.0 && rand::thread_rng().gen_bool(self.loss)
    }
}

/// A mock transport which passes datagrams between threads using channels, losing and duplicating
/// them at random.
pub(crate) struct NetworkStub {
    me: ProcessID,
    address: SocketAddr,
    all_peers: HashMap<SocketAddr, Mutex<Sender<(Vec<u8>, SocketAddr)>>>,
    inbox: Mutex<Receiver<(Vec<u8>, SocketAddr)>>,
    control: Arc<NetworkControl>,
    poll_interval: Duration,
}

impl Transport for NetworkStub {
    fn send_to(&self, datagram: &[u8], destination: SocketAddr) -> io::Result<()> {
        let Some(to) = self.control.ids.get(&destination) else {
            return Ok(());
        };
        if self.control.drops(self.me, *to, datagram) {
            return Ok(());
        }

        let copies = if self.control.duplication > 0.0
            && rand::thread_rng().gen_bool(self.control.duplication)
        {
            2
        } else {
            1
        };
        if let Some(peer) = self.all_peers.get(&destination) {
            let peer = peer.lock().unwrap();
            for _ in 0..copies {
                let _ = peer.send((datagram.to_vec(), self.address));
            }
        }
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.inbox.lock().unwrap().recv_timeout(self.poll_interval) {
            Ok((datagram, origin)) => {
                buf[..datagram.len()].copy_from_slice(&datagram);
                Ok(Some((datagram.len(), origin)))
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

/// Create one connected stub per host. Every datagram is lost with probability `loss` and, if
/// not lost, delivered twice with probability `duplication`.
pub(crate) fn mock_network(
    hosts: &[Host],
    loss: f64,
    duplication: f64,
) -> (Vec<NetworkStub>, Arc<NetworkControl>) {
    let control = Arc::new(NetworkControl {
        ids: hosts.iter().map(|host| (host.address, host.id)).collect(),
        loss,
        duplication,
        crashed: RwLock::new(HashSet::new()),
        filter: RwLock::new(None),
    });

    let mut senders = HashMap::new();
    let inboxes: Vec<(Host, Receiver<(Vec<u8>, SocketAddr)>)> = hosts
        .iter()
        .map(|host| {
            let (sender, receiver) = mpsc::channel();
            senders.insert(host.address, sender);
            (*host, receiver)
        })
        .collect();

    let stubs = inboxes
        .into_iter()
        .map(|(host, inbox)| NetworkStub {
            me: host.id,
            address: host.address,
            all_peers: senders
                .iter()
                .map(|(address, sender)| (*address, Mutex::new(sender.clone())))
                .collect(),
            inbox: Mutex::new(inbox),
            control: control.clone(),
            poll_interval: Duration::from_millis(5),
        })
        .collect();

    (stubs, control)
}
