/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable datagram transport.
//!
//! The fair-loss link only needs to send a datagram to an address and to wait a bounded time for
//! an incoming datagram. [`UdpTransport`] provides this over a UDP socket; tests plug in an
//! in-memory network that loses, duplicates and delays datagrams.

use std::{
    io,
    net::{SocketAddr, UdpSocket},
    time::Duration,
};

use super::fair_loss_link::LinkError;

pub trait Transport: Send + Sync + 'static {
    /// Send one datagram to `destination` without waiting for it to be received.
    fn send_to(&self, datagram: &[u8], destination: SocketAddr) -> io::Result<()>;

    /// Receive one datagram into `buf`, waiting at most one poll interval. Returns `Ok(None)` if no
    /// datagram arrived in that time.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;
}

/// A [`Transport`] over a bound UDP socket.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind a UDP socket to `address`. `poll_interval` becomes the socket's read timeout, so a
    /// receive loop observes a stop request at least that often.
    pub fn bind(address: SocketAddr, poll_interval: Duration) -> Result<Self, LinkError> {
        let socket = UdpSocket::bind(address).map_err(LinkError::Bind)?;
        // A zero read timeout is rejected by the socket API.
        socket.set_read_timeout(Some(poll_interval.max(Duration::from_millis(1))))?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, datagram: &[u8], destination: SocketAddr) -> io::Result<()> {
        self.socket.send_to(datagram, destination).map(|_| ())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((len, origin)) => Ok(Some((len, origin))),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
