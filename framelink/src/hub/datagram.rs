use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;

use log::*;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::core::Packet;
use crate::error::{Error, Result};

/// Connectionless broadcast server.
///
/// Peers announce themselves by sending any datagram; contents are
/// ignored. Every packet is sent to every known peer.
pub(crate) struct DatagramServer {
    socket: UdpSocket,
    inbound: UnboundedReceiver<Packet>,
    peers: Vec<SocketAddr>,
    outbound: VecDeque<Packet>,
    config: HubConfig,
}

impl DatagramServer {
    pub(crate) async fn bind(
        addr: SocketAddr,
        inbound: UnboundedReceiver<Packet>,
        config: HubConfig,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        Ok(Self {
            socket,
            inbound,
            peers: Vec::new(),
            outbound: VecDeque::new(),
            config,
        })
    }

    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub(crate) async fn run(mut self, stop: CancellationToken) {
        info!("UDP server running on {:?}", self.socket.local_addr());
        let mut buf = vec![0u8; self.config.recv_buffer_size];

        loop {
            tokio::select! {
                biased;

                _ = stop.cancelled() => break,

                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((_, addr)) => self.register(addr),
                    // ICMP errors from earlier sends surface here on some platforms.
                    Err(e) => debug!("UDP receive failed: {}", e),
                },

                packet = self.inbound.recv() => match packet {
                    Some(packet) => self.outbound.push_back(packet),
                    None => {
                        debug!("Inbound queue closed");
                        break;
                    }
                },

                writable = self.socket.writable(), if !self.outbound.is_empty() => match writable {
                    Ok(()) => self.flush(),
                    Err(e) => warn!("UDP socket not writable: {}", e),
                },

                _ = tokio::time::sleep(self.config.poll_timeout) => {}
            }
        }

        info!("Leaving UDP server ({} peers forgotten)", self.peers.len());
        self.peers.clear();
    }

    fn register(&mut self, addr: SocketAddr) {
        if !self.peers.contains(&addr) {
            info!("New client from {}", addr);
            self.peers.push(addr);
        }
    }

    /// Sends every queued packet to every peer.
    fn flush(&mut self) {
        while let Some(packet) = self.outbound.pop_front() {
            let socket = &self.socket;
            send_to_peers(&mut self.peers, &packet, |data, peer| socket.try_send_to(data, peer));
        }
    }
}

/// Sends `packet` to each peer. A peer whose send fails is forgotten until
/// it sends again; a full send buffer only drops this packet for that peer.
fn send_to_peers<F>(peers: &mut Vec<SocketAddr>, packet: &Packet, mut send: F)
where
    F: FnMut(&[u8], SocketAddr) -> io::Result<usize>,
{
    peers.retain(|&peer| match send(packet.as_bytes(), peer) {
        Ok(_) => {
            trace!("Sent {} bytes to {}", packet.len(), peer);
            true
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => {
            debug!("Send buffer full, dropped packet for {}", peer);
            true
        }
        Err(e) => {
            warn!("Send to {} failed, forgetting peer: {}", peer, e);
            false
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_failed_peer_is_forgotten() {
        let mut peers = vec![peer(1), peer(2), peer(3)];
        let mut sent = Vec::new();

        send_to_peers(&mut peers, &Packet::from(&b"abc"[..]), |data, to| {
            if to == peer(2) {
                return Err(io::Error::from(ErrorKind::ConnectionRefused));
            }
            sent.push((to, data.to_vec()));
            Ok(data.len())
        });

        assert_eq!(peers, [peer(1), peer(3)]);
        assert_eq!(sent, [(peer(1), b"abc".to_vec()), (peer(3), b"abc".to_vec())]);
    }

    #[test]
    fn test_full_buffer_keeps_peer() {
        let mut peers = vec![peer(1)];
        send_to_peers(&mut peers, &Packet::from(&b"x"[..]), |_, _| {
            Err(io::Error::from(ErrorKind::WouldBlock))
        });
        assert_eq!(peers, [peer(1)]);
    }
}
