//! Broadcast hub.
//!
//! Fans recovered packets out to network consumers through two
//! independent servers:
//!
//! - **Stream (TCP)**: every connected client receives every packet;
//!   bytes a client sends are echoed back to that client only.
//! - **Datagram (UDP)**: any address that sends a datagram becomes a peer
//!   and receives every later packet.
//!
//! Each server runs as its own task and owns its sockets and queues, so
//! nothing inside a server is locked. Packets cross into a server through
//! an unbounded channel that [`BroadcastHub::submit`] may feed from any
//! thread, including the blocking ingestion thread.

mod consumer;
mod datagram;
mod stream;

use std::net::SocketAddr;

use log::*;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::core::Packet;
use crate::error::{Error, Result};
use datagram::DatagramServer;
use stream::StreamServer;

/// One running server task.
struct ServerHandle {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

/// Cloneable submission side of the hub.
///
/// Holds one inbound sender per running server and may be moved to any
/// thread, including the blocking ingestion thread.
#[derive(Debug, Clone, Default)]
pub struct Publisher {
    inbound: Vec<UnboundedSender<Packet>>,
}

impl Publisher {
    /// Queues `packet` for every running server.
    ///
    /// Empty packets are not broadcast. Returns [`Error::HubStopped`] once
    /// no enabled server is accepting packets any more.
    pub fn submit(&self, packet: Packet) -> Result<()> {
        if packet.is_empty() || self.inbound.is_empty() {
            return Ok(());
        }

        let mut accepted = 0;
        for inbound in &self.inbound {
            if inbound.send(packet.clone()).is_ok() {
                accepted += 1;
            }
        }

        if accepted == 0 {
            return Err(Error::HubStopped);
        }
        Ok(())
    }
}

/// Handle to the running hub servers.
pub struct BroadcastHub {
    publisher: Publisher,
    stream: Option<ServerHandle>,
    datagram: Option<ServerHandle>,
    stop: CancellationToken,
}

impl BroadcastHub {
    /// Binds every enabled server and spawns its loop.
    ///
    /// Both endpoints are bound before either loop starts, so a bind
    /// failure leaves nothing running. Cancelling `stop` ends both loops.
    pub async fn start(config: HubConfig, stop: CancellationToken) -> Result<Self> {
        config.validate()?;

        let stream = match config.stream_addr {
            Some(addr) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let server = StreamServer::bind(addr, rx, config.clone()).await?;
                Some((server.local_addr()?, tx, server))
            }
            None => None,
        };

        let datagram = match config.datagram_addr {
            Some(addr) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let server = DatagramServer::bind(addr, rx, config.clone()).await?;
                Some((server.local_addr()?, tx, server))
            }
            None => None,
        };

        let mut publisher = Publisher::default();
        let stream = stream.map(|(addr, inbound, server)| {
            publisher.inbound.push(inbound);
            ServerHandle {
                addr,
                task: tokio::spawn(server.run(stop.clone())),
            }
        });
        let datagram = datagram.map(|(addr, inbound, server)| {
            publisher.inbound.push(inbound);
            ServerHandle {
                addr,
                task: tokio::spawn(server.run(stop.clone())),
            }
        });

        if stream.is_none() && datagram.is_none() {
            debug!("Broadcast hub started with no servers");
        }

        Ok(Self {
            publisher,
            stream,
            datagram,
            stop,
        })
    }

    /// Queues `packet` for every running server. See [`Publisher::submit`].
    pub fn submit(&self, packet: Packet) -> Result<()> {
        self.publisher.submit(packet)
    }

    /// Returns a submission handle that outlives borrows of the hub.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Local address of the stream server, if enabled.
    pub fn stream_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().map(|s| s.addr)
    }

    /// Local address of the datagram server, if enabled.
    pub fn datagram_addr(&self) -> Option<SocketAddr> {
        self.datagram.as_ref().map(|s| s.addr)
    }

    /// Signals both servers to stop and waits for them to exit.
    pub async fn stop(self) {
        self.stop.cancel();
        for server in [self.stream, self.datagram].into_iter().flatten() {
            if let Err(e) = server.task.await {
                error!("Hub server task failed: {}", e);
            }
        }
        info!("Broadcast hub stopped");
    }
}
