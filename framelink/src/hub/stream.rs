use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

use futures::future::select_all;
use log::*;
use tokio::io::Ready;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use super::consumer::{ConsumerId, Status, StreamConsumer};
use crate::config::HubConfig;
use crate::core::Packet;
use crate::error::{Error, Result};

/// Connection-oriented broadcast server.
///
/// One task owns the listener, every client socket and every outbound
/// queue. Clients receive every broadcast packet plus an echo of the bytes
/// they send themselves.
pub(crate) struct StreamServer {
    listener: TcpListener,
    inbound: UnboundedReceiver<Packet>,
    consumers: HashMap<ConsumerId, StreamConsumer>,
    next_id: u64,
    config: HubConfig,
}

impl StreamServer {
    pub(crate) async fn bind(
        addr: SocketAddr,
        inbound: UnboundedReceiver<Packet>,
        config: HubConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        Ok(Self {
            listener,
            inbound,
            consumers: HashMap::new(),
            next_id: 0,
            config,
        })
    }

    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub(crate) async fn run(mut self, stop: CancellationToken) {
        info!("TCP server running on {:?}", self.listener.local_addr());
        let mut buf = vec![0u8; self.config.recv_buffer_size];

        loop {
            tokio::select! {
                biased;

                _ = stop.cancelled() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.register(stream, addr),
                    Err(e) => warn!("Accept failed: {}", e),
                },

                packet = self.inbound.recv() => match packet {
                    Some(packet) => self.broadcast(packet),
                    None => {
                        debug!("Inbound queue closed");
                        break;
                    }
                },

                (id, ready) = next_ready(&self.consumers) => {
                    self.on_ready(id, ready, &mut buf);
                }

                // Bounded wait; an idle tick only re-checks the stop signal.
                _ = tokio::time::sleep(self.config.poll_timeout) => {}
            }
        }

        let dropped = self.consumers.len();
        self.consumers.clear();
        info!("Leaving TCP server ({} clients disconnected)", dropped);
    }

    fn register(&mut self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        let id = ConsumerId(self.next_id);
        self.next_id += 1;
        info!("New connection from {} ({})", addr, id);
        self.consumers.insert(id, StreamConsumer::new(stream, addr));
    }

    fn broadcast(&mut self, packet: Packet) {
        let data = packet.into_bytes();
        for consumer in self.consumers.values_mut() {
            consumer.enqueue(data.clone());
        }
        trace!("Queued {} bytes for {} clients", data.len(), self.consumers.len());
    }

    /// Moves everything already waiting on the inbound queue into the
    /// client queues.
    fn drain_inbound(&mut self) {
        while let Ok(packet) = self.inbound.try_recv() {
            self.broadcast(packet);
        }
    }

    fn on_ready(&mut self, id: ConsumerId, ready: io::Result<Ready>, buf: &mut [u8]) {
        let ready = match ready {
            Ok(ready) => ready,
            Err(e) => {
                warn!("Poll on {} failed: {}", id, e);
                self.close(id);
                return;
            }
        };

        if ready.is_write_closed() {
            self.close(id);
            return;
        }

        if ready.is_readable() {
            let status = match self.consumers.get_mut(&id) {
                Some(consumer) => consumer.on_readable(buf),
                None => return,
            };
            if status == Status::Closed {
                self.close(id);
                return;
            }
        }

        if ready.is_writable() {
            self.drain_inbound();
            let status = match self.consumers.get_mut(&id) {
                Some(consumer) => consumer.on_writable(),
                None => return,
            };
            if status == Status::Closed {
                self.close(id);
            }
        }
    }

    fn close(&mut self, id: ConsumerId) {
        if let Some(consumer) = self.consumers.remove(&id) {
            info!(
                "Closed connection {} ({}), {} queued entries discarded",
                consumer.addr(),
                id,
                consumer.pending()
            );
        }
    }
}

/// Waits until any consumer socket is ready for its current interest.
///
/// Never completes when there are no consumers.
async fn next_ready(consumers: &HashMap<ConsumerId, StreamConsumer>) -> (ConsumerId, io::Result<Ready>) {
    if consumers.is_empty() {
        return std::future::pending().await;
    }
    let waits = consumers
        .iter()
        .map(|(&id, consumer)| Box::pin(async move { (id, consumer.ready().await) }));
    let (first, _, _) = select_all(waits).await;
    first
}
