use std::collections::VecDeque;
use std::fmt;
use std::io::ErrorKind;
use std::net::SocketAddr;

use bytes::Bytes;
use log::*;
use tokio::io::{Interest, Ready};
use tokio::net::TcpStream;

/// Identifies a stream consumer for the lifetime of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ConsumerId(pub(crate) u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a consumer survived an I/O step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Open,
    Closed,
}

/// A connected stream client and its pending outbound data.
///
/// The outbound queue is unbounded. A client that stops reading keeps
/// accumulating broadcasts until it disconnects.
pub(crate) struct StreamConsumer {
    stream: TcpStream,
    addr: SocketAddr,
    outbound: VecDeque<Bytes>,
}

impl StreamConsumer {
    pub(crate) fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        Self {
            stream,
            addr,
            outbound: VecDeque::new(),
        }
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) fn pending(&self) -> usize {
        self.outbound.len()
    }

    /// Readable always; writable only while something is queued.
    pub(crate) fn interest(&self) -> Interest {
        if self.outbound.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        }
    }

    pub(crate) async fn ready(&self) -> std::io::Result<Ready> {
        self.stream.ready(self.interest()).await
    }

    pub(crate) fn enqueue(&mut self, data: Bytes) {
        if !data.is_empty() {
            self.outbound.push_back(data);
        }
    }

    /// Reads whatever the client sent and queues it back to the same client.
    pub(crate) fn on_readable(&mut self, buf: &mut [u8]) -> Status {
        match self.stream.try_read(buf) {
            Ok(0) => {
                info!("Closing {} after reading no data", self.addr);
                Status::Closed
            }
            Ok(n) => {
                debug!("Received {} bytes from {}", n, self.addr);
                self.outbound.push_back(Bytes::copy_from_slice(&buf[..n]));
                Status::Open
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Status::Open,
            Err(e) => {
                warn!("Read from {} failed: {}", self.addr, e);
                Status::Closed
            }
        }
    }

    /// Sends the head of the outbound queue.
    ///
    /// A partial write leaves the unsent tail at the front of the queue.
    pub(crate) fn on_writable(&mut self) -> Status {
        let Some(next) = self.outbound.pop_front() else {
            return Status::Open;
        };
        match self.stream.try_write(&next) {
            Ok(n) if n < next.len() => {
                trace!("Partial send to {}: {}/{} bytes", self.addr, n, next.len());
                self.outbound.push_front(next.slice(n..));
                Status::Open
            }
            Ok(n) => {
                trace!("Sent {} bytes to {}", n, self.addr);
                Status::Open
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                self.outbound.push_front(next);
                Status::Open
            }
            Err(e) => {
                warn!("Send to {} failed: {}", self.addr, e);
                Status::Closed
            }
        }
    }
}
