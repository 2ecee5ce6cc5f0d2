use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default read chunk requested from the byte source.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 256;

/// Default stream server port.
pub const DEFAULT_TCP_PORT: u16 = 5353;

/// Default datagram server port.
pub const DEFAULT_UDP_PORT: u16 = 5050;

/// Default bound on a single hub poll.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default per-read buffer for client bytes and discovery datagrams.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Largest chunk requested from the byte source per read.
    pub read_chunk_size: usize,
}

impl ScannerConfig {
    pub fn new() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Stream server endpoint; `None` leaves it disabled.
    pub stream_addr: Option<SocketAddr>,
    /// Datagram server endpoint; `None` leaves it disabled.
    pub datagram_addr: Option<SocketAddr>,
    /// Upper bound on a single poll before the loop re-checks for stop.
    pub poll_timeout: Duration,
    /// Buffer used for each client read or discovery datagram.
    pub recv_buffer_size: usize,
}

impl HubConfig {
    /// Both servers disabled.
    pub fn new() -> Self {
        Self {
            stream_addr: None,
            datagram_addr: None,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
        }
    }

    /// Enables the stream server on all interfaces at `port`.
    pub fn with_tcp_port(self, port: u16) -> Self {
        self.with_stream_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
    }

    /// Enables the datagram server on all interfaces at `port`.
    pub fn with_udp_port(self, port: u16) -> Self {
        self.with_datagram_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
    }

    pub fn with_stream_addr(mut self, addr: SocketAddr) -> Self {
        self.stream_addr = Some(addr);
        self
    }

    pub fn with_datagram_addr(mut self, addr: SocketAddr) -> Self {
        self.datagram_addr = Some(addr);
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Returns true if at least one server is enabled.
    pub fn is_enabled(&self) -> bool {
        self.stream_addr.is_some() || self.datagram_addr.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_timeout.is_zero() {
            return Err(Error::Config("poll timeout must be non-zero".into()));
        }
        if self.recv_buffer_size == 0 {
            return Err(Error::Config("receive buffer size must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_defaults() {
        let config = HubConfig::default();
        assert!(!config.is_enabled());
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
        assert_eq!(config.recv_buffer_size, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hub_builder() {
        let config = HubConfig::new()
            .with_tcp_port(DEFAULT_TCP_PORT)
            .with_udp_port(DEFAULT_UDP_PORT)
            .with_poll_timeout(Duration::from_millis(50));

        assert!(config.is_enabled());
        assert_eq!(config.stream_addr.unwrap().port(), 5353);
        assert_eq!(config.datagram_addr.unwrap().port(), 5050);
        assert_eq!(config.poll_timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_hub_rejects_zero_timeout() {
        let config = HubConfig::new().with_poll_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_scanner_chunk_size_never_zero() {
        let config = ScannerConfig::new().with_read_chunk_size(0);
        assert_eq!(config.read_chunk_size, 1);
    }
}
