//! # Framelink - serial frame scanner and packet broadcast hub
//!
//! Framelink recovers checksum-validated packets from a noisy serial byte
//! stream and fans them out to network consumers:
//!
//! - **Frame scanning**: `0xFF 0xFF LEN payload CK1 CK2` frames are found in
//!   an unframed stream, validated and stripped down to their payload
//! - **Resynchronization**: corrupted or truncated frames are dropped and
//!   reported without stalling the stream
//! - **Packet sink**: every packet is retained in arrival order and can be
//!   persisted on shutdown
//! - **Broadcast hub**: packets are pushed to all connected TCP clients and
//!   to all UDP peers that announced themselves
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   bytes   ┌──────────────┐  Packet  ┌──────────────┐
//! │  ByteSource  │──────────▶│ FrameScanner │─────────▶│  PacketSink  │
//! │ (serial port)│           │ (FrameCodec) │          └──────────────┘
//! └──────────────┘           └──────┬───────┘
//!                                   │ submit
//!                                   ▼
//!                            ┌──────────────┐
//!                            │ BroadcastHub │
//!                            ├──────┬───────┤
//!                            │ TCP  │  UDP  │
//!                            └──────┴───────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use framelink::{BroadcastHub, FrameScanner, HubConfig, PacketSink};
//! use tokio_util::sync::CancellationToken;
//!
//! let stop = CancellationToken::new();
//! let hub = BroadcastHub::start(HubConfig::new().with_tcp_port(5353), stop.clone()).await?;
//! let sink = PacketSink::new();
//!
//! let mut scanner = FrameScanner::new(port, stop.clone());
//! while let Some(packet) = scanner.next_packet()? {
//!     sink.append(packet.clone());
//!     hub.submit(packet)?;
//! }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod hub;
pub mod io;
pub mod scanner;
pub mod sink;

// Re-export commonly used types
pub use crate::config::{HubConfig, ScannerConfig};
pub use crate::core::{Checksum, Packet};
pub use crate::error::{Error, Result};
pub use crate::hub::{BroadcastHub, Publisher};
pub use crate::io::{ByteSource, Fill};
pub use crate::scanner::{FrameCodec, FrameScanner, ScanEvent};
pub use crate::sink::PacketSink;
