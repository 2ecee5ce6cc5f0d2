//! Core data structures for the serial link.
//!
//! This module contains fundamental building blocks:
//! - Frame: wire layout and encoder
//! - Packet: validated payload handed to consumers
//! - Checksum: two-byte XOR integrity suffix

pub mod checksum;
pub mod frame;
mod packet;

pub use checksum::Checksum;
pub use frame::{HEADER, HEADER_BYTE, MAX_FRAME_LEN, MAX_PAYLOAD_LEN, MIN_FRAME_LEN};
pub use packet::Packet;
