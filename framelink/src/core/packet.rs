//! Packet definition.
//!
//! A packet is the validated payload of one frame, stripped of the
//! header, the length byte and the checksum pair. Packets are immutable;
//! cloning one shares the underlying buffer instead of copying it, so
//! every queue that holds a packet holds its own handle.

use bytes::Bytes;
use std::ops::Deref;

/// Validated payload recovered from a frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Packet(Bytes);

impl Packet {
    /// Creates a packet from an owned buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Creates a packet by copying `data`.
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(data))
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for a zero-length payload.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the payload.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the shared buffer handle.
    #[inline]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for Packet {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for Packet {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Packet {
    fn from(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }
}

impl From<&'static [u8]> for Packet {
    fn from(data: &'static [u8]) -> Self {
        Self(Bytes::from_static(data))
    }
}

impl From<Packet> for Bytes {
    fn from(packet: Packet) -> Self {
        packet.0
    }
}
