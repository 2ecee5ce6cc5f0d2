//! Packet sink.
//!
//! Append-only, ordered record of every packet the scanner recovered. The
//! ingestion task appends; shutdown takes a snapshot and hands it to
//! [`persist`].

pub mod persist;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::Packet;

/// Shared handle to the ordered packet record.
///
/// Cloning the handle shares the same record.
#[derive(Debug, Clone, Default)]
pub struct PacketSink {
    packets: Arc<Mutex<Vec<Packet>>>,
}

impl PacketSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Packet>> {
        // A panicking appender cannot leave the Vec half-written.
        self.packets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a packet at the end of the sequence.
    pub fn append(&self, packet: Packet) {
        self.lock().push(packet);
    }

    /// Copies the full sequence in arrival order.
    pub fn snapshot(&self) -> Vec<Packet> {
        self.lock().clone()
    }

    /// Moves the full sequence out, leaving the sink empty.
    pub fn take(&self) -> Vec<Packet> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
