//! Frame scanner.
//!
//! Recovers checksum-validated packets from an unstructured byte stream.
//! The state machine lives in [`FrameCodec`] and works on whatever bytes
//! are buffered; [`FrameScanner`] drives it from a blocking
//! [`ByteSource`](crate::io::ByteSource) such as a serial port.
//!
//! ```text
//!   Seeking ──0xFF 0xFF──▶ Length ──LEN >= 3──▶ Body ──LEN-1 bytes──▶ validate
//!      ▲                     │                                           │
//!      └──── LEN < 3 ────────┘◀────────── packet / frame lost ───────────┘
//! ```
//!
//! Every exit back to `Seeking` forgets the last byte seen, so the tail
//! of a dropped frame is never mistaken for the start of a header.

mod codec;
mod reader;

pub use codec::FrameCodec;
pub use reader::FrameScanner;

use crate::core::Packet;

/// Why a frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossReason {
    /// The received checksum pair did not match the computed one.
    ChecksumMismatch,
    /// The length byte was too small to hold the checksum pair.
    MalformedLength,
}

/// A frame that was found after a header but failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLoss {
    /// Declared `LEN` byte.
    pub length: u8,
    pub reason: LossReason,
}

/// Output of the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A frame passed validation.
    Packet(Packet),
    /// A frame was dropped and the scanner resynchronized.
    FrameLost(FrameLoss),
}

impl ScanEvent {
    /// Returns the packet, if this event carries one.
    pub fn into_packet(self) -> Option<Packet> {
        match self {
            ScanEvent::Packet(packet) => Some(packet),
            ScanEvent::FrameLost(_) => None,
        }
    }
}

/// Statistics about scanner operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScannerStats {
    /// Packets emitted.
    pub packets: u64,

    /// Frames dropped for any reason.
    pub frames_lost: u64,

    /// Frames dropped because the checksum did not match.
    pub checksum_errors: u64,

    /// Frames dropped because the length byte was below the minimum.
    pub malformed_lengths: u64,

    /// Bytes taken off the stream, header bytes and garbage included.
    pub bytes_consumed: u64,
}

impl ScannerStats {
    /// Fraction of attempted frames that were lost.
    pub fn loss_ratio(&self) -> f64 {
        let attempts = self.packets + self.frames_lost;
        if attempts == 0 {
            return 0.0;
        }
        self.frames_lost as f64 / attempts as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_ratio() {
        let mut stats = ScannerStats::default();
        assert_eq!(stats.loss_ratio(), 0.0);

        stats.packets = 3;
        stats.frames_lost = 1;
        assert_eq!(stats.loss_ratio(), 0.25);
    }
}
