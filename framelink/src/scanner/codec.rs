use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{FrameLoss, LossReason, ScanEvent, ScannerStats};
use crate::core::checksum::{self, CHECKSUM_LEN};
use crate::core::frame::{self, HEADER_BYTE, MIN_FRAME_LEN};
use crate::core::Packet;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Looking for two consecutive header bytes.
    Seeking,
    /// Header matched, next byte is `LEN`.
    Length,
    /// `LEN` read, waiting for the remaining `len - 1` bytes.
    Body { len: u8 },
}

/// Byte-level frame state machine.
///
/// Bytes are taken from the caller's buffer as they are examined. While a
/// frame body is incomplete nothing is consumed, so the buffer may be
/// topped up in chunks of any size between calls.
#[derive(Debug)]
pub struct FrameCodec {
    /// Last byte seen while seeking; `None` means no header byte pending.
    last: Option<u8>,
    phase: Phase,
    stats: ScannerStats,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            last: None,
            phase: Phase::Seeking,
            stats: ScannerStats::default(),
        }
    }

    pub fn stats(&self) -> &ScannerStats {
        &self.stats
    }

    /// Returns true while a header has matched and a frame is incomplete.
    pub fn in_frame(&self) -> bool {
        self.phase != Phase::Seeking
    }

    /// Runs the state machine over `src` until it produces an event or
    /// needs more bytes.
    pub fn next_event(&mut self, src: &mut BytesMut) -> Option<ScanEvent> {
        loop {
            match self.phase {
                Phase::Seeking => {
                    if !src.has_remaining() {
                        return None;
                    }
                    let byte = src.get_u8();
                    self.stats.bytes_consumed += 1;

                    if self.last == Some(HEADER_BYTE) && byte == HEADER_BYTE {
                        self.last = None;
                        self.phase = Phase::Length;
                    } else {
                        self.last = Some(byte);
                    }
                }
                Phase::Length => {
                    if !src.has_remaining() {
                        return None;
                    }
                    let len = src.get_u8();
                    self.stats.bytes_consumed += 1;

                    if len < MIN_FRAME_LEN {
                        return Some(self.lose(len, LossReason::MalformedLength));
                    }
                    self.phase = Phase::Body { len };
                }
                Phase::Body { len } => {
                    let remaining = len as usize - 1;
                    if src.len() < remaining {
                        return None;
                    }

                    let mut frame = BytesMut::with_capacity(len as usize);
                    frame.put_u8(len);
                    frame.put_slice(&src[..remaining]);
                    src.advance(remaining);
                    self.stats.bytes_consumed += remaining as u64;

                    return Some(self.finish(frame));
                }
            }
        }
    }

    /// Validates a complete frame body and resets to seeking.
    fn finish(&mut self, frame: BytesMut) -> ScanEvent {
        let len = frame[0];
        if !checksum::validate(&frame) {
            return self.lose(len, LossReason::ChecksumMismatch);
        }

        self.reset();
        self.stats.packets += 1;

        let payload = frame.freeze().slice(1..frame_payload_end(len));
        ScanEvent::Packet(Packet::new(payload))
    }

    fn lose(&mut self, length: u8, reason: LossReason) -> ScanEvent {
        self.reset();
        self.stats.frames_lost += 1;
        match reason {
            LossReason::ChecksumMismatch => self.stats.checksum_errors += 1,
            LossReason::MalformedLength => self.stats.malformed_lengths += 1,
        }
        ScanEvent::FrameLost(FrameLoss { length, reason })
    }

    /// Returns to seeking with no header byte pending.
    pub fn reset(&mut self) {
        self.last = None;
        self.phase = Phase::Seeking;
    }
}

fn frame_payload_end(len: u8) -> usize {
    len as usize - CHECKSUM_LEN
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = ScanEvent;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ScanEvent>> {
        Ok(self.next_event(src))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<ScanEvent>> {
        // A truncated frame or trailing garbage at end of stream is dropped.
        match self.next_event(buf) {
            Some(event) => Ok(Some(event)),
            None => {
                buf.clear();
                Ok(None)
            }
        }
    }
}

impl<'a> Encoder<&'a [u8]> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, payload: &'a [u8], dst: &mut BytesMut) -> Result<()> {
        frame::encode(payload, dst)
    }
}
