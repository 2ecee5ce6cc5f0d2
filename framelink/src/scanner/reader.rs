use bytes::BytesMut;
use tokio_util::sync::CancellationToken;

use super::{FrameCodec, ScanEvent, ScannerStats};
use crate::config::ScannerConfig;
use crate::core::Packet;
use crate::error::{Error, Result};
use crate::io::{ByteSource, Fill};

/// Blocking frame scanner over a byte source.
///
/// Owns the source exclusively. Each call to [`next_event`](Self::next_event)
/// reads as much as it needs, in whatever chunk sizes the source returns,
/// until the codec produces an event.
///
/// # Example
///
/// ```rust
/// use framelink::core::frame::to_frame_bytes;
/// use framelink::scanner::{FrameScanner, ScanEvent};
/// use tokio_util::sync::CancellationToken;
///
/// let wire = to_frame_bytes(b"hello").unwrap();
/// let mut scanner = FrameScanner::new(&wire[..], CancellationToken::new());
///
/// let packet = scanner.next_packet().unwrap().unwrap();
/// assert_eq!(packet.as_bytes(), b"hello");
/// ```
pub struct FrameScanner<S> {
    source: S,
    codec: FrameCodec,
    buffer: BytesMut,
    chunk: Vec<u8>,
    stop: CancellationToken,
}

impl<S: ByteSource> FrameScanner<S> {
    pub fn new(source: S, stop: CancellationToken) -> Self {
        Self::with_config(source, stop, ScannerConfig::default())
    }

    pub fn with_config(source: S, stop: CancellationToken, config: ScannerConfig) -> Self {
        // An empty chunk would read as `Idle` forever.
        let chunk_size = config.read_chunk_size.max(1);
        Self {
            source,
            codec: FrameCodec::new(),
            buffer: BytesMut::with_capacity(chunk_size * 2),
            chunk: vec![0u8; chunk_size],
            stop,
        }
    }

    /// Returns the next packet or frame loss.
    ///
    /// Returns `Ok(None)` once the stop token is cancelled while waiting
    /// for bytes. Byte-source faults are returned as errors; end of stream
    /// is [`Error::SourceClosed`].
    pub fn next_event(&mut self) -> Result<Option<ScanEvent>> {
        loop {
            if let Some(event) = self.codec.next_event(&mut self.buffer) {
                if let ScanEvent::FrameLost(loss) = &event {
                    log::debug!(
                        "Frame lost: len={}, reason={:?} (loss ratio {:.3})",
                        loss.length,
                        loss.reason,
                        self.codec.stats().loss_ratio()
                    );
                }
                return Ok(Some(event));
            }

            if self.stop.is_cancelled() {
                return Ok(None);
            }

            match self.source.fill(&mut self.chunk)? {
                Fill::Data(n) => {
                    log::trace!("Read {} bytes from source", n);
                    self.buffer.extend_from_slice(&self.chunk[..n]);
                }
                Fill::Idle => {}
                Fill::Closed => {
                    if self.codec.in_frame() {
                        log::debug!("Source closed inside a frame; partial frame dropped");
                    }
                    return Err(Error::SourceClosed);
                }
            }
        }
    }

    /// Returns the next validated packet, skipping frame losses.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        while let Some(event) = self.next_event()? {
            if let Some(packet) = event.into_packet() {
                return Ok(Some(packet));
            }
        }
        Ok(None)
    }

    pub fn stats(&self) -> &ScannerStats {
        self.codec.stats()
    }

    /// Releases the byte source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ByteSource> Iterator for FrameScanner<S> {
    type Item = Result<ScanEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::to_frame_bytes;
    use crate::scanner::{FrameLoss, LossReason};
    use std::collections::VecDeque;
    use std::io::{self, Read};

    /// Returns at most `step` bytes per read, with timeouts in between.
    struct Trickle {
        data: VecDeque<u8>,
        step: usize,
        idle_next: bool,
    }

    impl Trickle {
        fn new(data: Vec<u8>, step: usize) -> Self {
            Self {
                data: data.into(),
                step,
                idle_next: false,
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.idle_next = !self.idle_next;
            if self.idle_next {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "idle"));
            }
            let n = self.step.min(buf.len()).min(self.data.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.data.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        payloads
            .iter()
            .flat_map(|p| to_frame_bytes(p).unwrap())
            .collect()
    }

    #[test]
    fn test_one_byte_reads() {
        let data = wire(&[b"\x01\x02", b"", b"third"]);
        let source = Trickle::new(data, 1);
        let mut scanner = FrameScanner::new(source, CancellationToken::new());

        assert_eq!(scanner.next_packet().unwrap().unwrap().as_bytes(), b"\x01\x02");
        assert!(scanner.next_packet().unwrap().unwrap().is_empty());
        assert_eq!(scanner.next_packet().unwrap().unwrap().as_bytes(), b"third");
        assert!(matches!(scanner.next_event(), Err(Error::SourceClosed)));
        assert_eq!(scanner.stats().packets, 3);
    }

    #[test]
    fn test_uneven_chunks() {
        let payloads: Vec<Vec<u8>> = (0..20u8).map(|i| vec![i; i as usize * 5]).collect();
        let refs: Vec<&[u8]> = payloads.iter().map(|p| p.as_slice()).collect();
        let data = wire(&refs);

        for step in [3, 7, 64, 1000] {
            let config = ScannerConfig::new().with_read_chunk_size(17);
            let mut scanner =
                FrameScanner::with_config(Trickle::new(data.clone(), step), CancellationToken::new(), config);
            for expected in &payloads {
                let packet = scanner.next_packet().unwrap().unwrap();
                assert_eq!(packet.as_bytes(), expected.as_slice(), "step={step}");
            }
        }
    }

    #[test]
    fn test_loss_is_reported_not_raised() {
        let mut data = wire(&[b"good"]);
        let mut bad = to_frame_bytes(b"bad!").unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0x80;
        data.extend(bad);
        data.extend(wire(&[b"after"]));

        let scanner = FrameScanner::new(&data[..], CancellationToken::new());
        let events: Vec<_> = scanner.take(3).map(|e| e.unwrap()).collect();

        assert_eq!(events[0], ScanEvent::Packet(Packet::from(&b"good"[..])));
        assert_eq!(
            events[1],
            ScanEvent::FrameLost(FrameLoss {
                length: 7,
                reason: LossReason::ChecksumMismatch
            })
        );
        assert_eq!(events[2], ScanEvent::Packet(Packet::from(&b"after"[..])));
    }

    #[test]
    fn test_cancelled_scanner_stops_reading() {
        let stop = CancellationToken::new();
        let source = Trickle::new(vec![0x00; 16], 1);
        let mut scanner = FrameScanner::new(source, stop.clone());

        stop.cancel();
        assert!(scanner.next_event().unwrap().is_none());
        // Nothing was pulled from the source.
        assert_eq!(scanner.into_inner().data.len(), 16);
    }

    #[test]
    fn test_buffered_packet_survives_cancel() {
        let stop = CancellationToken::new();
        let data = wire(&[b"a", b"b"]);
        let mut scanner = FrameScanner::new(&data[..], stop.clone());

        assert!(scanner.next_packet().unwrap().is_some());
        stop.cancel();
        // The second frame is already buffered and complete.
        assert_eq!(scanner.next_packet().unwrap().unwrap().as_bytes(), b"b");
        assert!(scanner.next_packet().unwrap().is_none());
    }

    #[test]
    fn test_zero_chunk_size_still_reads() {
        let data = wire(&[b"x"]);
        let config = ScannerConfig { read_chunk_size: 0 };
        let mut scanner = FrameScanner::with_config(&data[..], CancellationToken::new(), config);

        assert_eq!(scanner.next_packet().unwrap().unwrap().as_bytes(), b"x");
        assert!(matches!(scanner.next_event(), Err(Error::SourceClosed)));
    }

    #[test]
    fn test_source_fault_is_fatal() {
        struct Unplugged;
        impl Read for Unplugged {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "device gone"))
            }
        }

        let mut scanner = FrameScanner::new(Unplugged, CancellationToken::new());
        assert!(matches!(scanner.next_event(), Err(Error::Io(_))));
    }
}
