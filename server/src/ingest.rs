//! Ingestion loops run on the blocking serial thread.

use std::io::Write;

use framelink::sink::persist;
use framelink::{ByteSource, Fill, FrameScanner, Packet, PacketSink, Publisher, ScanEvent};
use log::*;
use tokio_util::sync::CancellationToken;

/// What to do with bytes from the serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Scan for frames and keep validated packets.
    Framed {
        /// Stop after this many packets; 0 means unlimited.
        limit: usize,
    },
    /// Pass raw chunks through without framing.
    Repeat,
}

/// Destinations shared by both modes.
pub struct Outputs {
    pub sink: PacketSink,
    pub publisher: Publisher,
}

impl Outputs {
    fn deliver(&self, packet: Packet) {
        self.sink.append(packet.clone());
        if let Err(e) = self.publisher.submit(packet) {
            debug!("Packet not broadcast: {}", e);
        }
    }
}

/// Runs `mode` until the packet limit, cancellation or a link fault.
pub fn run<S: ByteSource>(
    source: S,
    mode: Mode,
    stop: CancellationToken,
    outputs: &Outputs,
) -> framelink::Result<()> {
    match mode {
        Mode::Framed { limit } => {
            let mut scanner = FrameScanner::new(source, stop);
            let result = run_framed(&mut scanner, limit, outputs);
            let stats = scanner.stats();
            info!(
                "Received {} packets, lost {} frames ({} checksum, {} length)",
                stats.packets, stats.frames_lost, stats.checksum_errors, stats.malformed_lengths
            );
            result
        }
        Mode::Repeat => {
            let stdout = std::io::stdout();
            run_repeat(source, &stop, &mut stdout.lock(), outputs)
        }
    }
}

pub fn run_framed<S: ByteSource>(
    scanner: &mut FrameScanner<S>,
    limit: usize,
    outputs: &Outputs,
) -> framelink::Result<()> {
    let mut count = 0usize;
    while limit == 0 || count < limit {
        match scanner.next_event()? {
            Some(ScanEvent::Packet(packet)) => {
                count += 1;
                info!("{}- Data: {}", count, decimal_line(&packet));
                outputs.deliver(packet);
            }
            Some(ScanEvent::FrameLost(loss)) => {
                warn!("{}- error: lost data (len={}, {:?})", count, loss.length, loss.reason);
            }
            None => {
                debug!("Ingestion cancelled after {} packets", count);
                break;
            }
        }
    }
    Ok(())
}

/// Space-separated decimal bytes.
fn decimal_line(data: &[u8]) -> String {
    data.iter().map(u8::to_string).collect::<Vec<_>>().join(" ")
}

/// Echoes raw chunks to `out` as Latin-1 text and records them.
pub fn run_repeat<S: ByteSource, W: Write>(
    mut source: S,
    stop: &CancellationToken,
    out: &mut W,
    outputs: &Outputs,
) -> framelink::Result<()> {
    let mut buf = vec![0u8; framelink::config::DEFAULT_READ_CHUNK_SIZE];
    while !stop.is_cancelled() {
        match source.fill(&mut buf)? {
            Fill::Data(n) => {
                let chunk = Packet::copy_from_slice(&buf[..n]);
                persist::write_text(out, std::slice::from_ref(&chunk))?;
                out.flush()?;
                outputs.deliver(chunk);
            }
            Fill::Idle => {}
            Fill::Closed => return Err(framelink::Error::SourceClosed),
        }
    }
    Ok(())
}
