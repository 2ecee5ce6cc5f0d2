use crate::{Error, Result};

/// Outcome of a single read from a byte source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// `n` bytes were written to the front of the buffer.
    Data(usize),
    /// Nothing available yet; the caller may retry.
    Idle,
    /// The source reached end of stream.
    Closed,
}

/// Byte stream from the hardware link.
///
/// Reads may return any number of bytes, including one at a time, and may
/// stall for arbitrarily long between bytes.
pub trait ByteSource {
    fn fill(&mut self, buf: &mut [u8]) -> Result<Fill>;
}

// Blanket implementation for anything implementing std::io::Read. Serial
// ports opened with a read timeout report `TimedOut` when no byte arrived.
impl<T: std::io::Read> ByteSource for T {
    fn fill(&mut self, buf: &mut [u8]) -> Result<Fill> {
        match std::io::Read::read(self, buf) {
            Ok(0) if !buf.is_empty() => Ok(Fill::Closed),
            Ok(0) => Ok(Fill::Idle),
            Ok(n) => Ok(Fill::Data(n)),
            Err(e) => match e.kind() {
                std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::WouldBlock
                | std::io::ErrorKind::Interrupted => Ok(Fill::Idle),
                _ => Err(Error::Io(e)),
            },
        }
    }
}
