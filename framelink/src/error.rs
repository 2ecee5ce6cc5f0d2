use std::net::SocketAddr;

/// Errors surfaced by the scanner, the sink persistence helpers and the hub.
///
/// Frame losses are not errors: the scanner reports them as
/// [`ScanEvent::FrameLost`](crate::scanner::ScanEvent) and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the byte source, a socket or an output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source reported end of stream.
    #[error("Byte source closed")]
    SourceClosed,

    /// A hub server could not bind its endpoint.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Payload does not fit in a single frame.
    #[error("Payload of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(usize),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The hub has no running server left to accept packets.
    #[error("Broadcast hub stopped")]
    HubStopped,
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        match err {
            Error::Io(e) => e,
            Error::SourceClosed => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, Error::SourceClosed)
            }
            Error::Bind { source, .. } => source,
            other => std::io::Error::other(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
