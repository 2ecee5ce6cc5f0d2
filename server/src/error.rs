use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that abort the logger.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Scanner, hub or persistence failure.
    #[error(transparent)]
    Link(#[from] framelink::Error),

    /// The serial device could not be opened.
    #[error("Could not open serial port {port}: {source}. Try another port with --serial-port")]
    SerialOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// The options file exists but is not valid TOML for our options.
    #[error("Invalid options file {}: {source}", path.display())]
    OptionsFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking ingestion task panicked or was aborted.
    #[error("Ingestion task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
