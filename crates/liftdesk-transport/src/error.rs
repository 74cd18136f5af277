/// Errors that can occur in byte-channel operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial port.
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },

    /// The serial driver reported an error on an open port.
    #[error("serial error on {path}: {source}")]
    Serial {
        path: String,
        source: serialport::Error,
    },

    /// An I/O error occurred on the channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel is not open.
    #[error("channel {0} is closed")]
    Closed(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
