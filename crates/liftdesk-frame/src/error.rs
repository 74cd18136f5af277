use std::time::Duration;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A value does not fit its fixed-width field.
    #[error("{field} value {value:?} does not fit in {width} characters")]
    FieldOverflow {
        field: &'static str,
        value: String,
        width: usize,
    },

    /// A field width cannot encode every value it has to carry.
    #[error("invalid {field} width {width}: {reason}")]
    InvalidWidth {
        field: &'static str,
        width: usize,
        reason: &'static str,
    },

    /// An actuator frame could not be parsed.
    #[error("malformed actuator frame {0:?}")]
    MalformedCommand(String),

    /// No valid sensor frame arrived in time.
    #[error("no sensor frame within {0:?}")]
    Timeout(Duration),

    /// The underlying channel failed.
    #[error("frame transport error: {0}")]
    Transport(#[from] liftdesk_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
