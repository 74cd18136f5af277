use std::time::Duration;

/// Errors that can occur while moving the desk.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    /// Frame-level error (encoding or channel I/O).
    #[error("frame error: {0}")]
    Frame(#[from] liftdesk_frame::FrameError),

    /// A leg did not reach its target within the configured bound.
    #[error("leg {leg} did not reach {target} within {waited:?} (last reading {last_reading:?})")]
    ConvergenceTimeout {
        leg: String,
        target: u32,
        waited: Duration,
        last_reading: Option<u16>,
    },

    /// A leg worker thread panicked.
    #[error("leg {0} worker panicked")]
    WorkerPanicked(String),

    /// The command text is not one the desk understands.
    #[error("invalid command {0:?}")]
    InvalidCommand(String),

    /// A desk needs legs to move.
    #[error("desk has no legs")]
    NoLegs,
}

pub type Result<T> = std::result::Result<T, DeskError>;
