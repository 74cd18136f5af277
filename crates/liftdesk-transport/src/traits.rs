use serde::Deserialize;

use crate::error::Result;

/// Minimal byte-channel capability shared by the actuator and sensor roles.
///
/// The codecs in `liftdesk-frame` depend only on this trait. Implementations
/// decide what "open" means; a closed channel must reject reads and writes
/// with [`TransportError::Closed`](crate::TransportError::Closed).
pub trait ByteChannel: Send {
    /// Human-readable channel name (usually the port path).
    fn name(&self) -> &str;

    /// Open the channel. Opening an already open channel is a no-op.
    fn open(&mut self) -> Result<()>;

    /// Close the channel. Closing a closed channel is a no-op.
    fn close(&mut self);

    /// Whether the channel is currently open.
    fn is_open(&self) -> bool;

    /// Number of received bytes buffered and ready to read.
    fn bytes_waiting(&mut self) -> Result<usize>;

    /// Fill `buf` completely from the receive buffer.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Discard everything in the receive buffer.
    fn clear_input(&mut self) -> Result<()>;

    /// Write the whole of `bytes` to the channel.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Flush buffered output.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: ByteChannel + ?Sized> ByteChannel for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        (**self).bytes_waiting()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_exact(buf)
    }

    fn clear_input(&mut self) -> Result<()> {
        (**self).clear_input()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// When a reader opens and closes its channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelLifecycle {
    /// Open once and keep the channel open across reads.
    #[default]
    HoldOpen,
    /// Open immediately before each read and close right after it.
    OpenPerRead,
}

impl ChannelLifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelLifecycle::HoldOpen => "hold-open",
            ChannelLifecycle::OpenPerRead => "open-per-read",
        }
    }
}
