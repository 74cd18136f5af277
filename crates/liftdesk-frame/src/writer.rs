use std::sync::{Mutex, MutexGuard, PoisonError};

use liftdesk_transport::ByteChannel;
use tracing::debug;

use crate::codec::{ActuatorCommand, FieldWidths};
use crate::direction::Direction;
use crate::error::Result;

/// Writes actuator command frames to a channel shared by every leg.
///
/// Each frame is written while holding the channel lock, so frames from
/// concurrent legs never interleave on the wire.
pub struct ActuatorWriter<C> {
    inner: Mutex<C>,
    widths: FieldWidths,
}

impl<C: ByteChannel> ActuatorWriter<C> {
    /// Create an actuator writer. The channel is expected to be open already.
    pub fn new(inner: C, widths: FieldWidths) -> Self {
        Self {
            inner: Mutex::new(inner),
            widths,
        }
    }

    /// Encode and send one command.
    pub fn send(&self, identifier: u16, direction: Direction) -> Result<()> {
        self.write_command(&ActuatorCommand::new(identifier, direction))
    }

    /// Write a complete command frame (blocking).
    pub fn write_command(&self, command: &ActuatorCommand) -> Result<()> {
        let frame = command.encode(&self.widths)?;

        let mut channel = self.lock();
        channel.write_all(&frame)?;
        channel.flush()?;
        drop(channel);

        debug!(
            identifier = command.identifier,
            direction = %command.direction,
            frame = %String::from_utf8_lossy(&frame),
            "actuator frame sent"
        );
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_open()
    }

    /// Close the underlying channel.
    pub fn close(&self) {
        self.lock().close();
    }

    /// Consume the writer and return the inner channel.
    pub fn into_inner(self) -> C {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, C> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
