use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::ByteChannel;

/// Port parameters for a [`SerialChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub path: String,
    pub baud_rate: u32,
    /// Read/write timeout applied by the serial driver.
    pub timeout: Duration,
}

impl SerialSettings {
    pub fn new(path: impl Into<String>, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            timeout,
        }
    }
}

/// Serial port transport.
///
/// The port handle only exists while the channel is open, so dropping or
/// closing a `SerialChannel` always releases the device.
pub struct SerialChannel {
    settings: SerialSettings,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialChannel {
    /// Create a closed channel. Call [`ByteChannel::open`] before use.
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            port: None,
        }
    }

    /// Create a channel and open it immediately.
    pub fn open_with(settings: SerialSettings) -> Result<Self> {
        let mut channel = Self::new(settings);
        channel.open()?;
        Ok(channel)
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        match self.port.as_mut() {
            Some(port) => Ok(port),
            None => Err(TransportError::Closed(self.settings.path.clone())),
        }
    }

    fn serial_error(&self, source: serialport::Error) -> TransportError {
        TransportError::Serial {
            path: self.settings.path.clone(),
            source,
        }
    }
}

impl ByteChannel for SerialChannel {
    fn name(&self) -> &str {
        &self.settings.path
    }

    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(self.settings.path.as_str(), self.settings.baud_rate)
            .timeout(self.settings.timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: self.settings.path.clone(),
                source,
            })?;
        debug!(
            path = %self.settings.path,
            baud_rate = self.settings.baud_rate,
            "serial port opened"
        );
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(path = %self.settings.path, "serial port closed");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        let waiting = self.port()?.bytes_to_read();
        waiting
            .map(|n| n as usize)
            .map_err(|source| self.serial_error(source))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.port()?.read_exact(buf)?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        let cleared = self.port()?.clear(ClearBuffer::Input);
        cleared.map_err(|source| self.serial_error(source))
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port()?.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.port()?.flush()?;
        Ok(())
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        if self.port.is_some() {
            info!(path = %self.settings.path, "releasing serial port");
        }
    }
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("path", &self.settings.path)
            .field("baud_rate", &self.settings.baud_rate)
            .field("open", &self.port.is_some())
            .finish()
    }
}
