use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, TransportError};
use crate::traits::ByteChannel;

/// In-process byte channel.
///
/// Clones share the same state, so a test (or a dry run) can keep one handle
/// to script incoming bytes and inspect written frames while the other handle
/// is owned by a reader or writer.
///
/// Incoming data is queued as *arrivals*. Each call to
/// [`bytes_waiting`](ByteChannel::bytes_waiting) moves the next arrival into
/// the receive buffer, which models bytes trickling in between polls.
#[derive(Clone, Default)]
pub struct MemoryChannel {
    name: String,
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    open: bool,
    arrivals: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    opens: usize,
    closes: usize,
}

impl MemoryChannel {
    /// Create a closed in-memory channel.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    /// Create an in-memory channel that is already open.
    pub fn opened(name: impl Into<String>) -> Self {
        let channel = Self::new(name);
        channel.lock().open = true;
        channel
    }

    /// Queue bytes that will arrive on a later poll.
    pub fn push_incoming(&self, bytes: impl Into<Vec<u8>>) {
        self.lock().arrivals.push_back(bytes.into());
    }

    /// Every `write_all` payload seen so far, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    /// Number of arrivals not yet delivered to the receive buffer.
    pub fn pending_arrivals(&self) -> usize {
        self.lock().arrivals.len()
    }

    /// How many times the channel transitioned from closed to open.
    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// How many times the channel transitioned from open to closed.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_open(&self) -> Result<MutexGuard<'_, MemoryState>> {
        let state = self.lock();
        if !state.open {
            return Err(TransportError::Closed(self.name.clone()));
        }
        Ok(state)
    }
}

impl ByteChannel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            state.open = true;
            state.opens += 1;
        }
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.lock();
        if state.open {
            state.open = false;
            state.closes += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        let mut state = self.lock_open()?;
        if let Some(arrival) = state.arrivals.pop_front() {
            state.rx.extend(arrival);
        }
        Ok(state.rx.len())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut state = self.lock_open()?;
        if state.rx.len() < buf.len() {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "{} has {} bytes buffered, {} requested",
                    self.name,
                    state.rx.len(),
                    buf.len()
                ),
            )));
        }
        let len = buf.len();
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..len)) {
            *slot = byte;
        }
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.lock_open()?.rx.clear();
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.lock_open()?.written.push(bytes.to_vec());
        Ok(())
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrivals_trickle_in_one_per_poll() {
        let mut channel = MemoryChannel::opened("sensor");
        channel.push_incoming(vec![1, 2, 3]);
        channel.push_incoming(vec![4, 5]);

        assert_eq!(channel.bytes_waiting().unwrap(), 3);
        assert_eq!(channel.bytes_waiting().unwrap(), 5);
        assert_eq!(channel.bytes_waiting().unwrap(), 5);

        let mut buf = [0u8; 4];
        channel.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(channel.bytes_waiting().unwrap(), 1);
    }

    #[test]
    fn clear_input_drops_buffered_bytes_only() {
        let mut channel = MemoryChannel::opened("sensor");
        channel.push_incoming(vec![1, 2, 3]);
        channel.push_incoming(vec![4]);

        assert_eq!(channel.bytes_waiting().unwrap(), 3);
        channel.clear_input().unwrap();
        assert_eq!(channel.pending_arrivals(), 1);
        assert_eq!(channel.bytes_waiting().unwrap(), 1);
    }

    #[test]
    fn short_read_is_an_error() {
        let mut channel = MemoryChannel::opened("sensor");
        channel.push_incoming(vec![1, 2]);
        channel.bytes_waiting().unwrap();

        let mut buf = [0u8; 9];
        let err = channel.read_exact(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn clones_share_written_frames() {
        let observer = MemoryChannel::opened("actuator");
        let mut writer = observer.clone();

        writer.write_all(b"0101").unwrap();
        writer.write_all(b"0100").unwrap();

        assert_eq!(observer.written(), vec![b"0101".to_vec(), b"0100".to_vec()]);
    }

    #[test]
    fn closed_channel_rejects_io() {
        let mut channel = MemoryChannel::new("actuator");
        assert!(matches!(
            channel.write_all(b"x"),
            Err(TransportError::Closed(name)) if name == "actuator"
        ));

        channel.open().unwrap();
        channel.write_all(b"x").unwrap();
        channel.close();
        assert!(channel.write_all(b"y").is_err());
    }

    #[test]
    fn open_and_close_are_counted_once_per_transition() {
        let mut channel = MemoryChannel::new("sensor");
        channel.open().unwrap();
        channel.open().unwrap();
        channel.close();
        channel.close();

        assert_eq!(channel.open_count(), 1);
        assert_eq!(channel.close_count(), 1);
    }
}
