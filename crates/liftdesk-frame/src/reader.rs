use std::thread;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use liftdesk_transport::{ByteChannel, ChannelLifecycle};
use serde::Deserialize;
use tracing::trace;

use crate::codec::{decode_sensor_frame, SensorFrame, SENSOR_FRAME_SIZE, SENSOR_HEADER};
use crate::error::{FrameError, Result};

const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(1);

/// How the reader finds frame boundaries in the sensor stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameSync {
    /// Take the first 9 waiting bytes as a frame and drop the rest.
    ///
    /// Alignment is only checked after the window is consumed, so bursty
    /// input can keep the reader off the true frame boundary for a while.
    #[default]
    Window,
    /// Drain everything waiting and decode the newest header-aligned frame.
    ScanHeader,
}

impl FrameSync {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameSync::Window => "window",
            FrameSync::ScanHeader => "scan-header",
        }
    }
}

/// Configuration for a [`SensorReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    pub lifecycle: ChannelLifecycle,
    pub sync: FrameSync,
    /// Pause between polls while a full frame has not arrived yet.
    pub idle_wait: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            lifecycle: ChannelLifecycle::HoldOpen,
            sync: FrameSync::Window,
            idle_wait: DEFAULT_IDLE_WAIT,
        }
    }
}

/// Reads distance-sensor frames from any [`ByteChannel`].
///
/// Frames with a bad header are dropped silently; callers only ever see
/// decoded readings or channel errors.
pub struct SensorReader<C> {
    inner: C,
    buf: BytesMut,
    config: SensorConfig,
}

impl<C: ByteChannel> SensorReader<C> {
    /// Create a sensor reader with default configuration.
    pub fn new(inner: C) -> Self {
        Self::with_config(inner, SensorConfig::default())
    }

    /// Create a sensor reader with explicit configuration.
    pub fn with_config(inner: C, config: SensorConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(4 * SENSOR_FRAME_SIZE),
            config,
        }
    }

    /// Read the next valid frame (blocking, no time limit).
    pub fn read_frame(&mut self) -> Result<SensorFrame> {
        self.read_frame_until(None)
    }

    /// Read the next valid frame, giving up after `limit`.
    pub fn read_frame_timeout(&mut self, limit: Duration) -> Result<SensorFrame> {
        self.read_frame_until(Some((Instant::now() + limit, limit)))
    }

    /// Distance field of the next valid frame.
    pub fn distance(&mut self) -> Result<u16> {
        self.read_frame().map(|frame| frame.distance)
    }

    /// Distance field of the next valid frame, giving up after `limit`.
    pub fn distance_timeout(&mut self, limit: Duration) -> Result<u16> {
        self.read_frame_timeout(limit).map(|frame| frame.distance)
    }

    fn read_frame_until(&mut self, deadline: Option<(Instant, Duration)>) -> Result<SensorFrame> {
        self.inner.open()?;
        let result = self.poll_frame(deadline);
        if self.config.lifecycle == ChannelLifecycle::OpenPerRead {
            self.close();
        }
        result
    }

    fn poll_frame(&mut self, deadline: Option<(Instant, Duration)>) -> Result<SensorFrame> {
        loop {
            let frame = match self.config.sync {
                FrameSync::Window => self.try_window()?,
                FrameSync::ScanHeader => self.try_scan()?,
            };
            if let Some(frame) = frame {
                return Ok(frame);
            }

            if let Some((at, limit)) = deadline {
                if Instant::now() >= at {
                    return Err(FrameError::Timeout(limit));
                }
            }
            thread::sleep(self.config.idle_wait);
        }
    }

    fn try_window(&mut self) -> Result<Option<SensorFrame>> {
        if self.inner.bytes_waiting()? < SENSOR_FRAME_SIZE {
            return Ok(None);
        }

        let mut window = [0u8; SENSOR_FRAME_SIZE];
        self.inner.read_exact(&mut window)?;
        self.inner.clear_input()?;

        let frame = decode_sensor_frame(&window);
        if frame.is_none() {
            trace!(channel = self.inner.name(), "discarding misaligned sensor window");
        }
        Ok(frame)
    }

    fn try_scan(&mut self) -> Result<Option<SensorFrame>> {
        let waiting = self.inner.bytes_waiting()?;
        if waiting > 0 {
            let start = self.buf.len();
            self.buf.resize(start + waiting, 0);
            self.inner.read_exact(&mut self.buf[start..])?;
        }

        if let Some(offset) = newest_aligned_frame(&self.buf) {
            let frame = decode_sensor_frame(&self.buf[offset..offset + SENSOR_FRAME_SIZE]);
            self.buf.advance(offset + SENSOR_FRAME_SIZE);
            return Ok(frame);
        }

        // Nothing aligned: only a trailing partial frame can still be useful.
        if self.buf.len() >= SENSOR_FRAME_SIZE {
            let stale = self.buf.len() - (SENSOR_FRAME_SIZE - 1);
            trace!(
                channel = self.inner.name(),
                dropped = stale,
                "discarding unaligned sensor bytes"
            );
            self.buf.advance(stale);
        }
        Ok(None)
    }

    /// Close the underlying channel and drop any partial frame.
    ///
    /// Bytes from one session never join bytes from the next.
    pub fn close(&mut self) {
        self.buf.clear();
        self.inner.close();
    }

    /// Borrow the underlying channel.
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

}

/// Offset of the newest complete frame in a chain of header-aligned frames.
fn newest_aligned_frame(buf: &[u8]) -> Option<usize> {
    let mut offset = 0usize;
    let mut newest = None;
    while offset + SENSOR_FRAME_SIZE <= buf.len() {
        if buf[offset..offset + 2] == SENSOR_HEADER {
            newest = Some(offset);
            offset += SENSOR_FRAME_SIZE;
        } else {
            offset += 1;
        }
    }
    newest
}

#[cfg(test)]
mod tests {
    use liftdesk_transport::MemoryChannel;

    use super::*;

    fn frame_bytes(distance: u16) -> Vec<u8> {
        let [lo, hi] = distance.to_le_bytes();
        vec![0x59, 0x59, lo, hi, 0x10, 0x00, 0x40, 0x07, 0x00]
    }

    fn scan_config() -> SensorConfig {
        SensorConfig {
            sync: FrameSync::ScanHeader,
            ..SensorConfig::default()
        }
    }

    #[test]
    fn read_single_frame() {
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(vec![0x59, 0x59, 0x01, 0x02, 0x03, 0x04, 0x40, 0x07, 0x00]);

        let mut reader = SensorReader::new(channel);
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.distance, 513);
        assert_eq!(frame.strength, 1027);
        assert_eq!(frame.temperature, -24.0);
    }

    #[test]
    fn waits_for_a_full_frame() {
        let bytes = frame_bytes(321);
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(bytes[..4].to_vec());
        channel.push_incoming(bytes[4..].to_vec());

        let mut reader = SensorReader::new(channel);
        assert_eq!(reader.distance().unwrap(), 321);
    }

    #[test]
    fn window_mode_drops_buffered_remainder() {
        let channel = MemoryChannel::new("lidar");
        let mut burst = frame_bytes(100);
        burst.extend(frame_bytes(200));
        channel.push_incoming(burst);
        channel.push_incoming(frame_bytes(300));

        let mut reader = SensorReader::new(channel);
        assert_eq!(reader.distance().unwrap(), 100);
        // The second frame of the burst was cleared with the input buffer.
        assert_eq!(reader.distance().unwrap(), 300);
    }

    #[test]
    fn misaligned_window_is_skipped() {
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(vec![0x00, 0x59, 0x59, 0x01, 0x02, 0x03, 0x04, 0x40, 0x07]);
        channel.push_incoming(frame_bytes(42));

        let mut reader = SensorReader::new(channel.clone());
        assert_eq!(reader.distance().unwrap(), 42);
        assert_eq!(channel.pending_arrivals(), 0);
    }

    #[test]
    fn window_mode_loses_a_frame_behind_leading_noise() {
        let mut noisy = vec![0xAA, 0xBB, 0xCC];
        noisy.extend(frame_bytes(77));
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(noisy);
        channel.push_incoming(frame_bytes(78));

        let mut reader = SensorReader::new(channel);
        assert_eq!(reader.distance().unwrap(), 78);
    }

    #[test]
    fn scan_mode_recovers_frame_behind_leading_noise() {
        let mut noisy = vec![0xAA, 0xBB, 0xCC];
        noisy.extend(frame_bytes(77));
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(noisy);
        channel.push_incoming(frame_bytes(78));

        let mut reader = SensorReader::with_config(channel, scan_config());
        assert_eq!(reader.distance().unwrap(), 77);
        assert_eq!(reader.distance().unwrap(), 78);
    }

    #[test]
    fn scan_mode_prefers_newest_frame() {
        let mut burst = frame_bytes(10);
        burst.extend(frame_bytes(20));
        burst.extend(frame_bytes(30));
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(burst);

        let mut reader = SensorReader::with_config(channel, scan_config());
        assert_eq!(reader.distance().unwrap(), 30);
    }

    #[test]
    fn scan_mode_does_not_split_payload_that_looks_like_header() {
        // Distance 0x5959 puts header-like pairs inside the payload.
        let mut burst = frame_bytes(0x5959);
        burst.extend(&frame_bytes(12)[..3]);
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(burst);

        let mut reader = SensorReader::with_config(channel, scan_config());
        assert_eq!(reader.distance().unwrap(), 0x5959);
    }

    #[test]
    fn scan_mode_keeps_partial_trailing_frame() {
        let next = frame_bytes(55);
        let mut burst = frame_bytes(44);
        burst.extend(&next[..5]);
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(burst);
        channel.push_incoming(next[5..].to_vec());

        let mut reader = SensorReader::with_config(channel, scan_config());
        assert_eq!(reader.distance().unwrap(), 44);
        assert_eq!(reader.distance().unwrap(), 55);
    }

    #[test]
    fn open_per_read_scan_discards_partial_frame_between_sessions() {
        let channel = MemoryChannel::new("lidar");
        let mut first = frame_bytes(44);
        first.extend([0x59, 0x59, 0xAA]);
        channel.push_incoming(first);
        channel.push_incoming(vec![0x00, 0x10, 0x00, 0x40, 0x07, 0x00]);
        channel.push_incoming(frame_bytes(55));

        let config = SensorConfig {
            lifecycle: ChannelLifecycle::OpenPerRead,
            ..scan_config()
        };
        let mut reader = SensorReader::with_config(channel.clone(), config);
        assert_eq!(reader.distance().unwrap(), 44);
        assert_eq!(reader.distance().unwrap(), 55);
        assert_eq!(channel.open_count(), 2);
    }

    #[test]
    fn close_drops_partial_frame() {
        let next = frame_bytes(55);
        let mut burst = frame_bytes(44);
        burst.extend(&next[..5]);
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(burst);
        channel.push_incoming(next[5..].to_vec());
        channel.push_incoming(frame_bytes(66));

        let mut reader = SensorReader::with_config(channel, scan_config());
        assert_eq!(reader.distance().unwrap(), 44);
        reader.close();
        assert_eq!(reader.distance().unwrap(), 66);
    }

    #[test]
    fn hold_open_opens_once() {
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(frame_bytes(1));
        channel.push_incoming(frame_bytes(2));

        let mut reader = SensorReader::new(channel.clone());
        reader.distance().unwrap();
        reader.distance().unwrap();

        assert_eq!(channel.open_count(), 1);
        assert_eq!(channel.close_count(), 0);
        assert!(channel.is_open());
    }

    #[test]
    fn open_per_read_closes_after_each_frame() {
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(frame_bytes(1));
        channel.push_incoming(frame_bytes(2));

        let config = SensorConfig {
            lifecycle: ChannelLifecycle::OpenPerRead,
            ..SensorConfig::default()
        };
        let mut reader = SensorReader::with_config(channel.clone(), config);
        reader.distance().unwrap();
        reader.distance().unwrap();

        assert_eq!(channel.open_count(), 2);
        assert_eq!(channel.close_count(), 2);
        assert!(!channel.is_open());
    }

    #[test]
    fn stalled_sensor_times_out() {
        let channel = MemoryChannel::new("lidar");
        let mut reader = SensorReader::new(channel);

        let err = reader.read_frame_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, FrameError::Timeout(limit) if limit == Duration::from_millis(20)));
    }

    #[test]
    fn close_releases_channel() {
        let channel = MemoryChannel::new("lidar");
        channel.push_incoming(frame_bytes(9));
        let mut reader = SensorReader::new(channel.clone());
        reader.distance().unwrap();

        reader.close();
        assert!(!reader.get_ref().is_open());
        assert_eq!(channel.close_count(), 1);
    }
}
