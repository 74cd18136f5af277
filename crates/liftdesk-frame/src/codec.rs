use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::direction::Direction;
use crate::error::{FrameError, Result};

/// Sensor frame: header (2) + distance (2) + strength (2) + temperature (2) + spare (1).
pub const SENSOR_FRAME_SIZE: usize = 9;

/// Header bytes that open every sensor frame.
pub const SENSOR_HEADER: [u8; 2] = [0x59, 0x59];

/// One reading from a distance sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    /// Distance in sensor units.
    pub distance: u16,
    /// Return signal strength.
    pub strength: u16,
    /// Chip temperature, already scaled.
    pub temperature: f64,
}

/// Decode a sensor frame from a 9-byte window.
///
/// Wire format:
/// ```text
/// ┌───────────┬────────────┬────────────┬────────────┬───────┐
/// │ 0x59 0x59 │ distance   │ strength   │ temp raw   │ spare │
/// │           │ (2B LE)    │ (2B LE)    │ (2B LE)    │ (1B)  │
/// └───────────┴────────────┴────────────┴────────────┴───────┘
/// ```
///
/// Temperature is `raw / 8 - 256`. The spare byte is not checked.
/// Returns `None` when the window is short or does not start with the header.
pub fn decode_sensor_frame(window: &[u8]) -> Option<SensorFrame> {
    if window.len() < SENSOR_FRAME_SIZE || window[0..2] != SENSOR_HEADER {
        return None;
    }

    let mut body = &window[2..8];
    let distance = body.get_u16_le();
    let strength = body.get_u16_le();
    let raw_temperature = body.get_u16_le();

    Some(SensorFrame {
        distance,
        strength,
        temperature: f64::from(raw_temperature) / 8.0 - 256.0,
    })
}

/// Fixed widths of the two actuator frame fields.
///
/// Widths are chosen once at startup; the actuator board parses frames purely
/// by position, so they never change while the desk runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldWidths {
    identifier: usize,
    message: usize,
}

impl FieldWidths {
    /// Validate and build field widths.
    ///
    /// The message field carries `-1`, so it needs at least two characters.
    pub fn new(identifier: usize, message: usize) -> Result<Self> {
        if identifier == 0 {
            return Err(FrameError::InvalidWidth {
                field: "identifier",
                width: identifier,
                reason: "must be at least 1",
            });
        }
        if message < 2 {
            return Err(FrameError::InvalidWidth {
                field: "message",
                width: message,
                reason: "must be at least 2 to carry -1",
            });
        }
        Ok(Self {
            identifier,
            message,
        })
    }

    pub fn identifier(&self) -> usize {
        self.identifier
    }

    /// Total actuator frame length.
    pub fn frame_len(&self) -> usize {
        self.identifier + self.message
    }

    /// Whether `identifier` fits the identifier field.
    pub fn fits_identifier(&self, identifier: u16) -> bool {
        identifier.to_string().len() <= self.identifier
    }
}

/// A single instruction for the actuator board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommand {
    pub identifier: u16,
    pub direction: Direction,
}

impl ActuatorCommand {
    pub fn new(identifier: u16, direction: Direction) -> Self {
        Self {
            identifier,
            direction,
        }
    }

    pub fn stop(identifier: u16) -> Self {
        Self::new(identifier, Direction::Stop)
    }

    /// Encode into a standalone frame.
    pub fn encode(&self, widths: &FieldWidths) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(widths.frame_len());
        encode_actuator_frame(self.identifier, self.direction, widths, &mut dst)?;
        Ok(dst.freeze())
    }
}

/// Encode an actuator command into the wire format.
///
/// Wire format (widths 2/2 shown):
/// ```text
/// ┌────────────┬────────────┐
/// │ identifier │ direction  │   "03" + "01"  -> up
/// │ zero-pad   │ zero-pad   │   "03" + "-1"  -> down
/// └────────────┴────────────┘   "03" + "00"  -> stop
/// ```
///
/// Negative directions keep the sign in front and zero-pad the magnitude
/// behind it, so `-1` at width 3 is `-01`.
pub fn encode_actuator_frame(
    identifier: u16,
    direction: Direction,
    widths: &FieldWidths,
    dst: &mut BytesMut,
) -> Result<()> {
    let identifier = pad_field("identifier", i64::from(identifier), widths.identifier)?;
    let direction = pad_field("message", i64::from(direction.code()), widths.message)?;

    dst.reserve(widths.frame_len());
    dst.put_slice(identifier.as_bytes());
    dst.put_slice(direction.as_bytes());
    Ok(())
}

/// Parse an actuator frame the way the actuator board does.
pub fn decode_actuator_frame(frame: &[u8], widths: &FieldWidths) -> Result<ActuatorCommand> {
    let malformed = || FrameError::MalformedCommand(String::from_utf8_lossy(frame).into_owned());

    if frame.len() != widths.frame_len() || !frame.is_ascii() {
        return Err(malformed());
    }

    let (identifier, direction) = frame.split_at(widths.identifier);
    let identifier = std::str::from_utf8(identifier).map_err(|_| malformed())?;
    let direction = std::str::from_utf8(direction).map_err(|_| malformed())?;

    if !identifier.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    // Only what the encoder writes: an optional leading minus, then digits.
    let magnitude = direction.strip_prefix('-').unwrap_or(direction);
    if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let identifier: u16 = identifier.parse().map_err(|_| malformed())?;
    let code: i64 = direction.parse().map_err(|_| malformed())?;
    let direction = Direction::from_code(code).ok_or_else(malformed)?;

    Ok(ActuatorCommand::new(identifier, direction))
}

fn pad_field(field: &'static str, value: i64, width: usize) -> Result<String> {
    let rendered = format!("{value:0width$}");
    if rendered.len() > width {
        return Err(FrameError::FieldOverflow {
            field,
            value: value.to_string(),
            width,
        });
    }
    Ok(rendered)
}
