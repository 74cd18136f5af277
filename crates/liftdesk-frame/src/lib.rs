//! Wire protocols spoken over the desk's serial channels.
//!
//! Two fixed-size formats live here:
//! - Actuator commands: an identifier field followed by a direction field,
//!   both zero-padded decimal ASCII of configured width, no delimiter
//! - Distance-sensor frames: 9 bytes starting with `0x59 0x59`, followed by
//!   little-endian distance, signal strength and temperature
//!
//! [`SensorReader`] and [`ActuatorWriter`] bind the codecs to a
//! [`ByteChannel`](liftdesk_transport::ByteChannel).

pub mod codec;
pub mod direction;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_actuator_frame, decode_sensor_frame, encode_actuator_frame, ActuatorCommand,
    FieldWidths, SensorFrame, SENSOR_FRAME_SIZE, SENSOR_HEADER,
};
pub use direction::Direction;
pub use error::{FrameError, Result};
pub use reader::{FrameSync, SensorConfig, SensorReader};
pub use writer::ActuatorWriter;
