//! Standing desk height control over serial lines and MQTT.
//!
//! liftdesk drives a two-legged desk: one actuator board moves both legs and
//! each leg reports its height through its own distance sensor.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte channels (serial ports, in-memory test channels)
//! - [`frame`]: Sensor and actuator wire formats
//! - [`control`]: Leg and desk motion control
//! - [`config`]: TOML service configuration

pub mod config;

/// Re-export transport types.
pub mod transport {
    pub use liftdesk_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use liftdesk_frame::*;
}

/// Re-export control types.
pub mod control {
    pub use liftdesk_control::*;
}
