//! Byte-channel abstraction for the desk's serial links.
//!
//! Every piece of hardware the desk talks to (the shared actuator board and
//! one distance sensor per leg) is reached through the [`ByteChannel`]
//! capability defined here:
//! - [`SerialChannel`] drives a real serial port
//! - [`MemoryChannel`] is an in-process loopback used by tests and dry runs
//!
//! This is the lowest layer of liftdesk. The frame codecs build on top of it
//! and never see the concrete port type.

pub mod error;
pub mod memory;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryChannel;
pub use serial::{SerialChannel, SerialSettings};
pub use traits::{ByteChannel, ChannelLifecycle};
