//! Motion control for a two-legged desk.
//!
//! This is the layer that actually moves furniture. A [`LegController`]
//! drives one leg until its distance sensor says it has reached the target;
//! the [`DeskController`] keeps both legs level by moving them together, or
//! not at all.

pub mod command;
pub mod desk;
pub mod error;
pub mod leg;

#[cfg(test)]
pub(crate) mod testing;

pub use command::Command;
pub use desk::{DeskController, DeskOutcome, LegDirection};
pub use error::{DeskError, Result};
pub use leg::{
    keep_moving, required_direction, LegController, LegReport, LegSpec, LegState, MotionConfig,
};
