//! Actuator directions and their wire codes.
//!
//! The actuator board reads the direction field as a signed decimal:
//! `1` drives a leg up, `-1` drives it down and `0` stops it.

use std::fmt;

use serde::Serialize;

/// Drive direction for one leg's motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Stop,
    Down,
}

impl Direction {
    /// Signed wire code: +1, 0 or -1.
    pub fn code(self) -> i8 {
        match self {
            Direction::Up => 1,
            Direction::Stop => 0,
            Direction::Down => -1,
        }
    }

    /// Inverse of [`Direction::code`].
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Direction::Up),
            0 => Some(Direction::Stop),
            -1 => Some(Direction::Down),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Stop => "stop",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
