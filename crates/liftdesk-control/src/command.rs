use std::fmt;
use std::str::FromStr;

use liftdesk_frame::Direction;

use crate::error::DeskError;

/// A parsed remote command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Drive every leg to its mechanical limit (`"up"` / `"down"`).
    Travel(Direction),
    /// Move both legs to an overall height (a string of decimal digits).
    Height(u32),
}

impl Command {
    /// Parse a raw pub/sub payload. Payloads must be ASCII.
    pub fn from_payload(payload: &[u8]) -> Result<Self, DeskError> {
        match std::str::from_utf8(payload) {
            Ok(text) if text.is_ascii() => text.parse(),
            _ => Err(DeskError::InvalidCommand(
                String::from_utf8_lossy(payload).into_owned(),
            )),
        }
    }
}

impl FromStr for Command {
    type Err = DeskError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "up" => Ok(Command::Travel(Direction::Up)),
            "down" => Ok(Command::Travel(Direction::Down)),
            digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => digits
                .parse()
                .map(Command::Height)
                .map_err(|_| DeskError::InvalidCommand(text.to_string())),
            _ => Err(DeskError::InvalidCommand(text.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Travel(direction) => write!(f, "{direction}"),
            Command::Height(height) => write!(f, "{height}"),
        }
    }
}
