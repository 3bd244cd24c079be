//! Gesture lines understood by the simulator.
//!
//! One gesture per line, either a single-character shortcut:
//!
//! | line | gesture |
//! |---|---|
//! | `l` / `L` | left dial +1 / -1 |
//! | `r` / `R` | right dial +1 / -1 |
//! | `p` / `P` | press / long press |
//! | `s` | print the state snapshot |
//! | `0` | reset to defaults |
//! | `q` | quit |
//!
//! or a JSON object tagged by `gesture`, e.g.
//! `{"gesture":"rotateRight","direction":-1}` or
//! `{"gesture":"press","pressType":"longPress"}`.
//! Blank lines and lines starting with `#` are skipped.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::PressType;
use crate::dial::ModeDial;

/// One input event for the dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gesture", rename_all = "camelCase")]
pub enum Gesture {
    RotateLeft {
        #[serde(default = "one")]
        direction: i32,
    },
    RotateRight {
        #[serde(default = "one")]
        direction: i32,
    },
    #[serde(rename_all = "camelCase")]
    Press {
        #[serde(default)]
        press_type: PressType,
    },
    State,
    Reset,
    Quit,
}

fn one() -> i32 {
    1
}

/// Error for a line that is neither a shortcut nor a gesture object.
#[derive(Debug, thiserror::Error)]
pub enum GestureError {
    #[error("unknown gesture '{0}'")]
    Unknown(String),
    #[error("invalid gesture object: {0}")]
    Json(#[from] serde_json::Error),
}

impl FromStr for Gesture {
    type Err = GestureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('{') {
            return Ok(serde_json::from_str(s)?);
        }
        Ok(match s {
            "l" => Gesture::RotateLeft { direction: 1 },
            "L" => Gesture::RotateLeft { direction: -1 },
            "r" => Gesture::RotateRight { direction: 1 },
            "R" => Gesture::RotateRight { direction: -1 },
            "p" => Gesture::Press {
                press_type: PressType::Press,
            },
            "P" => Gesture::Press {
                press_type: PressType::LongPress,
            },
            "s" => Gesture::State,
            "0" => Gesture::Reset,
            "q" => Gesture::Quit,
            other => return Err(GestureError::Unknown(other.to_string())),
        })
    }
}

/// Parse one input line. `None` for blank lines and `#` comments.
pub fn parse_line(line: &str) -> Option<Result<Gesture, GestureError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line.parse())
}

impl Gesture {
    /// Feed the gesture to `dial`. `State` and `Quit` are left to the caller.
    pub fn apply(self, dial: &mut ModeDial) {
        match self {
            Gesture::RotateLeft { direction } => dial.rotate_left_dial(direction),
            Gesture::RotateRight { direction } => dial.rotate_right_dial(direction),
            Gesture::Press { press_type } => dial.press_right_dial(press_type),
            Gesture::Reset => dial.reset_to_defaults(),
            Gesture::State | Gesture::Quit => {}
        }
    }
}
