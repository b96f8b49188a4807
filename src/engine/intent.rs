//! Local intents produced by the input layer

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::ParamId;

/// Direction of a relative step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Sign applied to the step size
    pub fn signum(self) -> i64 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

/// Something the operator asked for
///
/// Relative steps are resolved against a fresh device read. Everything
/// else is absolute or fire-and-forget and goes out immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Move a parameter one step up or down
    Step { param: ParamId, direction: Direction },
    /// Jump a parameter back to its default value
    Reset { param: ParamId },
    /// Swap the frequency step between the coarse and fine sizes
    ToggleFrequencyStep,
    /// Flip mute
    ToggleMute,
    /// Flip transmit/receive
    TogglePtt,
    BandUp,
    BandDown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Step { param, direction } => {
                let arrow = match direction {
                    Direction::Up => "up",
                    Direction::Down => "down",
                };
                write!(f, "{param} {arrow}")
            }
            Intent::Reset { param } => write!(f, "{param} reset"),
            Intent::ToggleFrequencyStep => write!(f, "toggle frequency step"),
            Intent::ToggleMute => write!(f, "toggle mute"),
            Intent::TogglePtt => write!(f, "toggle PTT"),
            Intent::BandUp => write!(f, "band up"),
            Intent::BandDown => write!(f, "band down"),
        }
    }
}
