//! Outbound CAT command vocabulary

use std::fmt;

use super::codec::{encode, encode_read};

/// A command the client can send to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatCommand {
    /// Ask the device to report the current value for a tag (`FA;`)
    Read { tag: &'static str },
    /// Set an absolute value (`FA00014200000;`)
    Write {
        tag: &'static str,
        value: i64,
        width: usize,
    },
    /// Mute on/off (`ZZMA1;` / `ZZMA0;`)
    Mute(bool),
    /// Band down (`BD;`)
    BandDown,
    /// Band up (`BU;`)
    BandUp,
    /// Transmit (`TX;`)
    Transmit,
    /// Receive (`RX;`)
    Receive,
}

impl CatCommand {
    /// Render the exact text sent on the wire
    pub fn to_wire(&self) -> String {
        match self {
            CatCommand::Read { tag } => encode_read(tag),
            CatCommand::Write { tag, value, width } => encode(tag, *value, *width),
            CatCommand::Mute(on) => encode("ZZMA", i64::from(*on), 1),
            CatCommand::BandDown => encode_read("BD"),
            CatCommand::BandUp => encode_read("BU"),
            CatCommand::Transmit => encode_read("TX"),
            CatCommand::Receive => encode_read("RX"),
        }
    }
}

impl fmt::Display for CatCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}
