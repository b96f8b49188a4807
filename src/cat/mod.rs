//! CAT wire protocol
//!
//! The device speaks a Kenwood-style text protocol: every unit is a tag
//! (`FA`, `ZZIS`, ...) followed by an optional fixed-width decimal payload
//! and terminated with `;`. A bare `TAG;` asks the device to report its
//! current value; the reply uses the same format as a write.

pub mod codec;
pub mod command;

pub use codec::{decode, encode, encode_read, Fragment, FragmentBuffer, TERMINATOR};
pub use command::CatCommand;
