//! Parameter state - last-known device values
//!
//! Each parameter keeps the value last reported by the device, its valid
//! range, and at most one pending relative delta. The registry owns all of
//! them and is itself owned by the reconciliation engine.

mod parameter;
mod registry;

pub use parameter::{ParamId, Parameter};
pub use registry::ParameterRegistry;
