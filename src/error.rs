//! Library error type
//!
//! Only setup and I/O failures are errors. Malformed fragments, writes while
//! disconnected and out-of-range values are part of normal operation and are
//! handled without surfacing an error.

use std::time::Duration;

/// Errors raised by the CAT client
#[derive(Debug, thiserror::Error)]
pub enum CatError {
    /// Connect attempt did not complete in time
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, CatError>;
