//! Connection lifecycle types

use std::fmt;
use std::sync::Arc;

/// Lifecycle state of the CAT link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Connection status reported to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Link is up
    Connected,
    /// Link is down and no retry is scheduled (initial state, or shut down)
    Disconnected,
    /// Link is down, retry `attempt` is scheduled
    Reconnecting { attempt: usize },
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Reconnecting { attempt } => write!(f, "reconnecting (#{})", attempt),
        }
    }
}

/// Type alias for connection status callbacks
pub type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;
