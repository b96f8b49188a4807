//! cat-sync - keeps a transceiver's CAT state in sync with local key intents
//!
//! Relative adjustments ("IF shift up one step") are never applied to a
//! cached value. The engine asks the device for its current value first and
//! applies the step to the authoritative reply, so changes made from other
//! control surfaces are never overwritten.

pub mod cat;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod input;
pub mod state;

pub use cat::CatCommand;
pub use config::AppConfig;
pub use connection::{CatConnection, ConnectionHandle};
pub use dispatcher::Dispatcher;
pub use engine::{Intent, SyncEngine};
pub use error::CatError;
