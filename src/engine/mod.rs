//! Reconciliation engine - applies local intents against device state
//!
//! The device is the only source of truth for a parameter's current value.
//! A relative step is therefore never applied to the cached value directly:
//! the engine queues the delta, asks the device for a fresh read, and only
//! when the authoritative reply arrives does it compute, clamp and write the
//! new value.
//!
//! ## Per-parameter cycle
//!
//! ```text
//! Idle ──intent──▶ AwaitingRead ──matching reply──▶ Resolving ──write──▶ Idle
//! ```
//!
//! A second intent while awaiting the read replaces the first delta. A reply
//! with nothing pending only refreshes the cache. The engine performs no I/O:
//! every operation returns the commands to send, in order.

mod intent;

#[cfg(test)]
mod tests;

pub use intent::{Direction, Intent};

use tracing::{debug, info, trace};

use crate::cat::{CatCommand, Fragment};
use crate::config::ParametersConfig;
use crate::state::{ParamId, ParameterRegistry};

/// Reconciliation phase of a single parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPhase {
    /// Nothing pending
    Idle,
    /// Delta queued, waiting for the device to report its value
    AwaitingRead,
}

/// Synchronization engine owning all parameter and toggle state
#[derive(Debug, Clone)]
pub struct SyncEngine {
    registry: ParameterRegistry,
    config: ParametersConfig,
    frequency_step: i64,
    muted: bool,
    transmitting: bool,
}

impl SyncEngine {
    /// Create an engine with start-up values from configuration
    pub fn new(config: &ParametersConfig) -> Self {
        Self {
            registry: ParameterRegistry::new(config),
            config: config.clone(),
            frequency_step: config.frequency.step,
            muted: false,
            transmitting: false,
        }
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    /// Current frequency step size in Hz
    pub fn frequency_step(&self) -> i64 {
        self.frequency_step
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitting
    }

    /// Reconciliation phase of a parameter
    pub fn phase(&self, id: ParamId) -> ParamPhase {
        if self.registry.get(id).pending() == 0 {
            ParamPhase::Idle
        } else {
            ParamPhase::AwaitingRead
        }
    }

    /// Step size for a parameter
    fn step_for(&self, id: ParamId) -> i64 {
        match id {
            ParamId::Frequency => self.frequency_step,
            other => self.config.step_for(other),
        }
    }

    /// Read-requests replayed after every (re)connect
    ///
    /// Pending deltas are kept, so they resolve against the replies.
    pub fn resync_requests(&self) -> Vec<CatCommand> {
        let pending = self.registry.pending();
        if !pending.is_empty() {
            debug!("Resync with pending deltas on: {:?}", pending);
        }
        self.registry.read_requests()
    }

    /// Turn a local intent into outbound commands
    pub fn handle_intent(&mut self, intent: Intent) -> Vec<CatCommand> {
        trace!("Intent: {}", intent);

        match intent {
            Intent::Step { param, direction } => {
                let delta = direction.signum() * self.step_for(param);
                let p = self.registry.get_mut(param);
                p.queue_delta(delta);
                debug!(
                    "{} {:+} queued, predicted: {}",
                    param,
                    delta,
                    p.predicted()
                );
                vec![p.read_request()]
            }

            Intent::Reset { param } => {
                let p = self.registry.get_mut(param);
                let value = p.reset_to_default();
                info!("🎚 {} reset → {}", param, value);
                vec![p.write_command(value)]
            }

            Intent::ToggleFrequencyStep => {
                let (coarse, fine) = (self.config.frequency.step, self.config.frequency.fine_step);
                self.frequency_step = if self.frequency_step == fine { coarse } else { fine };
                info!("🔧 Step size changed to {} Hz", self.frequency_step);
                Vec::new()
            }

            Intent::ToggleMute => {
                self.muted = !self.muted;
                info!("➡️ MUTE {}", if self.muted { "ON" } else { "OFF" });
                vec![CatCommand::Mute(self.muted)]
            }

            Intent::TogglePtt => {
                self.transmitting = !self.transmitting;
                info!("➡️ PTT {}", if self.transmitting { "ON" } else { "OFF" });
                if self.transmitting {
                    vec![CatCommand::Transmit]
                } else {
                    vec![CatCommand::Receive]
                }
            }

            Intent::BandUp => {
                info!("➡️ BAND UP");
                vec![CatCommand::BandUp]
            }

            Intent::BandDown => {
                info!("➡️ BAND DOWN");
                vec![CatCommand::BandDown]
            }
        }
    }

    /// Apply one inbound fragment
    ///
    /// Updates the cached value and, if a delta was pending, returns the
    /// single write that applies it.
    pub fn handle_fragment(&mut self, fragment: &Fragment) -> Option<CatCommand> {
        let Some(id) = self.registry.route(&fragment.tag) else {
            trace!("Ignoring fragment with tag '{}'", fragment.tag);
            return None;
        };

        let Some(value) = fragment.value else {
            trace!("Ignoring {} fragment with payload '{}'", fragment.tag, fragment.raw);
            return None;
        };

        let p = self.registry.get_mut(id);
        p.apply_authoritative(value);

        let write = p.resolve().map(|next| {
            info!("➡️ {} set to {}", id.tag(), next);
            p.write_command(next)
        });

        match id {
            ParamId::Frequency => {
                debug!("🎯 Synced frequency: {} kHz", p.current() as f64 / 1000.0)
            }
            _ => debug!("🎯 Synced {}: {}", id.tag(), p.current()),
        }

        write
    }
}
