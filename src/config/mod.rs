//! Configuration management for cat-sync
//!
//! Handles loading, validating and hot-reloading the YAML configuration.
//! Every section is optional; a missing file runs on built-in defaults.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::engine::{Direction, Intent};
use crate::error::CatError;
use crate::state::ParamId;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cat: CatConfig,
    #[serde(default)]
    pub parameters: ParametersConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// CAT server connection settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CatConfig {
    #[serde(default = "default_cat_host")]
    pub host: String,
    #[serde(default = "default_cat_port")]
    pub port: u16,
    /// Fixed delay before every reconnect attempt (no backoff)
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

impl CatConfig {
    /// `host:port` string for the socket
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for CatConfig {
    fn default() -> Self {
        Self {
            host: default_cat_host(),
            port: default_cat_port(),
            reconnect_delay_ms: default_reconnect_delay(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

/// Start-up values and step sizes for every parameter
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParametersConfig {
    #[serde(default = "default_frequency")]
    pub frequency: FrequencySettings,
    #[serde(default = "default_if_shift")]
    pub if_shift: ParamSettings,
    #[serde(default = "default_level")]
    pub level: ParamSettings,
}

impl ParametersConfig {
    /// Value a parameter holds before the first device report, and after a reset
    pub fn default_for(&self, id: ParamId) -> i64 {
        match id {
            ParamId::Frequency => self.frequency.default,
            ParamId::IfShift => self.if_shift.default,
            ParamId::Level => self.level.default,
        }
    }

    /// Configured step size (coarse step for frequency)
    pub fn step_for(&self, id: ParamId) -> i64 {
        match id {
            ParamId::Frequency => self.frequency.step,
            ParamId::IfShift => self.if_shift.step,
            ParamId::Level => self.level.step,
        }
    }
}

impl Default for ParametersConfig {
    fn default() -> Self {
        Self {
            frequency: default_frequency(),
            if_shift: default_if_shift(),
            level: default_level(),
        }
    }
}

/// Frequency settings: default in Hz and the two toggleable step sizes
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FrequencySettings {
    pub default: i64,
    pub step: i64,
    pub fine_step: i64,
}

/// Default value and step of a bounded parameter
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParamSettings {
    pub default: i64,
    pub step: i64,
}

/// Key binding configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InputConfig {
    /// How recently both modifiers must have been pressed for a combo to count
    #[serde(default = "default_modifier_window")]
    pub modifier_window_ms: u64,
    #[serde(default = "default_bindings")]
    pub bindings: Vec<KeyBinding>,
}

impl InputConfig {
    pub fn modifier_window(&self) -> Duration {
        Duration::from_millis(self.modifier_window_ms)
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            modifier_window_ms: default_modifier_window(),
            bindings: default_bindings(),
        }
    }
}

/// Modifier combination required by a binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifiers {
    #[default]
    None,
    CtrlAlt,
}

/// Maps one or more key names to an intent
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KeyBinding {
    pub keys: Vec<String>,
    #[serde(default)]
    pub modifiers: Modifiers,
    pub action: Intent,
}

impl KeyBinding {
    fn new(keys: &[&str], modifiers: Modifiers, action: Intent) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            modifiers,
            action,
        }
    }

    /// Case-insensitive key match
    pub fn matches_key(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k.eq_ignore_ascii_case(key))
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for a daily-rolling log file, in addition to the console
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: default_log_prefix(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Failed to load config: {}", path))?;

        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.cat.host.is_empty() {
            anyhow::bail!(CatError::Config("cat.host cannot be empty".into()));
        }
        if self.cat.port == 0 {
            anyhow::bail!(CatError::Config("cat.port cannot be 0".into()));
        }
        if self.cat.reconnect_delay_ms == 0 {
            anyhow::bail!(CatError::Config(
                "cat.reconnect_delay_ms must be greater than 0".into()
            ));
        }
        if self.cat.connect_timeout_ms == 0 {
            anyhow::bail!(CatError::Config(
                "cat.connect_timeout_ms must be greater than 0".into()
            ));
        }

        for id in ParamId::ALL {
            let (min, max) = id.range();
            let default = self.parameters.default_for(id);
            if default < min || default > max {
                anyhow::bail!(CatError::Config(format!(
                    "Default {} for '{}' is outside its range [{}, {}]",
                    default,
                    id,
                    min,
                    max
                )));
            }
            let step = self.parameters.step_for(id);
            if step <= 0 {
                anyhow::bail!(CatError::Config(format!(
                    "Step for '{}' must be positive (got {})",
                    id, step
                )));
            }
        }
        if self.parameters.frequency.fine_step <= 0 {
            anyhow::bail!(CatError::Config(format!(
                "frequency.fine_step must be positive (got {})",
                self.parameters.frequency.fine_step
            )));
        }

        self.input.validate()
    }
}

impl InputConfig {
    /// Validate bindings (also used when only bindings are hot-reloaded)
    pub fn validate(&self) -> Result<()> {
        if self.modifier_window_ms == 0 {
            anyhow::bail!(CatError::Config(
                "input.modifier_window_ms must be greater than 0".into()
            ));
        }

        for (idx, binding) in self.bindings.iter().enumerate() {
            if binding.keys.is_empty() {
                anyhow::bail!(CatError::Config(format!(
                    "Binding {} ({}) has no keys",
                    idx, binding.action
                )));
            }
            if binding.keys.iter().any(|k| k.trim().is_empty()) {
                anyhow::bail!(CatError::Config(format!(
                    "Binding {} ({}) has an empty key name",
                    idx, binding.action
                )));
            }
        }

        Ok(())
    }
}

/// Key layout of the original knob box: Ctrl+Alt combos for the three
/// encoders, plain function keys for mute, band and PTT.
pub fn default_bindings() -> Vec<KeyBinding> {
    use Modifiers::{CtrlAlt, None as Plain};

    let step = |param, direction| Intent::Step { param, direction };

    vec![
        KeyBinding::new(&["UP", "UP ARROW"], CtrlAlt, step(ParamId::Frequency, Direction::Up)),
        KeyBinding::new(
            &["DOWN", "DOWN ARROW"],
            CtrlAlt,
            step(ParamId::Frequency, Direction::Down),
        ),
        KeyBinding::new(&["F1"], CtrlAlt, Intent::ToggleFrequencyStep),
        KeyBinding::new(&["PAGE UP"], CtrlAlt, step(ParamId::IfShift, Direction::Up)),
        KeyBinding::new(&["PAGE DOWN"], CtrlAlt, step(ParamId::IfShift, Direction::Down)),
        KeyBinding::new(&["F2"], CtrlAlt, Intent::Reset { param: ParamId::IfShift }),
        KeyBinding::new(&["HOME"], CtrlAlt, step(ParamId::Level, Direction::Up)),
        KeyBinding::new(&["END"], CtrlAlt, step(ParamId::Level, Direction::Down)),
        KeyBinding::new(&["F3"], CtrlAlt, Intent::ToggleMute),
        KeyBinding::new(&["F16"], Plain, Intent::ToggleMute),
        KeyBinding::new(&["F22"], Plain, Intent::BandDown),
        KeyBinding::new(&["F23"], Plain, Intent::BandUp),
        KeyBinding::new(&["F21", "F24"], Plain, Intent::TogglePtt),
    ]
}

// Default value functions
fn default_cat_host() -> String { "127.0.0.1".to_string() }
fn default_cat_port() -> u16 { 13013 }
fn default_reconnect_delay() -> u64 { 3000 }
fn default_connect_timeout() -> u64 { 5000 }
fn default_frequency() -> FrequencySettings {
    FrequencySettings { default: 14_200_000, step: 1000, fine_step: 100 }
}
fn default_if_shift() -> ParamSettings { ParamSettings { default: 3000, step: 100 } }
fn default_level() -> ParamSettings { ParamSettings { default: 50, step: 5 } }
fn default_modifier_window() -> u64 { 200 }
fn default_log_prefix() -> String { "cat-sync.log".to_string() }
