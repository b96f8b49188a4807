//! Key mapper - key transitions to intents
//!
//! Tracks which keys are held and when each modifier went down. A Ctrl+Alt
//! binding only fires if a CTRL and an ALT key were both pressed within the
//! modifier window and are still held; global keyboard hooks report
//! modifiers unreliably, so stale modifier presses must not count.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{KeyEvent, KeyState};
use crate::config::{InputConfig, KeyBinding, Modifiers};
use crate::engine::Intent;

const CTRL_KEYS: [&str; 2] = ["LEFT CTRL", "RIGHT CTRL"];
const ALT_KEYS: [&str; 2] = ["LEFT ALT", "RIGHT ALT"];

/// Sequential key → intent mapper
#[derive(Debug)]
pub struct KeyMapper {
    bindings: Vec<KeyBinding>,
    window: Duration,
    /// Currently held keys (upper-cased)
    pressed: BTreeSet<String>,
    /// Press time of each held modifier
    modifiers: HashMap<String, Instant>,
    /// Keys whose latched binding already fired and wait for release
    latched: HashSet<String>,
    last_combo: String,
}

impl KeyMapper {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            bindings: config.bindings.clone(),
            window: config.modifier_window(),
            pressed: BTreeSet::new(),
            modifiers: HashMap::new(),
            latched: HashSet::new(),
            last_combo: String::new(),
        }
    }

    /// Swap in reloaded bindings; held keys and modifiers are kept
    pub fn update_bindings(&mut self, config: &InputConfig) {
        self.bindings = config.bindings.clone();
        self.window = config.modifier_window();
        self.latched.clear();
    }

    /// Whether a CTRL and an ALT key were both pressed recently and are held
    pub fn ctrl_alt_active(&self, now: Instant) -> bool {
        self.recent(&CTRL_KEYS, now) && self.recent(&ALT_KEYS, now)
    }

    fn recent(&self, keys: &[&str], now: Instant) -> bool {
        keys.iter()
            .filter_map(|k| self.modifiers.get(*k))
            .any(|pressed_at| now.saturating_duration_since(*pressed_at) < self.window)
    }

    /// Bindings that latch: fire once per press, re-arm on release
    fn is_latched_action(intent: &Intent) -> bool {
        matches!(intent, Intent::ToggleFrequencyStep)
    }

    /// Feed one key transition, returning the intents it triggers
    pub fn handle(&mut self, event: &KeyEvent, now: Instant) -> Vec<Intent> {
        let key = event.key.trim().to_ascii_uppercase();
        let is_modifier = CTRL_KEYS.contains(&key.as_str()) || ALT_KEYS.contains(&key.as_str());

        match event.state {
            KeyState::Down => {
                self.pressed.insert(key.clone());
                if is_modifier {
                    // Auto-repeat refreshes the press time
                    self.modifiers.insert(key.clone(), now);
                }
            }
            KeyState::Up => {
                self.pressed.remove(&key);
                self.modifiers.remove(&key);
                self.latched.remove(&key);
            }
        }

        let combo = self
            .pressed
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" + ");
        if combo != self.last_combo {
            debug!(
                "⎆ Combo: {}",
                if combo.is_empty() { "(none)" } else { combo.as_str() }
            );
            self.last_combo = combo;
        }

        if event.state != KeyState::Down {
            return Vec::new();
        }

        let ctrl_alt = self.ctrl_alt_active(now);
        let mut intents = Vec::new();

        for binding in &self.bindings {
            if !binding.matches_key(&key) {
                continue;
            }
            if binding.modifiers == Modifiers::CtrlAlt && !ctrl_alt {
                continue;
            }
            if Self::is_latched_action(&binding.action) {
                if self.latched.contains(&key) {
                    continue;
                }
                self.latched.insert(key.clone());
            }
            intents.push(binding.action);
        }

        intents
    }
}
