//! A single device-controlled parameter
//!
//! Holds the last authoritative value reported by the device, its valid
//! range and an optional pending relative adjustment.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cat::CatCommand;

/// Identifier of a tracked parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamId {
    /// VFO A frequency in Hz (`FA`)
    Frequency,
    /// IF shift (`ZZIS`)
    IfShift,
    /// Level (`ZZLA`)
    Level,
}

impl ParamId {
    /// All tracked parameters in resync order
    pub const ALL: [ParamId; 3] = [ParamId::Frequency, ParamId::IfShift, ParamId::Level];

    /// Wire tag for this parameter
    pub fn tag(self) -> &'static str {
        match self {
            ParamId::Frequency => "FA",
            ParamId::IfShift => "ZZIS",
            ParamId::Level => "ZZLA",
        }
    }

    /// Payload width in digits
    pub fn width(self) -> usize {
        match self {
            ParamId::Frequency => 11,
            ParamId::IfShift => 5,
            ParamId::Level => 3,
        }
    }

    /// Inclusive valid range
    pub fn range(self) -> (i64, i64) {
        match self {
            ParamId::Frequency => (0, 99_999_999_999),
            ParamId::IfShift => (100, 10_000),
            ParamId::Level => (0, 100),
        }
    }

    /// Resolve a wire tag to a parameter
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.tag() == tag)
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamId::Frequency => write!(f, "frequency"),
            ParamId::IfShift => write!(f, "if_shift"),
            ParamId::Level => write!(f, "level"),
        }
    }
}

/// Last-known state of one parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    id: ParamId,
    current: i64,
    default: i64,
    min: i64,
    max: i64,
    pending: i64,
}

impl Parameter {
    /// Create a parameter holding `default` until the device reports otherwise
    pub fn new(id: ParamId, default: i64) -> Self {
        let (min, max) = id.range();
        Self {
            id,
            current: default,
            default,
            min,
            max,
            pending: 0,
        }
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn pending(&self) -> i64 {
        self.pending
    }

    pub fn range(&self) -> (i64, i64) {
        (self.min, self.max)
    }

    /// Clamp a value into this parameter's range
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min, self.max)
    }

    /// Store a value reported by the device
    ///
    /// Accepted as-is, even outside the range: the device is the source of truth.
    pub fn apply_authoritative(&mut self, value: i64) {
        self.current = value;
    }

    /// Queue a relative adjustment, replacing any unresolved one
    pub fn queue_delta(&mut self, delta: i64) {
        self.pending = delta;
    }

    /// Apply the pending delta to the current value
    ///
    /// Returns the clamped result, even when clamping leaves the value
    /// unchanged, so the caller still writes it back. Returns `None` when
    /// nothing was pending.
    pub fn resolve(&mut self) -> Option<i64> {
        if self.pending == 0 {
            return None;
        }
        let next = self.clamp(self.current.saturating_add(self.pending));
        self.pending = 0;
        self.current = next;
        Some(next)
    }

    /// Jump to the default value
    ///
    /// A pending delta is kept; the reply to its read-request still applies it.
    pub fn reset_to_default(&mut self) -> i64 {
        self.current = self.clamp(self.default);
        self.current
    }

    /// Value the pending delta would produce against the cached value
    pub fn predicted(&self) -> i64 {
        self.clamp(self.current.saturating_add(self.pending))
    }

    /// Bare read-request for this parameter
    pub fn read_request(&self) -> CatCommand {
        CatCommand::Read { tag: self.id.tag() }
    }

    /// Absolute write of `value` in this parameter's wire format
    pub fn write_command(&self, value: i64) -> CatCommand {
        CatCommand::Write {
            tag: self.id.tag(),
            value,
            width: self.id.width(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_resolve_applies_delta() {
        let mut p = Parameter::new(ParamId::IfShift, 3000);
        p.queue_delta(100);
        assert_eq!(p.resolve(), Some(3100));
        assert_eq!(p.current(), 3100);
        assert_eq!(p.pending(), 0);
    }

    #[test]
    fn test_second_delta_overwrites_first() {
        let mut p = Parameter::new(ParamId::IfShift, 3000);
        p.queue_delta(100);
        p.queue_delta(-100);
        assert_eq!(p.resolve(), Some(2900));
    }

    #[test]
    fn test_resolve_without_pending_is_noop() {
        let mut p = Parameter::new(ParamId::Level, 50);
        assert_eq!(p.resolve(), None);
        assert_eq!(p.current(), 50);
    }

    #[test]
    fn test_resolve_at_boundary_still_returns_value() {
        let mut p = Parameter::new(ParamId::IfShift, 3000);
        p.apply_authoritative(10_000);
        p.queue_delta(100);
        assert_eq!(p.resolve(), Some(10_000));
    }

    #[test]
    fn test_authoritative_out_of_range_is_accepted() {
        let mut p = Parameter::new(ParamId::Level, 50);
        p.apply_authoritative(250);
        assert_eq!(p.current(), 250);
        p.queue_delta(-5);
        assert_eq!(p.resolve(), Some(100));
    }

    #[test]
    fn test_reset_to_default() {
        let mut p = Parameter::new(ParamId::IfShift, 3000);
        p.apply_authoritative(700);
        p.queue_delta(100);
        assert_eq!(p.reset_to_default(), 3000);
        assert_eq!(p.current(), 3000);
        assert_eq!(p.pending(), 100);
    }

    #[test]
    fn test_from_tag() {
        assert_eq!(ParamId::from_tag("ZZLA"), Some(ParamId::Level));
        assert_eq!(ParamId::from_tag("ZZMA"), None);
    }

    proptest! {
        #[test]
        fn prop_resolve_is_clamped_sum(c in 0i64..20_000, d in -20_000i64..20_000) {
            prop_assume!(d != 0);
            let mut p = Parameter::new(ParamId::IfShift, 3000);
            p.apply_authoritative(c);
            p.queue_delta(d);
            let (min, max) = ParamId::IfShift.range();
            prop_assert_eq!(p.resolve(), Some(std::cmp::max(min, std::cmp::min(max, c + d))));
        }
    }
}
