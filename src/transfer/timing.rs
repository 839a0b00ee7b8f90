//! Pacing Model
//!
//! Maps the operator-selected security level to a per-chunk delay so the
//! destination application can keep up and automated input stays
//! inconspicuous. Higher levels trade total transfer time linearly for
//! reliability.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Operator-selected risk/speed trade-off.
///
/// Ordered from fastest (and most likely to outrun the destination) to
/// slowest. The pacing multiplier is monotonically non-decreasing with the
/// level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// 0.25x pacing
    VeryUnsafe,
    /// 0.5x pacing
    Unsafe,
    /// 1x pacing
    #[default]
    Average,
    /// 2x pacing
    Safe,
    /// 4x pacing
    VerySafe,
    /// 8x pacing
    Guaranteed,
}

impl SecurityLevel {
    /// Pacing multiplier in milliseconds per unit sent
    pub fn multiplier(self) -> f64 {
        match self {
            SecurityLevel::VeryUnsafe => 0.25,
            SecurityLevel::Unsafe => 0.5,
            SecurityLevel::Average => 1.0,
            SecurityLevel::Safe => 2.0,
            SecurityLevel::VerySafe => 4.0,
            SecurityLevel::Guaranteed => 8.0,
        }
    }

    /// All levels in ascending order
    pub fn all() -> [SecurityLevel; 6] {
        [
            SecurityLevel::VeryUnsafe,
            SecurityLevel::Unsafe,
            SecurityLevel::Average,
            SecurityLevel::Safe,
            SecurityLevel::VerySafe,
            SecurityLevel::Guaranteed,
        ]
    }
}

/// Computes the paced delay applied after each fragment.
///
/// The delay is `units_sent * multiplier` milliseconds, where a unit is one
/// synthetic input event on the keystroke channel or one byte on the serial
/// channel. A channel may impose a minimum delay floor; the serial channel
/// uses one tick so the off-host link always gets a drain interval.
#[derive(Debug, Clone, Copy)]
pub struct TimingModel {
    multiplier: f64,
    floor: Duration,
}

impl TimingModel {
    /// Create a model for the given security level with no delay floor
    pub fn new(level: SecurityLevel) -> Self {
        Self {
            multiplier: level.multiplier(),
            floor: Duration::ZERO,
        }
    }

    /// Set the minimum per-fragment delay
    pub fn with_floor(mut self, floor: Duration) -> Self {
        self.floor = floor;
        self
    }

    /// Pacing multiplier in effect
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Delay to apply after `units_sent` units were emitted
    pub fn delay(&self, units_sent: u64) -> Duration {
        let millis = units_sent as f64 * self.multiplier;
        Duration::from_secs_f64(millis / 1000.0).max(self.floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplier_values() {
        assert_eq!(SecurityLevel::VeryUnsafe.multiplier(), 0.25);
        assert_eq!(SecurityLevel::Unsafe.multiplier(), 0.5);
        assert_eq!(SecurityLevel::Average.multiplier(), 1.0);
        assert_eq!(SecurityLevel::Safe.multiplier(), 2.0);
        assert_eq!(SecurityLevel::VerySafe.multiplier(), 4.0);
        assert_eq!(SecurityLevel::Guaranteed.multiplier(), 8.0);
    }

    #[test]
    fn test_multiplier_monotonic() {
        let levels = SecurityLevel::all();
        for pair in levels.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].multiplier() <= pair[1].multiplier());
        }
    }

    #[test]
    fn test_delay_monotonic_in_level() {
        let levels = SecurityLevel::all();
        for pair in levels.windows(2) {
            let lo = TimingModel::new(pair[0]).delay(128);
            let hi = TimingModel::new(pair[1]).delay(128);
            assert!(lo <= hi);
        }
    }

    #[test]
    fn test_delay_examples() {
        // 50 units at Safe (2x) -> 100ms; at Guaranteed (8x) -> 400ms
        let safe = TimingModel::new(SecurityLevel::Safe);
        assert_eq!(safe.delay(50), Duration::from_millis(100));

        let guaranteed = TimingModel::new(SecurityLevel::Guaranteed);
        assert_eq!(guaranteed.delay(50), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_floor() {
        let model = TimingModel::new(SecurityLevel::VeryUnsafe).with_floor(Duration::from_millis(1));

        // 1 unit at 0.25x would be 250us; the floor rounds it up
        assert_eq!(model.delay(1), Duration::from_millis(1));
        assert_eq!(model.delay(0), Duration::from_millis(1));

        // Larger sends are unaffected by the floor
        assert_eq!(model.delay(100), Duration::from_millis(25));
    }

    #[test]
    fn test_serde_names() {
        #[derive(serde::Deserialize)]
        struct Wrap {
            v: SecurityLevel,
        }

        let parsed: Wrap = toml::from_str("v = \"very_safe\"").unwrap();
        assert_eq!(parsed.v, SecurityLevel::VerySafe);

        let parsed: Wrap = toml::from_str("v = \"unsafe\"").unwrap();
        assert_eq!(parsed.v, SecurityLevel::Unsafe);
    }
}
