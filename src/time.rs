//! Conversion between native track clocks and the 100 ns reference unit.
//!
//! All slice durations and timestamps are carried in reference units; box fields are
//! written in the clock of the box that holds them. Conversions multiply before dividing
//! in 128-bit arithmetic and round to the nearest unit, so a native value survives a
//! round trip through reference units exactly for any clock up to 10 MHz.

use crate::errors::{DomainError, MediaRecodeResult};
use serde::Serialize;
use std::fmt;

/// Reference clock: 10 MHz, one tick per 100 ns.
pub const REFERENCE_TIMESCALE: u32 = 10_000_000;

fn scale(value: u128, from: u128, to: u128) -> u128 {
    if from == 0 {
        return 0;
    }
    (value * to + from / 2) / from
}

/// Convert reference units into ticks of `rate`.
pub fn to_scale(rate: u32, value: u64) -> u64 {
    let scaled = scale(value as u128, REFERENCE_TIMESCALE as u128, rate as u128);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Convert ticks of `rate` into reference units.
pub fn from_scale(rate: u32, value: u64) -> u64 {
    let scaled = scale(value as u128, rate as u128, REFERENCE_TIMESCALE as u128);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Signed variant of [`to_scale`], used for composition offsets.
pub fn to_scale_signed(rate: u32, value: i64) -> i64 {
    let magnitude = to_scale(rate, value.unsigned_abs()).min(i64::MAX as u64) as i64;
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Signed variant of [`from_scale`].
pub fn from_scale_signed(rate: u32, value: i64) -> i64 {
    let magnitude = from_scale(rate, value.unsigned_abs()).min(i64::MAX as u64) as i64;
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Duration in native ticks of the interval `[start, start + duration)` given in
/// reference units. Summing these over consecutive intervals never drifts from
/// `to_scale(rate, total)`.
pub fn interval_to_scale(rate: u32, start: u64, duration: u64) -> u64 {
    to_scale(rate, start.saturating_add(duration)) - to_scale(rate, start)
}

/// The two track clocks a destination can be retimed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClockRate {
    /// 90 kHz MPEG system clock
    Mpeg,
    /// 120 kHz clock, exact for 24/30/60/120 fps content
    HighFrameRate,
}

impl ClockRate {
    pub fn hz(self) -> u32 {
        match self {
            ClockRate::Mpeg => 90_000,
            ClockRate::HighFrameRate => 120_000,
        }
    }
}

impl TryFrom<u32> for ClockRate {
    type Error = DomainError;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        match hz {
            90_000 => Ok(ClockRate::Mpeg),
            120_000 => Ok(ClockRate::HighFrameRate),
            other => Err(DomainError::new(format!(
                "unsupported clock rate {} (expected 90000 or 120000)",
                other
            ))),
        }
    }
}

impl fmt::Display for ClockRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.hz())
    }
}

/// Per-track clock selector. Once a rate is chosen it cannot be changed.
#[derive(Debug, Clone, Default)]
pub struct TrackClock {
    selected: Option<ClockRate>,
}

impl TrackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the clock for this track. Selecting the same rate again is a no-op;
    /// selecting a different one is an error.
    pub fn select(&mut self, rate: ClockRate) -> MediaRecodeResult<()> {
        match self.selected {
            Some(current) if current != rate => Err(DomainError::new(format!(
                "track clock already set to {}, cannot switch to {}",
                current, rate
            ))
            .into()),
            _ => {
                self.selected = Some(rate);
                Ok(())
            }
        }
    }

    pub fn selected(&self) -> Option<ClockRate> {
        self.selected
    }

    /// Selected rate in Hz, or `native` when no clock was chosen.
    pub fn rate_or(&self, native: u32) -> u32 {
        self.selected.map(ClockRate::hz).unwrap_or(native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_scale_rounds_to_nearest() {
        // 1/3 s at 90 kHz
        assert_eq!(to_scale(90_000, 3_333_333), 30_000);
        assert_eq!(to_scale(1_000, 5_000), 1);
        assert_eq!(to_scale(1_000, 4_999), 0);
        assert_eq!(from_scale(48_000, 1_024), 213_333);
    }

    #[test]
    fn test_wide_intermediates() {
        // 24 hours at 120 kHz does not overflow
        let day = 24 * 3600 * REFERENCE_TIMESCALE as u64;
        assert_eq!(to_scale(120_000, day), 24 * 3600 * 120_000);
        assert_eq!(from_scale(120_000, 24 * 3600 * 120_000), day);
    }

    #[test]
    fn test_signed_conversion() {
        assert_eq!(to_scale_signed(90_000, -3_333_333), -30_000);
        assert_eq!(from_scale_signed(90_000, -30_000), -3_333_333);
    }

    #[test]
    fn test_interval_sum_matches_total() {
        let mut start = 0u64;
        let mut native = 0u64;
        for _ in 0..1000 {
            native += interval_to_scale(90_000, start, 417_083);
            start += 417_083;
        }
        assert_eq!(native, to_scale(90_000, start));
    }

    #[test]
    fn test_clock_select_once() {
        let mut clock = TrackClock::new();
        assert_eq!(clock.rate_or(25), 25);
        clock.select(ClockRate::Mpeg).unwrap();
        clock.select(ClockRate::Mpeg).unwrap();
        assert!(clock.select(ClockRate::HighFrameRate).is_err());
        assert_eq!(clock.rate_or(25), 90_000);
    }

    #[test]
    fn test_clock_rate_from_hz() {
        assert_eq!(ClockRate::try_from(120_000).unwrap(), ClockRate::HighFrameRate);
        assert!(ClockRate::try_from(48_000).is_err());
    }

    proptest! {
        #[test]
        fn prop_native_round_trip(x in 0u64..(10 * 3600 * 120_000), hf in any::<bool>()) {
            let rate = if hf { 120_000 } else { 90_000 };
            prop_assert_eq!(to_scale(rate, from_scale(rate, x)), x);
        }

        #[test]
        fn prop_reference_round_trip_within_one_tick(x in 0u64..(10 * 3600 * 10_000_000u64), hf in any::<bool>()) {
            let rate = if hf { 120_000 } else { 90_000 };
            let back = from_scale(rate, to_scale(rate, x));
            let tick = (REFERENCE_TIMESCALE / rate) as u64 + 1;
            prop_assert!(back.abs_diff(x) <= tick);
        }
    }
}
