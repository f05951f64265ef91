//! Synthetic telemetry generation.
//!
//! Values are drawn uniformly from fixed ranges and rounded to two decimals.
//! The random source is injectable so tests can reproduce a stream.

use std::ops::RangeInclusive;

use chrono::{DateTime, SubsecRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::fleet::FlightIdentity;
use crate::reading::Reading;

/// Altitude range in meters.
pub const ALTITUDE_RANGE_M: RangeInclusive<f64> = 3000.0..=12000.0;

/// Speed range in km/h.
pub const SPEED_RANGE_KMH: RangeInclusive<f64> = 200.0..=900.0;

/// Temperature range in degrees Celsius.
pub const TEMPERATURE_RANGE_C: RangeInclusive<f64> = -60.0..=40.0;

/// Sub-second digits kept on generated timestamps.
const TIMESTAMP_SUBSEC_DIGITS: u16 = 6;

/// Produces one [`Reading`] per call.
pub struct TelemetryGenerator<R = StdRng> {
    rng: R,
}

impl TelemetryGenerator<StdRng> {
    /// Create a generator seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a generator with a fixed seed for a reproducible stream.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for TelemetryGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> TelemetryGenerator<R> {
    /// Create a generator drawing from the given random source.
    pub fn from_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Generate one reading for `flight`, stamped with `now`.
    ///
    /// The timestamp is truncated to microseconds, the resolution the store
    /// keeps, so a persisted copy compares equal to this one.
    pub fn generate(&mut self, flight: &FlightIdentity, now: DateTime<Utc>) -> Reading {
        Reading {
            flight_id: flight.flight_id.clone(),
            flight_name: flight.flight_name.clone(),
            altitude: self.draw(ALTITUDE_RANGE_M),
            speed: self.draw(SPEED_RANGE_KMH),
            temperature: self.draw(TEMPERATURE_RANGE_C),
            timestamp: now.trunc_subsecs(TIMESTAMP_SUBSEC_DIGITS),
        }
    }

    fn draw(&mut self, range: RangeInclusive<f64>) -> f64 {
        round2(self.rng.gen_range(range))
    }
}

impl<R> std::fmt::Debug for TelemetryGenerator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGenerator").finish_non_exhaustive()
    }
}

/// Round to two decimal digits.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
