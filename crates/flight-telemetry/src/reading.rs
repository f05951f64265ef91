//! Telemetry reading types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One synthetic sensor reading for one flight.
///
/// Readings are immutable once created. The store and the latest-value cache
/// each keep their own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Identifier of the flight that produced this reading.
    pub flight_id: String,

    /// Display name of the flight.
    pub flight_name: String,

    /// Altitude in meters.
    pub altitude: f64,

    /// Ground speed in km/h.
    pub speed: f64,

    /// Outside air temperature in degrees Celsius.
    pub temperature: f64,

    /// When the reading was taken (UTC, microsecond resolution).
    pub timestamp: DateTime<Utc>,
}

/// A reading as it appears in a flight's history listing.
///
/// Same as [`Reading`] without the display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Identifier of the flight.
    pub flight_id: String,
    /// Altitude in meters.
    pub altitude: f64,
    /// Ground speed in km/h.
    pub speed: f64,
    /// Outside air temperature in degrees Celsius.
    pub temperature: f64,
    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
}

impl From<&Reading> for HistoryPoint {
    fn from(reading: &Reading) -> Self {
        Self {
            flight_id: reading.flight_id.clone(),
            altitude: reading.altitude,
            speed: reading.speed,
            temperature: reading.temperature,
            timestamp: reading.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Reading {
        Reading {
            flight_id: "FL100".to_string(),
            flight_name: "Airbus-1".to_string(),
            altitude: 10_500.25,
            speed: 812.5,
            temperature: -41.75,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_reading_json_shape() {
        let value = serde_json::to_value(sample()).unwrap();

        assert_eq!(value["flight_id"], "FL100");
        assert_eq!(value["flight_name"], "Airbus-1");
        assert_eq!(value["altitude"], 10_500.25);
        assert_eq!(value["timestamp"], "2026-03-01T12:00:00Z");
    }

    #[test]
    fn test_history_point_drops_name() {
        let point = HistoryPoint::from(&sample());
        let value = serde_json::to_value(&point).unwrap();

        assert_eq!(point.flight_id, "FL100");
        assert_eq!(point.temperature, -41.75);
        assert!(value.get("flight_name").is_none());
        assert_eq!(value["timestamp"], "2026-03-01T12:00:00Z");
    }
}
