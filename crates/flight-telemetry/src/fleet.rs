//! The simulated fleet.
//!
//! A fleet is built once at startup and never changes afterwards; the
//! scheduler walks it in the same order on every cycle.

use serde::{Deserialize, Serialize};

/// Number of flights in the default fleet.
pub const DEFAULT_FLEET_SIZE: usize = 50;

/// First numeric suffix used for generated flight ids (`FL100`, `FL101`, ...).
const FIRST_FLIGHT_NUMBER: usize = 100;

/// Identity of a single simulated flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlightIdentity {
    /// Short stable identifier, e.g. `FL100`.
    pub flight_id: String,
    /// Display name, e.g. `Airbus-1`.
    pub flight_name: String,
}

impl FlightIdentity {
    /// Create a new flight identity.
    #[must_use]
    pub fn new(flight_id: impl Into<String>, flight_name: impl Into<String>) -> Self {
        Self {
            flight_id: flight_id.into(),
            flight_name: flight_name.into(),
        }
    }
}

/// A fixed, ordered set of flights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fleet {
    flights: Vec<FlightIdentity>,
}

impl Fleet {
    /// Create a fleet from an explicit list of identities.
    #[must_use]
    pub fn new(flights: Vec<FlightIdentity>) -> Self {
        Self { flights }
    }

    /// Generate a fleet of `size` flights named `FL100`/`Airbus-1` onwards.
    #[must_use]
    pub fn generate(size: usize) -> Self {
        let flights = (0..size)
            .map(|i| {
                FlightIdentity::new(
                    format!("FL{}", FIRST_FLIGHT_NUMBER + i),
                    format!("Airbus-{}", i + 1),
                )
            })
            .collect();
        Self { flights }
    }

    /// Iterate the fleet in its fixed enumeration order.
    pub fn iter(&self) -> std::slice::Iter<'_, FlightIdentity> {
        self.flights.iter()
    }

    /// Look up a flight by id.
    #[must_use]
    pub fn get(&self, flight_id: &str) -> Option<&FlightIdentity> {
        self.flights.iter().find(|f| f.flight_id == flight_id)
    }

    /// Number of flights in the fleet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    /// Check if the fleet has no flights.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

impl Default for Fleet {
    fn default() -> Self {
        Self::generate(DEFAULT_FLEET_SIZE)
    }
}

impl<'a> IntoIterator for &'a Fleet {
    type Item = &'a FlightIdentity;
    type IntoIter = std::slice::Iter<'a, FlightIdentity>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
