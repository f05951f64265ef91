//! `flight-telemetry` - Simulated flight fleet telemetry pipeline
//!
//! A scheduler synthesizes altitude, speed, and temperature readings for a
//! fixed fleet on every tick, appends them to a SQLite time-series store, and
//! refreshes an in-memory latest-value cache once the write has succeeded.
//! [`QueryService`] serves the latest snapshot from the cache and bounded,
//! newest-first history from the store.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fleet;
pub mod generator;
pub mod logging;
pub mod reading;
pub mod scheduler;
pub mod service;
pub mod storage;

pub use cache::LatestCache;
pub use config::Config;
pub use error::{Error, Result, StorageError};
pub use fleet::{Fleet, FlightIdentity};
pub use generator::TelemetryGenerator;
pub use logging::init_logging;
pub use reading::{HistoryPoint, Reading};
pub use scheduler::{CycleOutcome, SchedulerHandle, SchedulerStatus, SimulationScheduler};
pub use service::QueryService;
pub use storage::{SqliteStore, StoreStats, TimeSeriesStore};
