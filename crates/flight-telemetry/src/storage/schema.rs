//! `SQLite` schema definitions for the telemetry store.

/// SQL statement to create the telemetry table.
pub const CREATE_TELEMETRY_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS telemetry (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flight_id TEXT NOT NULL,
    flight_name TEXT NOT NULL,
    altitude REAL NOT NULL,
    speed REAL NOT NULL,
    temperature REAL NOT NULL,
    timestamp TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
";

/// SQL statement to create an index on `flight_id`.
pub const CREATE_FLIGHT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_telemetry_flight_id ON telemetry(flight_id)
";

/// SQL statement to create an index on timestamp for fleet-wide range queries.
pub const CREATE_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_telemetry_timestamp ON telemetry(timestamp)
";

/// SQL statement to create the composite index serving per-flight history.
pub const CREATE_FLIGHT_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_telemetry_flight_timestamp
    ON telemetry(flight_id, timestamp DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_TELEMETRY_TABLE,
    CREATE_FLIGHT_INDEX,
    CREATE_TIMESTAMP_INDEX,
    CREATE_FLIGHT_TIMESTAMP_INDEX,
    CREATE_METADATA_TABLE,
];
