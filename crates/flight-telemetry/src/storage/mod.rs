//! Storage layer for flight-telemetry.
//!
//! This module defines the [`TimeSeriesStore`] contract used by the scheduler
//! and the query layer, and its `SQLite`-backed implementation. Readings are
//! append-only; a batch is written in one transaction so readers see either
//! all of it or none of it.

pub mod migrations;
pub mod schema;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::error::{Error, Result, StorageError};
use crate::reading::Reading;

/// Default time allowed for acquiring the store connection.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Path reported for in-memory stores.
const IN_MEMORY_PATH: &str = ":memory:";

/// Durable, append-only persistence of readings.
///
/// Implementations must make a batch visible atomically and must return an
/// empty history, not an error, for flights they have never seen.
#[async_trait::async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Persist all `readings` as one unit.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the store cannot be reached and
    /// [`StorageError::WriteFailed`] if the batch was rolled back.
    async fn append_batch(&self, readings: &[Reading]) -> std::result::Result<(), StorageError>;

    /// Return up to `limit` most recent readings for `flight_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the store cannot be reached.
    async fn history(
        &self,
        flight_id: &str,
        limit: NonZeroUsize,
    ) -> std::result::Result<Vec<Reading>, StorageError>;
}

/// `SQLite`-backed time-series store.
///
/// The connection sits behind a mutex shared by the writer and all readers;
/// acquiring it is bounded by the operation timeout. Cloning the store shares
/// the same connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection; `None` once the store has been closed.
    conn: Arc<Mutex<Option<Connection>>>,
    /// Upper bound on waiting for the connection or a database lock.
    timeout: Duration,
}

impl SqliteStore {
    /// Open or create a store database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening telemetry database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets another process (e.g. `flightsim history`) read while this one writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(DEFAULT_OPERATION_TIMEOUT)?;

        migrations::initialize_schema(&conn)?;

        info!("Telemetry database opened at {}", path.display());
        Ok(Self::from_connection(path, conn))
    }

    /// Create an in-memory store, mostly useful for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(IN_MEMORY_PATH),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self::from_connection(PathBuf::from(IN_MEMORY_PATH), conn))
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Self {
        Self {
            path,
            conn: Arc::new(Mutex::new(Some(conn))),
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Set the time allowed for acquiring the connection or a database lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the busy timeout cannot be applied.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.timeout = timeout;
        self.with_conn(|conn| Ok(conn.busy_timeout(timeout)?))?;
        Ok(self)
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the store and release the connection.
    ///
    /// Every later operation on this store, or on any clone of it, fails with
    /// [`StorageError::Unavailable`]. Closing twice is a no-op.
    pub fn close(&self) {
        let mut guard = self.conn.lock();
        if guard.take().is_some() {
            info!("Telemetry database at {} closed", self.path.display());
        }
    }

    /// Check if the store has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }

    /// Write `readings` in a single transaction.
    ///
    /// # Errors
    ///
    /// See [`TimeSeriesStore::append_batch`].
    pub fn insert_batch(&self, readings: &[Reading]) -> std::result::Result<(), StorageError> {
        let mut guard = acquire(&self.conn, self.timeout)?;
        let conn = open_connection(&mut guard)?;
        write_batch(conn, readings)
    }

    /// Fetch the most recent readings for one flight, newest first.
    ///
    /// # Errors
    ///
    /// See [`TimeSeriesStore::history`].
    pub fn query_history(
        &self,
        flight_id: &str,
        limit: NonZeroUsize,
    ) -> std::result::Result<Vec<Reading>, StorageError> {
        let mut guard = acquire(&self.conn, self.timeout)?;
        let conn = open_connection(&mut guard)?;
        read_history(conn, flight_id, limit)
    }

    /// Count total readings in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the query fails.
    pub fn count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM telemetry", [], |row| {
                row.get(0)
            })?;
            Ok(count)
        })
    }

    /// Delete readings older than the given age.
    ///
    /// Returns the number of readings deleted. Nothing calls this implicitly;
    /// the store grows until asked to shrink.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the delete fails.
    pub fn prune_older_than(&self, max_age: chrono::Duration) -> Result<usize> {
        // An age reaching past the earliest representable instant covers nothing
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            debug!("Prune age {max_age} predates every possible reading");
            return Ok(0);
        };
        let cutoff = format_timestamp(&cutoff);

        let affected = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM telemetry WHERE timestamp < ?1", [cutoff])?)
        })?;

        if affected > 0 {
            info!("Pruned {} old readings", affected);
        }
        Ok(affected)
    }

    /// Get store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or a query fails.
    pub fn stats(&self) -> Result<StoreStats> {
        let (total_readings, flights, oldest, newest) = self.with_conn(|conn| {
            let row = conn.query_row(
                "SELECT COUNT(*), COUNT(DISTINCT flight_id), MIN(timestamp), MAX(timestamp)
                 FROM telemetry",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )?;
            Ok(row)
        })?;

        let db_size_bytes = if self.path.to_string_lossy() == IN_MEMORY_PATH {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StoreStats {
            total_readings,
            flights,
            oldest_reading: oldest.and_then(|s| parse_timestamp(&s).ok()),
            newest_reading: newest.and_then(|s| parse_timestamp(&s).ok()),
            db_size_bytes,
        })
    }

    /// Run `f` against the open connection.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = acquire(&self.conn, self.timeout)?;
        let conn = open_connection(&mut guard)?;
        f(conn)
    }
}

#[async_trait::async_trait]
impl TimeSeriesStore for SqliteStore {
    async fn append_batch(&self, readings: &[Reading]) -> std::result::Result<(), StorageError> {
        let store = self.clone();
        let readings = readings.to_vec();
        tokio::task::spawn_blocking(move || store.insert_batch(&readings))
            .await
            .map_err(|e| StorageError::unavailable(format!("store worker failed: {e}")))?
    }

    async fn history(
        &self,
        flight_id: &str,
        limit: NonZeroUsize,
    ) -> std::result::Result<Vec<Reading>, StorageError> {
        let store = self.clone();
        let flight_id = flight_id.to_string();
        tokio::task::spawn_blocking(move || store.query_history(&flight_id, limit))
            .await
            .map_err(|e| StorageError::unavailable(format!("store worker failed: {e}")))?
    }
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Total number of readings stored.
    pub total_readings: i64,
    /// Number of distinct flights with at least one reading.
    pub flights: i64,
    /// Timestamp of the oldest reading.
    pub oldest_reading: Option<DateTime<Utc>>,
    /// Timestamp of the newest reading.
    pub newest_reading: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

type ConnGuard<'a> = parking_lot::MutexGuard<'a, Option<Connection>>;

fn acquire(
    conn: &Mutex<Option<Connection>>,
    timeout: Duration,
) -> std::result::Result<ConnGuard<'_>, StorageError> {
    conn.try_lock_for(timeout).ok_or_else(|| {
        StorageError::unavailable(format!("connection busy for more than {timeout:?}"))
    })
}

fn open_connection<'g>(
    guard: &'g mut ConnGuard<'_>,
) -> std::result::Result<&'g mut Connection, StorageError> {
    guard
        .as_mut()
        .ok_or_else(|| StorageError::unavailable("store is closed"))
}

fn write_batch(conn: &mut Connection, readings: &[Reading]) -> std::result::Result<(), StorageError> {
    let tx = conn
        .transaction()
        .map_err(|e| StorageError::unavailable(format!("cannot begin transaction: {e}")))?;

    // Dropping `tx` on any early return rolls the whole batch back.
    {
        let mut stmt = tx
            .prepare_cached(
                r"
                INSERT INTO telemetry
                    (flight_id, flight_name, altitude, speed, temperature, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .map_err(|e| StorageError::write_failed(e.to_string()))?;

        for reading in readings {
            stmt.execute(params![
                reading.flight_id,
                reading.flight_name,
                reading.altitude,
                reading.speed,
                reading.temperature,
                format_timestamp(&reading.timestamp),
            ])
            .map_err(|e| {
                StorageError::write_failed(format!("insert for {} failed: {e}", reading.flight_id))
            })?;
        }
    }

    tx.commit()
        .map_err(|e| StorageError::write_failed(format!("commit failed: {e}")))?;

    debug!("Appended batch of {} readings", readings.len());
    Ok(())
}

fn read_history(
    conn: &Connection,
    flight_id: &str,
    limit: NonZeroUsize,
) -> std::result::Result<Vec<Reading>, StorageError> {
    let query = || -> rusqlite::Result<Vec<Reading>> {
        let mut stmt = conn.prepare_cached(
            r"
            SELECT flight_id, flight_name, altitude, speed, temperature, timestamp
            FROM telemetry WHERE flight_id = ?1
            ORDER BY timestamp DESC, id DESC LIMIT ?2
            ",
        )?;

        let limit_i64 = i64::try_from(limit.get()).unwrap_or(i64::MAX);
        let readings = stmt
            .query_map(params![flight_id, limit_i64], row_to_reading)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(readings)
    };

    query().map_err(|e| StorageError::unavailable(format!("history query failed: {e}")))
}

/// Convert a database row to a Reading.
fn row_to_reading(row: &rusqlite::Row) -> rusqlite::Result<Reading> {
    let timestamp_str: String = row.get(5)?;
    let timestamp = parse_timestamp(&timestamp_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(Reading {
        flight_id: row.get(0)?,
        flight_name: row.get(1)?,
        altitude: row.get(2)?,
        speed: row.get(3)?,
        temperature: row.get(4)?,
        timestamp,
    })
}

/// Fixed-width RFC 3339 so that text order matches time order.
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}
