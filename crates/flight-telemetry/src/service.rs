//! Read contract of the pipeline.
//!
//! [`QueryService`] answers the two read patterns: the latest snapshot of the
//! whole fleet (served from memory) and a bounded history for one flight
//! (served from the store).

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::debug;

use crate::cache::LatestCache;
use crate::error::{Error, Result};
use crate::reading::Reading;
use crate::storage::TimeSeriesStore;

/// History length used when the caller does not ask for one.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Query front-end over the latest cache and the time-series store.
#[derive(Clone)]
pub struct QueryService {
    cache: LatestCache,
    store: Arc<dyn TimeSeriesStore>,
}

impl QueryService {
    /// Create a query service reading from `cache` and `store`.
    #[must_use]
    pub fn new(cache: LatestCache, store: Arc<dyn TimeSeriesStore>) -> Self {
        Self { cache, store }
    }

    /// Latest reading of every flight that has completed at least one cycle.
    ///
    /// Never touches the store and never fails; before the first successful
    /// cycle the result is empty.
    #[must_use]
    pub fn get_latest(&self) -> Vec<Reading> {
        self.cache.snapshot()
    }

    /// Up to `limit` most recent readings for `flight_id`, newest first.
    ///
    /// An unknown flight yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `limit` is zero or negative, and
    /// [`Error::Storage`] if the store cannot serve the query.
    pub async fn get_history(&self, flight_id: &str, limit: i64) -> Result<Vec<Reading>> {
        let limit = validate_limit(limit)?;
        debug!(flight_id, limit = limit.get(), "history query");
        Ok(self.store.history(flight_id, limit).await?)
    }
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Turn a caller-supplied limit into a positive count.
fn validate_limit(limit: i64) -> Result<NonZeroUsize> {
    usize::try_from(limit)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| Error::invalid_argument(format!("limit must be positive, got {limit}")))
}
