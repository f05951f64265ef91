//! In-memory latest reading per flight.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::reading::Reading;

/// Most recent reading per flight, shared between the scheduler (writer) and
/// any number of readers.
///
/// Cloning is cheap and every clone sees the same entries. Each entry is
/// replaced whole under the write lock, so readers never observe a torn
/// reading. There is no eviction: an entry stays until it is overwritten.
#[derive(Debug, Clone, Default)]
pub struct LatestCache {
    inner: Arc<RwLock<HashMap<String, Reading>>>,
}

impl LatestCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the entry for `flight_id` with `reading`.
    pub fn refresh(&self, flight_id: &str, reading: Reading) {
        self.inner.write().insert(flight_id.to_string(), reading);
    }

    /// Return one reading per cached flight, in no particular order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Reading> {
        self.inner.read().values().cloned().collect()
    }

    /// Return the cached reading for one flight, if any.
    #[must_use]
    pub fn get(&self, flight_id: &str) -> Option<Reading> {
        self.inner.read().get(flight_id).cloned()
    }

    /// Number of flights with a cached reading.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if no flight has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(flight_id: &str, seconds: u32) -> Reading {
        Reading {
            flight_id: flight_id.to_string(),
            flight_name: format!("Airbus-{flight_id}"),
            altitude: 9000.0,
            speed: 750.0,
            temperature: -30.0,
            timestamp: Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, seconds).unwrap(),
        }
    }

    #[test]
    fn test_new_cache_is_empty() {
        let cache = LatestCache::new();
        assert!(cache.is_empty());
        assert!(cache.snapshot().is_empty());
        assert!(cache.get("F1").is_none());
    }

    #[test]
    fn test_refresh_overwrites() {
        let cache = LatestCache::new();
        cache.refresh("F1", reading("F1", 0));
        cache.refresh("F1", reading("F1", 2));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("F1"), Some(reading("F1", 2)));
    }

    #[test]
    fn test_snapshot_one_entry_per_flight() {
        let cache = LatestCache::new();
        for second in 0..3 {
            cache.refresh("F1", reading("F1", second));
            cache.refresh("F2", reading("F2", second));
        }

        let mut snapshot = cache.snapshot();
        snapshot.sort_by(|a, b| a.flight_id.cmp(&b.flight_id));
        assert_eq!(snapshot, vec![reading("F1", 2), reading("F2", 2)]);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = LatestCache::new();
        let reader = cache.clone();

        cache.refresh("F1", reading("F1", 1));
        assert_eq!(reader.get("F1"), Some(reading("F1", 1)));
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let cache = LatestCache::new();
        cache.refresh("F1", reading("F1", 1));
        let before = cache.snapshot();

        cache.refresh("F1", reading("F1", 5));
        assert_eq!(before, vec![reading("F1", 1)]);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_entries() {
        let cache = LatestCache::new();
        cache.refresh("F1", reading("F1", 0));

        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for second in 0..50 {
                    cache.refresh("F1", reading("F1", second));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let mut last_seen = None;
                    for _ in 0..200 {
                        let entry = cache.get("F1").unwrap();
                        assert_eq!(entry.flight_name, "Airbus-F1");
                        if let Some(previous) = last_seen {
                            assert!(entry.timestamp >= previous);
                        }
                        last_seen = Some(entry.timestamp);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(cache.get("F1"), Some(reading("F1", 49)));
    }
}
