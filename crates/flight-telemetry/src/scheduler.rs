//! Periodic telemetry producer.
//!
//! Every tick the scheduler generates one reading per flight, writes them to
//! the store as one batch and, only if the write succeeded, refreshes the
//! latest cache with the same in-hand readings. A failed batch is logged and
//! the cycle ends there; the next tick starts fresh.
//!
//! The loop runs on its own tokio task. Cancellation is observed between
//! ticks only, so a cycle that has started always runs to completion.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::LatestCache;
use crate::error::{Error, Result, StorageError};
use crate::fleet::Fleet;
use crate::generator::TelemetryGenerator;
use crate::reading::Reading;
use crate::storage::TimeSeriesStore;

/// Default time between cycles.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Whether a cycle is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick.
    Idle,
    /// A fleet-wide cycle is in progress.
    Running,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Result of a single cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The batch was persisted and the cache refreshed.
    Persisted {
        /// Number of readings written.
        readings: usize,
    },
    /// The batch write failed; the cache was left untouched.
    StoreFailed(StorageError),
    /// Another cycle was still running, so this one did nothing.
    Skipped,
}

/// Point-in-time view of the scheduler's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    /// Current state.
    pub state: SchedulerState,
    /// Cycles whose batch was persisted.
    pub cycles_completed: u64,
    /// Cycles whose batch write failed.
    pub cycles_failed: u64,
    /// Ticks dropped because a cycle was already running.
    pub cycles_skipped: u64,
}

#[derive(Debug, Default)]
struct SharedStatus {
    running: AtomicBool,
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    cycles_skipped: AtomicU64,
}

impl SharedStatus {
    fn snapshot(&self) -> SchedulerStatus {
        SchedulerStatus {
            state: if self.running.load(Ordering::Acquire) {
                SchedulerState::Running
            } else {
                SchedulerState::Idle
            },
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Puts the scheduler back to idle when a cycle ends, even if it is dropped
/// half way.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the generate, persist, refresh cycle over a fixed fleet.
pub struct SimulationScheduler {
    fleet: Fleet,
    generator: TelemetryGenerator,
    store: Arc<dyn TimeSeriesStore>,
    cache: LatestCache,
    interval: Duration,
    status: Arc<SharedStatus>,
}

impl SimulationScheduler {
    /// Create a scheduler. Nothing runs until [`spawn`](Self::spawn) or one of
    /// the `run_cycle` methods is called.
    #[must_use]
    pub fn new(
        fleet: Fleet,
        generator: TelemetryGenerator,
        store: Arc<dyn TimeSeriesStore>,
        cache: LatestCache,
        interval: Duration,
    ) -> Self {
        Self {
            fleet,
            generator,
            store,
            cache,
            interval,
            status: Arc::new(SharedStatus::default()),
        }
    }

    /// The fleet this scheduler iterates.
    #[must_use]
    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    /// Time between cycles.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current progress counters.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        self.status.snapshot()
    }

    /// Run one cycle stamped with the current time.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle with every reading stamped `now`.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        if self
            .status
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.status.cycles_skipped.fetch_add(1, Ordering::Relaxed);
            warn!("Previous telemetry cycle still running, skipping tick");
            return CycleOutcome::Skipped;
        }
        let status = Arc::clone(&self.status);
        let _running = RunningGuard(&status.running);

        let batch: Vec<Reading> = self
            .fleet
            .iter()
            .map(|flight| self.generator.generate(flight, now))
            .collect();

        if let Err(e) = self.store.append_batch(&batch).await {
            status.cycles_failed.fetch_add(1, Ordering::Relaxed);
            error!(
                error = %e,
                readings = batch.len(),
                "Telemetry batch not persisted, cache left unchanged"
            );
            return CycleOutcome::StoreFailed(e);
        }

        let readings = batch.len();
        for reading in batch {
            let flight_id = reading.flight_id.clone();
            self.cache.refresh(&flight_id, reading);
        }

        status.cycles_completed.fetch_add(1, Ordering::Relaxed);
        debug!(readings, "Telemetry cycle persisted");
        CycleOutcome::Persisted { readings }
    }

    /// Start the periodic loop on a new tokio task.
    ///
    /// The first cycle runs immediately, then one per interval. Late ticks
    /// are dropped rather than replayed in a burst.
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let token = CancellationToken::new();
        let status = Arc::clone(&self.status);
        let task = tokio::spawn(self.run(token.clone()));

        SchedulerHandle {
            token,
            task,
            status,
        }
    }

    async fn run(mut self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            flights = self.fleet.len(),
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Telemetry scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.run_cycle().await;
        }

        let status = self.status.snapshot();
        info!(
            cycles_completed = status.cycles_completed,
            cycles_failed = status.cycles_failed,
            "Telemetry scheduler stopped"
        );
    }
}

impl std::fmt::Debug for SimulationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationScheduler")
            .field("flights", &self.fleet.len())
            .field("interval", &self.interval)
            .field("status", &self.status.snapshot())
            .finish_non_exhaustive()
    }
}

/// Handle to a running scheduler loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    status: Arc<SharedStatus>,
}

impl SchedulerHandle {
    /// Current progress counters.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        self.status.snapshot()
    }

    /// Check if the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop accepting ticks, let any in-flight cycle finish, and wait for the
    /// loop to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler task panicked.
    pub async fn shutdown(self) -> Result<SchedulerStatus> {
        self.token.cancel();
        self.task
            .await
            .map_err(|e| Error::internal(format!("scheduler task failed: {e}")))?;
        Ok(self.status.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::FlightIdentity;
    use crate::service::QueryService;
    use crate::storage::SqliteStore;
    use chrono::TimeZone;
    use std::num::NonZeroUsize;
    use std::sync::atomic::AtomicUsize;

    /// Store double that fails chosen `append_batch` calls (1-based).
    struct FlakyStore {
        inner: SqliteStore,
        calls: AtomicUsize,
        fail_on: Vec<usize>,
    }

    impl FlakyStore {
        fn new(inner: SqliteStore, fail_on: Vec<usize>) -> Self {
            Self {
                inner,
                calls: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait::async_trait]
    impl TimeSeriesStore for FlakyStore {
        async fn append_batch(
            &self,
            readings: &[Reading],
        ) -> std::result::Result<(), StorageError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&call) {
                return Err(StorageError::write_failed("injected fault"));
            }
            self.inner.append_batch(readings).await
        }

        async fn history(
            &self,
            flight_id: &str,
            limit: NonZeroUsize,
        ) -> std::result::Result<Vec<Reading>, StorageError> {
            self.inner.history(flight_id, limit).await
        }
    }

    struct Pipeline {
        scheduler: SimulationScheduler,
        service: QueryService,
        cache: LatestCache,
        sqlite: SqliteStore,
    }

    fn two_flight_fleet() -> Fleet {
        Fleet::new(vec![
            FlightIdentity::new("F1", "Flight One"),
            FlightIdentity::new("F2", "Flight Two"),
        ])
    }

    fn pipeline(fleet: Fleet, fail_on: Vec<usize>, interval: Duration) -> Pipeline {
        let sqlite = SqliteStore::open_in_memory().unwrap();
        let store: Arc<dyn TimeSeriesStore> =
            Arc::new(FlakyStore::new(sqlite.clone(), fail_on));
        let cache = LatestCache::new();
        let scheduler = SimulationScheduler::new(
            fleet,
            TelemetryGenerator::with_seed(2026),
            Arc::clone(&store),
            cache.clone(),
            interval,
        );
        let service = QueryService::new(cache.clone(), store);
        Pipeline {
            scheduler,
            service,
            cache,
            sqlite,
        }
    }

    fn tick(n: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 6, 0, 0).unwrap()
            + chrono::Duration::seconds(2 * i64::from(n))
    }

    fn sorted(mut readings: Vec<Reading>) -> Vec<Reading> {
        readings.sort_by(|a, b| a.flight_id.cmp(&b.flight_id));
        readings
    }

    #[tokio::test]
    async fn test_two_flight_scenario() {
        let mut p = pipeline(two_flight_fleet(), vec![], DEFAULT_TICK_INTERVAL);

        assert!(p.service.get_latest().is_empty());

        let outcome = p.scheduler.run_cycle_at(tick(0)).await;
        assert_eq!(outcome, CycleOutcome::Persisted { readings: 2 });
        let cycle1 = sorted(p.service.get_latest());
        assert_eq!(cycle1.len(), 2);
        assert!(cycle1.iter().all(|r| r.timestamp == tick(0)));

        p.scheduler.run_cycle_at(tick(1)).await;
        let cycle2 = sorted(p.service.get_latest());
        assert_eq!(cycle2.len(), 2);
        assert!(cycle2.iter().all(|r| r.timestamp == tick(1)));

        let r1 = cycle1[0].clone();
        let r1_next = cycle2[0].clone();
        assert_eq!(r1.flight_id, "F1");
        assert_eq!(r1.flight_name, "Flight One");

        assert_eq!(
            p.service.get_history("F1", 1).await.unwrap(),
            vec![r1_next.clone()]
        );
        assert_eq!(
            p.service.get_history("F1", 5).await.unwrap(),
            vec![r1_next, r1]
        );
    }

    #[tokio::test]
    async fn test_unknown_flight_and_bad_limit() {
        let mut p = pipeline(two_flight_fleet(), vec![], DEFAULT_TICK_INTERVAL);
        p.scheduler.run_cycle_at(tick(0)).await;

        assert!(p.service.get_history("UNKNOWN", 10).await.unwrap().is_empty());
        assert!(p
            .service
            .get_history("F1", 0)
            .await
            .unwrap_err()
            .is_invalid_argument());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_unchanged() {
        let mut p = pipeline(two_flight_fleet(), vec![3], DEFAULT_TICK_INTERVAL);

        p.scheduler.run_cycle_at(tick(1)).await;
        p.scheduler.run_cycle_at(tick(2)).await;
        let after_cycle2 = sorted(p.service.get_latest());

        let outcome = p.scheduler.run_cycle_at(tick(3)).await;
        assert!(matches!(
            outcome,
            CycleOutcome::StoreFailed(StorageError::WriteFailed { .. })
        ));
        assert_eq!(sorted(p.service.get_latest()), after_cycle2);
        assert!(after_cycle2.iter().all(|r| r.timestamp == tick(2)));

        let outcome = p.scheduler.run_cycle_at(tick(4)).await;
        assert_eq!(outcome, CycleOutcome::Persisted { readings: 2 });
        assert!(p.service.get_latest().iter().all(|r| r.timestamp == tick(4)));

        // Cycle 3 left no rows behind.
        assert_eq!(p.sqlite.count().unwrap(), 6);
        let history = p.service.get_history("F2", 10).await.unwrap();
        let stamps: Vec<_> = history.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![tick(4), tick(2), tick(1)]);

        let status = p.scheduler.status();
        assert_eq!(status.cycles_completed, 3);
        assert_eq!(status.cycles_failed, 1);
        assert_eq!(status.state, SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_failure_before_first_success_keeps_cache_empty() {
        let mut p = pipeline(two_flight_fleet(), vec![1], DEFAULT_TICK_INTERVAL);

        let outcome = p.scheduler.run_cycle_at(tick(0)).await;
        assert!(matches!(outcome, CycleOutcome::StoreFailed(_)));
        assert!(p.cache.is_empty());
        assert!(p.service.get_latest().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_is_survived() {
        let mut p = pipeline(two_flight_fleet(), vec![], DEFAULT_TICK_INTERVAL);
        p.scheduler.run_cycle_at(tick(0)).await;
        p.sqlite.close();

        let outcome = p.scheduler.run_cycle_at(tick(1)).await;
        match outcome {
            CycleOutcome::StoreFailed(e) => assert!(e.is_unavailable()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(p.service.get_latest().iter().all(|r| r.timestamp == tick(0)));
    }

    #[tokio::test]
    async fn test_latest_is_monotonic_per_flight() {
        let mut p = pipeline(Fleet::generate(5), vec![2, 4], DEFAULT_TICK_INTERVAL);
        let mut last_seen = std::collections::HashMap::new();

        for n in 0..6 {
            p.scheduler.run_cycle_at(tick(n)).await;
            let latest = p.service.get_latest();
            let mut ids: Vec<_> = latest.iter().map(|r| r.flight_id.clone()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), latest.len());

            for reading in latest {
                let previous = last_seen.insert(reading.flight_id.clone(), reading.timestamp);
                if let Some(previous) = previous {
                    assert!(reading.timestamp >= previous);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_every_flight_persisted_and_cached() {
        let mut p = pipeline(Fleet::generate(3), vec![], DEFAULT_TICK_INTERVAL);
        p.scheduler.run_cycle_at(tick(0)).await;

        let limit = NonZeroUsize::new(5).unwrap();
        for flight in p.scheduler.fleet() {
            let history = p.sqlite.query_history(&flight.flight_id, limit).unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(p.cache.get(&flight.flight_id), Some(history[0].clone()));
        }
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_skipped() {
        let mut p = pipeline(two_flight_fleet(), vec![], DEFAULT_TICK_INTERVAL);
        p.scheduler.status.running.store(true, Ordering::Release);
        assert_eq!(p.scheduler.status().state, SchedulerState::Running);

        let outcome = p.scheduler.run_cycle_at(tick(0)).await;
        assert_eq!(outcome, CycleOutcome::Skipped);
        assert!(p.cache.is_empty());
        assert_eq!(p.sqlite.count().unwrap(), 0);
        assert_eq!(p.scheduler.status().cycles_skipped, 1);
    }

    async fn wait_for(handle: &SchedulerHandle, done: impl Fn(&SchedulerStatus) -> bool) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !done(&handle.status()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("scheduler made no progress");
    }

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let p = pipeline(Fleet::generate(4), vec![], Duration::from_millis(10));
        let handle = p.scheduler.spawn();

        wait_for(&handle, |s| s.cycles_completed >= 2).await;
        assert!(!handle.is_finished());

        let status = handle.shutdown().await.unwrap();
        assert_eq!(status.state, SchedulerState::Idle);
        assert!(status.cycles_completed >= 2);
        assert_eq!(p.cache.len(), 4);

        // No more cycles once stopped.
        let count = p.sqlite.count().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(p.sqlite.count().unwrap(), count);
        assert_eq!(count % 4, 0);
    }

    #[tokio::test]
    async fn test_loop_keeps_running_after_failures() {
        let p = pipeline(two_flight_fleet(), vec![1, 2], Duration::from_millis(10));
        let handle = p.scheduler.spawn();

        wait_for(&handle, |s| s.cycles_completed >= 1).await;
        let status = handle.shutdown().await.unwrap();

        assert_eq!(status.cycles_failed, 2);
        assert_eq!(p.cache.len(), 2);
    }

    #[test]
    fn test_scheduler_state_display() {
        assert_eq!(SchedulerState::Idle.to_string(), "idle");
        assert_eq!(SchedulerState::Running.to_string(), "running");
    }
}
