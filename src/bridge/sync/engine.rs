use super::config::SyncConfig;
use super::endpoint::{EndpointFetcher, EndpointSpec};
use super::errors::{CycleError, already_started_error, engine_stopped_error, invalid_config_error};
use super::fallback_cache::{CacheStats, FallbackCache};
use super::metrics::SyncMetrics;
use super::orchestrator::{CycleResult, run_cycle};
use super::scheduler::{BackoffTracker, SchedulerState, run_schedule};
use super::snapshot::PublicSnapshot;
use super::subscription::{Subscription, SubscriptionManager};
use crate::error::Result;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

type CycleFuture = Shared<BoxFuture<'static, CycleResult>>;

struct InFlight {
    generation: u64,
    future: CycleFuture,
}

/// Everything a cycle reads or writes, guarded by one async mutex so a
/// cycle's cache writes and its snapshot publish happen as one step.
struct CycleState {
    cache: FallbackCache,
    loading: bool,
    error: Option<String>,
    committed_generation: u64,
}

pub(super) struct EngineInner {
    specs: Vec<EndpointSpec>,
    fetcher: Arc<dyn EndpointFetcher>,
    state: tokio::sync::Mutex<CycleState>,
    backoff: RwLock<BackoffTracker>,
    metrics: RwLock<SyncMetrics>,
    in_flight: Mutex<Option<InFlight>>,
    next_generation: AtomicU64,
    subscriptions: SubscriptionManager,
    pub(super) manual_trigger: Notify,
    cancel: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EngineInner {
    pub(super) fn endpoint_count(&self) -> usize {
        self.specs.len()
    }

    pub(super) fn next_delay(&self) -> Duration {
        self.backoff
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .next_delay()
    }

    pub(super) fn scheduler_state(&self) -> SchedulerState {
        self.backoff
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }

    /// Join the in-flight cycle or start a new one. Never starts a second
    /// cycle while one is running.
    fn begin_cycle(self: &Arc<Self>, trigger: Trigger) -> (u64, CycleFuture) {
        let mut slot = lock(&self.in_flight);
        if let Some(existing) = slot.as_ref() {
            debug!("🔗 {:?} trigger joins in-flight cycle #{}", trigger, existing.generation);
            if let Ok(mut metrics) = self.metrics.write() {
                metrics.coalesced_triggers += 1;
            }
            return (existing.generation, existing.future.clone());
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("🆕 {:?} trigger starts cycle #{}", trigger, generation);
        let future = Arc::clone(self)
            .execute_cycle(generation, self.cancel.child_token())
            .boxed()
            .shared();
        *slot = Some(InFlight {
            generation,
            future: future.clone(),
        });
        drop(slot);
        (generation, future)
    }

    pub(super) async fn run_shared_cycle(self: &Arc<Self>, trigger: Trigger) -> CycleResult {
        let (_, future) = self.begin_cycle(trigger);
        future.await
    }

    /// Wait for the cycle currently running, if there is one
    pub(super) async fn join_in_flight(&self) -> Option<CycleResult> {
        let future = lock(&self.in_flight).as_ref().map(|f| f.future.clone());
        match future {
            Some(future) => Some(future.await),
            None => None,
        }
    }

    async fn execute_cycle(self: Arc<Self>, generation: u64, cancel: CancellationToken) -> CycleResult {
        let mut state = self.state.lock().await;
        let result = run_cycle(&self.specs, self.fetcher.as_ref(), &mut state.cache, &cancel).await;

        if !result.is_cancelled() {
            state.loading = false;
        }
        if result.is_success() {
            state.error = None;
        }
        state.committed_generation = generation;

        self.record(&result);
        self.subscriptions.publish(PublicSnapshot::from_cache(
            &state.cache,
            state.loading,
            state.error.clone(),
            0,
        ));

        // Release the slot before the state lock so the next trigger starts fresh
        {
            let mut slot = lock(&self.in_flight);
            if slot.as_ref().is_some_and(|f| f.generation == generation) {
                *slot = None;
            }
        }
        drop(state);
        result
    }

    fn record(&self, result: &CycleResult) {
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.record_cycle(result);
        }

        let transition = self
            .backoff
            .write()
            .map(|mut backoff| (backoff.record(result), backoff.failure_streak()));
        match transition {
            Ok((Some(SchedulerState::Backoff), streak)) => {
                warn!("⚠️  Bridge unreachable for {} cycle(s), switching to backoff interval", streak);
            }
            Ok((Some(SchedulerState::Fast), _)) => {
                info!("✅ Bridge reachable again, back to fast polling");
            }
            Ok((None, _)) | Err(_) => {}
        }
    }

    /// Show a manual refresh's failure to the user, unless a newer cycle has
    /// already committed since.
    async fn surface_error(&self, generation: u64, message: String) {
        let mut state = self.state.lock().await;
        if state.committed_generation != generation {
            debug!("Dropping stale refresh error from cycle #{}", generation);
            return;
        }
        state.error = Some(message);
        self.subscriptions.publish(PublicSnapshot::from_cache(
            &state.cache,
            state.loading,
            state.error.clone(),
            0,
        ));
    }
}

enum SchedulerSlot {
    NotStarted,
    Running(JoinHandle<()>),
    Stopped,
}

/// Keeps a merged, cache-backed view of one bridge's endpoints up to date.
///
/// Each engine owns its cache, snapshot channel, and scheduler task; nothing
/// is global, so any number of engines can coexist.
pub struct SyncEngine {
    inner: Arc<EngineInner>,
    scheduler: Mutex<SchedulerSlot>,
}

impl SyncEngine {
    /// Build an engine for a fixed set of endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if `specs` is empty, contains duplicate ids, or the
    /// configuration does not validate.
    pub fn new(
        specs: Vec<EndpointSpec>,
        fetcher: Arc<dyn EndpointFetcher>,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        if specs.is_empty() {
            return Err(invalid_config_error("at least one endpoint is required"));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = specs.iter().find(|spec| !seen.insert(spec.id().clone())) {
            return Err(invalid_config_error(&format!(
                "endpoint {} is configured twice",
                duplicate.id()
            )));
        }

        let inner = EngineInner {
            state: tokio::sync::Mutex::new(CycleState {
                cache: FallbackCache::new(&specs),
                loading: true,
                error: None,
                committed_generation: 0,
            }),
            specs,
            fetcher,
            backoff: RwLock::new(BackoffTracker::new(&config)),
            metrics: RwLock::new(SyncMetrics::default()),
            in_flight: Mutex::new(None),
            next_generation: AtomicU64::new(0),
            subscriptions: SubscriptionManager::new(),
            manual_trigger: Notify::new(),
            cancel: CancellationToken::new(),
        };

        Ok(Self {
            inner: Arc::new(inner),
            scheduler: Mutex::new(SchedulerSlot::NotStarted),
        })
    }

    /// Spawn the poll loop on the current tokio runtime. The first cycle
    /// starts immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is already running or has been stopped.
    pub fn start(&self) -> Result<()> {
        let mut slot = lock(&self.scheduler);
        match *slot {
            SchedulerSlot::Running(_) => Err(already_started_error("sync engine")),
            SchedulerSlot::Stopped => Err(engine_stopped_error("sync engine")),
            SchedulerSlot::NotStarted => {
                let handle = tokio::spawn(run_schedule(
                    Arc::clone(&self.inner),
                    self.inner.cancel.clone(),
                ));
                *slot = SchedulerSlot::Running(handle);
                Ok(())
            }
        }
    }

    /// Current public view; cheap, never blocks on a running cycle
    #[must_use]
    pub fn snapshot(&self) -> Arc<PublicSnapshot> {
        self.inner.subscriptions.current()
    }

    /// Run a cycle now, outside the schedule.
    ///
    /// Joins the running cycle instead of starting a second one. Unlike
    /// scheduled cycles, a failure here is also written to `snapshot().error`.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::AllFailed` when no endpoint answered and
    /// `CycleError::Cancelled` when the engine is stopping or stopped.
    pub async fn refresh_now(&self) -> core::result::Result<CycleResult, CycleError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CycleError::Cancelled);
        }
        if let Ok(mut metrics) = self.inner.metrics.write() {
            metrics.manual_triggers += 1;
        }

        let (generation, future) = self.inner.begin_cycle(Trigger::Manual);
        self.inner.manual_trigger.notify_one();
        let result = future.await;

        if let Some(err @ CycleError::AllFailed(_)) = &result.cycle_error {
            warn!("❌ Manual refresh failed: {}", err);
            self.inner.surface_error(generation, err.to_string()).await;
        }
        result.into_result()
    }

    /// Listen for snapshot changes on endpoints matching `pattern`; drop the
    /// returned value to unsubscribe
    #[must_use]
    pub fn subscribe(&self, pattern: impl Into<String>) -> Subscription {
        self.inner.subscriptions.subscribe(pattern.into())
    }

    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.inner.subscriptions.active_subscriptions()
    }

    #[must_use]
    pub fn scheduler_state(&self) -> SchedulerState {
        self.inner.scheduler_state()
    }

    #[must_use]
    pub fn next_delay(&self) -> Duration {
        self.inner.next_delay()
    }

    #[must_use]
    pub fn metrics(&self) -> SyncMetrics {
        self.inner
            .metrics
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Waits for any running cycle to release the cache
    pub async fn cache_stats(&self) -> CacheStats {
        self.inner.state.lock().await.cache.stats()
    }

    #[must_use]
    pub fn endpoints(&self) -> &[EndpointSpec] {
        &self.inner.specs
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(*lock(&self.scheduler), SchedulerSlot::Running(_))
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(*lock(&self.scheduler), SchedulerSlot::Stopped)
    }

    /// Stop polling. On return the timer is disarmed, the scheduler task has
    /// exited, and no fetch is outstanding.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();

        let previous = std::mem::replace(&mut *lock(&self.scheduler), SchedulerSlot::Stopped);
        if let SchedulerSlot::Running(handle) = previous {
            if let Err(e) = handle.await {
                warn!("Scheduler task ended abnormally: {}", e);
            }
        }

        // A manual refresh may still be unwinding its cancelled fetches
        if self.inner.join_in_flight().await.is_some() {
            debug!("🛑 In-flight cycle drained");
        }
        info!("🛑 Sync engine stopped");
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}
