use super::config::SyncConfig;
use super::engine::{EngineInner, Trigger};
use super::orchestrator::CycleResult;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// Normal near-real-time polling
    Fast,
    /// Elongated interval while the bridge keeps failing
    Backoff,
}

/// Failure streak and the delay it implies.
///
/// The delay is fixed per state; it does not grow with the streak.
#[derive(Debug, Clone)]
pub struct BackoffTracker {
    fast_interval: Duration,
    backoff_interval: Duration,
    threshold: u32,
    failure_streak: u32,
}

impl BackoffTracker {
    #[must_use]
    pub const fn new(config: &SyncConfig) -> Self {
        Self {
            fast_interval: config.fast_interval,
            backoff_interval: config.backoff_interval,
            threshold: config.backoff_threshold,
            failure_streak: 0,
        }
    }

    /// Fold a finished cycle into the streak, returning the new state if it changed.
    ///
    /// Any cycle with a successful endpoint resets the streak; only an
    /// all-endpoints failure extends it. Cancelled cycles leave it alone.
    pub fn record(&mut self, result: &CycleResult) -> Option<SchedulerState> {
        let before = self.state();
        if result.is_success() {
            self.failure_streak = 0;
        } else if !result.is_cancelled() {
            self.failure_streak = self.failure_streak.saturating_add(1);
        }
        let after = self.state();
        (before != after).then_some(after)
    }

    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        if self.failure_streak >= self.threshold {
            SchedulerState::Backoff
        } else {
            SchedulerState::Fast
        }
    }

    #[must_use]
    pub const fn next_delay(&self) -> Duration {
        match self.state() {
            SchedulerState::Fast => self.fast_interval,
            SchedulerState::Backoff => self.backoff_interval,
        }
    }

    #[must_use]
    pub const fn failure_streak(&self) -> u32 {
        self.failure_streak
    }
}

/// The engine's single poll loop: cycle, wait for it, sleep, repeat.
///
/// Cycles never overlap. A manual trigger during the sleep cancels only the
/// pending timer; the loop waits for that manual cycle to finish and then
/// re-arms the timer from the resulting state.
pub(super) async fn run_schedule(inner: Arc<EngineInner>, cancel: CancellationToken) {
    info!("🚀 Scheduler started ({} endpoints)", inner.endpoint_count());

    'schedule: loop {
        if cancel.is_cancelled() {
            break;
        }

        inner.run_shared_cycle(Trigger::Scheduled).await;

        loop {
            let delay = inner.next_delay();
            debug!("⏱️  Next cycle in {}ms ({:?})", delay.as_millis(), inner.scheduler_state());

            tokio::select! {
                () = cancel.cancelled() => break 'schedule,
                () = sleep(delay) => break,
                () = inner.manual_trigger.notified() => {
                    // A stale permit can arrive after the manual cycle already finished
                    if inner.join_in_flight().await.is_some() {
                        debug!("⏱️  Timer re-armed after manual refresh");
                    }
                }
            }
        }
    }

    info!("🛑 Scheduler shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::sync::endpoint::EndpointId;
    use crate::bridge::sync::errors::{CycleError, EndpointFailure, FetchError};
    use crate::bridge::sync::orchestrator::EndpointOutcome;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn success() -> CycleResult {
        CycleResult {
            per_endpoint: BTreeMap::from([(EndpointId::from("health"), EndpointOutcome::Unchanged)]),
            cycle_error: None,
            completed_at: Utc::now(),
        }
    }

    fn failure() -> CycleResult {
        let error = FetchError::transport("timed out");
        CycleResult {
            per_endpoint: BTreeMap::from([(
                EndpointId::from("health"),
                EndpointOutcome::Failed(error.clone()),
            )]),
            cycle_error: Some(CycleError::AllFailed(vec![EndpointFailure {
                endpoint: EndpointId::from("health"),
                error,
            }])),
            completed_at: Utc::now(),
        }
    }

    fn cancelled() -> CycleResult {
        CycleResult {
            per_endpoint: BTreeMap::new(),
            cycle_error: Some(CycleError::Cancelled),
            completed_at: Utc::now(),
        }
    }

    fn config(threshold: u32) -> SyncConfig {
        SyncConfig::default()
            .with_fast_interval(Duration::from_secs(2))
            .with_backoff_interval(Duration::from_secs(10))
            .with_backoff_threshold(threshold)
    }

    #[test]
    fn test_three_failures_then_success() {
        let mut tracker = BackoffTracker::new(&config(1));
        assert_eq!(tracker.state(), SchedulerState::Fast);
        assert_eq!(tracker.next_delay(), Duration::from_secs(2));

        assert_eq!(tracker.record(&failure()), Some(SchedulerState::Backoff));
        assert_eq!(tracker.record(&failure()), None);
        assert_eq!(tracker.record(&failure()), None);
        assert_eq!(tracker.failure_streak(), 3);
        assert_eq!(tracker.next_delay(), Duration::from_secs(10));

        assert_eq!(tracker.record(&success()), Some(SchedulerState::Fast));
        assert_eq!(tracker.failure_streak(), 0);
        assert_eq!(tracker.next_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_higher_threshold_delays_backoff() {
        let mut tracker = BackoffTracker::new(&config(3));
        tracker.record(&failure());
        tracker.record(&failure());
        assert_eq!(tracker.state(), SchedulerState::Fast);
        assert_eq!(tracker.record(&failure()), Some(SchedulerState::Backoff));
    }

    #[test]
    fn test_cancelled_cycle_leaves_streak_alone() {
        let mut tracker = BackoffTracker::new(&config(1));
        tracker.record(&failure());
        assert_eq!(tracker.record(&cancelled()), None);
        assert_eq!(tracker.failure_streak(), 1);

        let mut fresh = BackoffTracker::new(&config(1));
        fresh.record(&cancelled());
        assert_eq!(fresh.state(), SchedulerState::Fast);
    }
}
