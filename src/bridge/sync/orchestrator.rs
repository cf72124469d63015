use super::endpoint::{EndpointFetcher, EndpointId, EndpointSpec};
use super::errors::{CycleError, EndpointFailure, FetchError};
use super::fallback_cache::FallbackCache;
use super::fingerprint::{Change, dedupe};
use crate::bridge::payload::Payload;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum EndpointOutcome {
    Updated(Arc<Payload>),
    Unchanged,
    Failed(FetchError),
}

impl EndpointOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Updated(_) | Self::Unchanged)
    }
}

/// What one poll cycle produced; discarded once the engine has folded it in
#[derive(Debug, Clone, PartialEq)]
pub struct CycleResult {
    pub per_endpoint: BTreeMap<EndpointId, EndpointOutcome>,
    pub cycle_error: Option<CycleError>,
    pub completed_at: DateTime<Utc>,
}

impl CycleResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.cycle_error.is_none()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cycle_error.as_ref().is_some_and(CycleError::is_cancelled)
    }

    #[must_use]
    pub fn updated_endpoints(&self) -> Vec<&EndpointId> {
        self.per_endpoint
            .iter()
            .filter(|(_, outcome)| matches!(outcome, EndpointOutcome::Updated(_)))
            .map(|(id, _)| id)
            .collect()
    }

    #[must_use]
    pub fn count(&self, pred: impl Fn(&EndpointOutcome) -> bool) -> usize {
        self.per_endpoint.values().filter(|outcome| pred(outcome)).count()
    }

    /// Convert into the form handed to a caller that asked for this cycle
    ///
    /// # Errors
    ///
    /// Returns the cycle-level error when every endpoint failed or the cycle
    /// was cancelled.
    pub fn into_result(self) -> Result<Self, CycleError> {
        match self.cycle_error.clone() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Run one poll cycle: fetch every endpoint concurrently, then fold the
/// results into `cache` in a single step.
///
/// A failing endpoint never aborts its siblings and never touches its cached
/// entry beyond recording the error. The cycle only counts as failed when no
/// endpoint succeeded.
pub async fn run_cycle(
    specs: &[EndpointSpec],
    fetcher: &dyn EndpointFetcher,
    cache: &mut FallbackCache,
    cancel: &CancellationToken,
) -> CycleResult {
    let start = Instant::now();
    info!("🔄 CYCLE START: {} endpoints", specs.len());

    let fetches = specs.iter().map(|spec| async move {
        let result = fetcher.fetch(spec, cancel).await;
        (spec.id().clone(), result)
    });
    let results = join_all(fetches).await;

    let now = Utc::now();
    let mut per_endpoint = BTreeMap::new();
    let mut failures = Vec::new();
    let mut cancelled = false;

    for (id, result) in results {
        let outcome = match result {
            Ok(payload) => {
                let change = match cache.get(&id) {
                    Some(cached) => dedupe(payload, cached),
                    None => dedupe(payload, &Default::default()),
                };
                match change {
                    Change::Update {
                        payload,
                        fingerprint,
                    } => {
                        cache.commit(&id, payload.clone(), fingerprint, now);
                        EndpointOutcome::Updated(payload)
                    }
                    Change::Unchanged => {
                        cache.mark_unchanged(&id);
                        EndpointOutcome::Unchanged
                    }
                }
            }
            Err(FetchError::Cancelled) => {
                debug!("🛑 {} cancelled mid-cycle", id);
                cancelled = true;
                EndpointOutcome::Failed(FetchError::Cancelled)
            }
            Err(e) => {
                warn!("❌ FETCH FAILED: {} - {}", id, e);
                cache.mark_error(&id, e.to_string());
                failures.push(EndpointFailure {
                    endpoint: id.clone(),
                    error: e.clone(),
                });
                EndpointOutcome::Failed(e)
            }
        };
        per_endpoint.insert(id, outcome);
    }

    let any_success = per_endpoint.values().any(EndpointOutcome::is_success);
    let cycle_error = if any_success || per_endpoint.is_empty() {
        None
    } else if cancelled {
        Some(CycleError::Cancelled)
    } else {
        Some(CycleError::AllFailed(failures))
    };

    let result = CycleResult {
        per_endpoint,
        cycle_error,
        completed_at: now,
    };

    let elapsed = start.elapsed();
    match &result.cycle_error {
        None => info!(
            "✅ CYCLE DONE: {} updated, {} unchanged, {} failed ({:.2}s)",
            result.count(|o| matches!(o, EndpointOutcome::Updated(_))),
            result.count(|o| matches!(o, EndpointOutcome::Unchanged)),
            result.count(|o| !o.is_success()),
            elapsed.as_secs_f64()
        ),
        Some(CycleError::Cancelled) => info!("🛑 CYCLE CANCELLED ({:.2}s)", elapsed.as_secs_f64()),
        Some(e) => error!("💀 CYCLE FAILED ({:.2}s): {}", elapsed.as_secs_f64(), e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::payload::PayloadKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    /// Returns a fixed answer per endpoint id
    struct FixedFetcher(HashMap<&'static str, Result<Payload, FetchError>>);

    #[async_trait]
    impl EndpointFetcher for FixedFetcher {
        async fn fetch(
            &self,
            endpoint: &EndpointSpec,
            _cancel: &CancellationToken,
        ) -> Result<Payload, FetchError> {
            self.0
                .get(endpoint.id().as_str())
                .cloned()
                .unwrap_or_else(|| Err(FetchError::transport("no route")))
        }
    }

    fn specs() -> Vec<EndpointSpec> {
        vec![
            EndpointSpec::new("a", "/a", PayloadKind::Json),
            EndpointSpec::new("b", "/b", PayloadKind::Json),
        ]
    }

    #[tokio::test]
    async fn test_partial_failure_is_not_a_cycle_error() {
        let specs = specs();
        let mut cache = FallbackCache::new(&specs);
        let fetcher = FixedFetcher(HashMap::from([
            ("a", Ok(Payload::Json(json!({"v": 1})))),
            ("b", Err(FetchError::http_status(502, "bad gateway"))),
        ]));

        let result = run_cycle(&specs, &fetcher, &mut cache, &CancellationToken::new()).await;

        assert!(result.is_success());
        assert_eq!(result.updated_endpoints(), vec![&EndpointId::from("a")]);
        assert!(cache.get(&EndpointId::from("a")).unwrap().has_payload());
        assert!(!cache.get(&EndpointId::from("b")).unwrap().has_payload());
    }

    #[tokio::test]
    async fn test_all_failed_is_a_cycle_error() {
        let specs = specs();
        let mut cache = FallbackCache::new(&specs);
        let fetcher = FixedFetcher(HashMap::new());

        let result = run_cycle(&specs, &fetcher, &mut cache, &CancellationToken::new()).await;

        match result.cycle_error {
            Some(CycleError::AllFailed(failures)) => assert_eq!(failures.len(), 2),
            other => panic!("expected AllFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_endpoints_do_not_count_as_failures() {
        let specs = specs();
        let mut cache = FallbackCache::new(&specs);
        let fetcher = FixedFetcher(HashMap::from([
            ("a", Err(FetchError::Cancelled)),
            ("b", Err(FetchError::transport("refused"))),
        ]));

        let result = run_cycle(&specs, &fetcher, &mut cache, &CancellationToken::new()).await;

        assert!(result.is_cancelled());
        assert_eq!(result.into_result(), Err(CycleError::Cancelled));
    }

    #[tokio::test]
    async fn test_second_identical_payload_is_unchanged() {
        let specs = specs();
        let mut cache = FallbackCache::new(&specs);
        let fetcher = FixedFetcher(HashMap::from([
            ("a", Ok(Payload::Json(json!({"v": 1})))),
            ("b", Ok(Payload::Json(json!({"v": 2})))),
        ]));
        let cancel = CancellationToken::new();

        run_cycle(&specs, &fetcher, &mut cache, &cancel).await;
        let stamped = cache.get(&EndpointId::from("a")).unwrap().last_updated;

        let second = run_cycle(&specs, &fetcher, &mut cache, &cancel).await;
        assert!(second.updated_endpoints().is_empty());
        assert_eq!(
            second.per_endpoint.get(&EndpointId::from("a")),
            Some(&EndpointOutcome::Unchanged)
        );
        assert_eq!(cache.get(&EndpointId::from("a")).unwrap().last_updated, stamped);
    }
}
