use super::cached_state::{CachedState, FetchStatus};
use super::endpoint::{EndpointId, EndpointSpec};
use super::fingerprint::Fingerprint;
use crate::bridge::payload::Payload;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Last-known-good payload per endpoint.
///
/// Owned by the engine's cycle step; nothing else writes to it. Entries are
/// created up front for every configured endpoint and never removed, so once
/// an endpoint has a payload it keeps one for the life of the engine.
#[derive(Debug, Default)]
pub struct FallbackCache {
    entries: BTreeMap<EndpointId, CachedState>,
}

impl FallbackCache {
    #[must_use]
    pub fn new(specs: &[EndpointSpec]) -> Self {
        Self {
            entries: specs
                .iter()
                .map(|spec| (spec.id().clone(), CachedState::default()))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, id: &EndpointId) -> Option<&CachedState> {
        self.entries.get(id)
    }

    pub fn commit(
        &mut self,
        id: &EndpointId,
        payload: Arc<Payload>,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) {
        info!("💾 Cache STORE: {} (fingerprint {})", id, fingerprint);
        self.entries
            .entry(id.clone())
            .or_default()
            .commit(payload, fingerprint, now);
    }

    pub fn mark_unchanged(&mut self, id: &EndpointId) {
        debug!("🎯 Cache UNCHANGED: {}", id);
        if let Some(entry) = self.entries.get_mut(id) {
            entry.mark_unchanged();
        }
    }

    pub fn mark_error(&mut self, id: &EndpointId, error: String) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.mark_error(error);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EndpointId, &CachedState)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let total_entries = self.entries.len();
        let populated_entries = self.entries.values().filter(|e| e.has_payload()).count();
        let error_entries = self
            .entries
            .values()
            .filter(|e| matches!(e.fetch_status, FetchStatus::Error(_)))
            .count();
        let never_fetched = self
            .entries
            .values()
            .filter(|e| e.fetch_status == FetchStatus::Never)
            .count();

        CacheStats {
            total_entries,
            populated_entries,
            error_entries,
            never_fetched,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub populated_entries: usize,
    pub error_entries: usize,
    pub never_fetched: usize,
}
