use super::fingerprint::Fingerprint;
use crate::bridge::payload::Payload;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Last-known-good data for one endpoint.
///
/// `last_payload`, `last_fingerprint` and `last_updated` only move together,
/// through `commit`.
#[derive(Debug, Clone, Default)]
pub struct CachedState {
    pub last_payload: Option<Arc<Payload>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_fingerprint: Option<Fingerprint>,
    pub fetch_status: FetchStatus,
    pub version: u64, // bumped on every commit
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FetchStatus {
    #[default]
    Never,
    Fresh,
    Unchanged,
    Error(String),
}

impl CachedState {
    pub fn commit(&mut self, payload: Arc<Payload>, fingerprint: Fingerprint, now: DateTime<Utc>) {
        self.last_payload = Some(payload);
        self.last_fingerprint = Some(fingerprint);
        self.last_updated = Some(now);
        self.fetch_status = FetchStatus::Fresh;
        self.version += 1;
    }

    pub fn mark_unchanged(&mut self) {
        self.fetch_status = FetchStatus::Unchanged;
    }

    pub fn mark_error(&mut self, error: String) {
        self.fetch_status = FetchStatus::Error(error);
    }

    pub const fn has_payload(&self) -> bool {
        self.last_payload.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commit_moves_everything_together() {
        let mut state = CachedState::default();
        assert!(!state.has_payload());
        assert_eq!(state.fetch_status, FetchStatus::Never);

        let payload = Payload::Json(json!({"ok": true}));
        let fingerprint = Fingerprint::of(&payload);
        let now = Utc::now();
        state.commit(Arc::new(payload), fingerprint.clone(), now);

        assert!(state.has_payload());
        assert_eq!(state.last_fingerprint, Some(fingerprint));
        assert_eq!(state.last_updated, Some(now));
        assert_eq!(state.version, 1);
    }

    #[test]
    fn test_error_keeps_last_payload() {
        let mut state = CachedState::default();
        let payload = Payload::Json(json!(1));
        state.commit(Arc::new(payload.clone()), Fingerprint::of(&payload), Utc::now());

        state.mark_error("timeout".to_string());
        assert!(state.has_payload());
        assert_eq!(state.version, 1);
        assert!(matches!(state.fetch_status, FetchStatus::Error(_)));

        state.mark_unchanged();
        assert_eq!(state.fetch_status, FetchStatus::Unchanged);
    }
}
