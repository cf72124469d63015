use super::endpoint::EndpointId;
use super::fallback_cache::FallbackCache;
use super::fingerprint::Fingerprint;
use crate::bridge::health::BridgeHealth;
use crate::bridge::payload::Payload;
use crate::bridge::status::BridgeStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The last good payload of one endpoint as seen by consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointEntry {
    pub payload: Arc<Payload>,
    pub last_updated: DateTime<Utc>,
    pub fingerprint: Fingerprint,
    pub version: u64,
}

/// Immutable, point-in-time view of the merged endpoint state.
///
/// A new value is published for every change; holders of an older
/// `Arc<PublicSnapshot>` keep seeing exactly what they were handed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSnapshot {
    pub endpoints: BTreeMap<EndpointId, EndpointEntry>,
    pub last_update: Option<DateTime<Utc>>,
    pub loading: bool,
    pub error: Option<String>,
    /// Incremented on every publish
    pub revision: u64,
}

impl PublicSnapshot {
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            endpoints: BTreeMap::new(),
            last_update: None,
            loading: true,
            error: None,
            revision: 0,
        }
    }

    /// Rebuild the endpoint map from the fallback cache, carrying over the
    /// flags the cache does not know about.
    #[must_use]
    pub fn from_cache(
        cache: &FallbackCache,
        loading: bool,
        error: Option<String>,
        revision: u64,
    ) -> Self {
        let endpoints: BTreeMap<EndpointId, EndpointEntry> = cache
            .iter()
            .filter_map(|(id, state)| {
                let entry = EndpointEntry {
                    payload: state.last_payload.clone()?,
                    last_updated: state.last_updated?,
                    fingerprint: state.last_fingerprint.clone()?,
                    version: state.version,
                };
                Some((id.clone(), entry))
            })
            .collect();
        let last_update = endpoints.values().map(|e| e.last_updated).max();

        Self {
            endpoints,
            last_update,
            loading,
            error,
            revision,
        }
    }

    #[must_use]
    pub fn payload(&self, id: &str) -> Option<&Payload> {
        self.endpoints
            .get(&EndpointId::from(id))
            .map(|entry| entry.payload.as_ref())
    }

    /// First health report among the monitored endpoints
    #[must_use]
    pub fn health(&self) -> Option<&BridgeHealth> {
        self.endpoints.values().find_map(|e| e.payload.as_health())
    }

    /// First status report among the monitored endpoints
    #[must_use]
    pub fn status(&self) -> Option<&BridgeStatus> {
        self.endpoints.values().find_map(|e| e.payload.as_status())
    }

    /// Version of an endpoint's entry, 0 when it has never produced data
    #[must_use]
    pub fn version_of(&self, id: &EndpointId) -> u64 {
        self.endpoints.get(id).map_or(0, |e| e.version)
    }

    /// Whether publishing `self` after `previous` tells consumers anything new
    #[must_use]
    pub fn differs_from(&self, previous: &Self) -> bool {
        self.loading != previous.loading
            || self.error != previous.error
            || self.endpoints.len() != previous.endpoints.len()
            || self
                .endpoints
                .iter()
                .any(|(id, entry)| previous.version_of(id) != entry.version)
    }
}
