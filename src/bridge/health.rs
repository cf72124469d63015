//! Payload served by the bridge's `/health` endpoint.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    #[serde(other)]
    Unknown,
}

/// Connectivity and buffer occupancy as reported by the bridge.
///
/// Both maps are keyed by name and ordered, so two payloads that only differ
/// in the order the bridge emitted their keys compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeHealth {
    pub status: HealthStatus,
    /// Subsystem name (`mqtt`, `cloud`, ...) to "currently connected"
    pub connectivity: BTreeMap<String, bool>,
    /// Buffer or queue name to occupancy percentage (0.0 - 100.0)
    #[serde(default)]
    pub utilization: BTreeMap<String, f64>,
}

impl BridgeHealth {
    #[must_use]
    pub fn is_fully_connected(&self) -> bool {
        self.connectivity.values().all(|connected| *connected)
    }

    #[must_use]
    pub fn disconnected_subsystems(&self) -> Vec<&str> {
        self.connectivity
            .iter()
            .filter(|(_, connected)| !**connected)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// The fullest buffer, if the bridge reported any
    #[must_use]
    pub fn max_utilization(&self) -> Option<(&str, f64)> {
        self.utilization
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(name, percent)| (name.as_str(), *percent))
    }
}
