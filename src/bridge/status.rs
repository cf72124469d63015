//! Process counters served by the bridge's `/status` endpoint.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss: u64,
    pub heap_total: u64,
    pub heap_used: u64,
    #[serde(default)]
    pub external: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCounters {
    pub received: u64,
    pub published: u64,
    pub failed: u64,
    #[serde(default)]
    pub commands: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    /// Seconds since the bridge process started
    pub uptime: f64,
    pub memory: MemoryUsage,
    pub messages: MessageCounters,
    #[serde(default)]
    pub dead_letter_count: u64,
    #[serde(default)]
    pub circuit_breaker_open: bool,
}

impl BridgeStatus {
    /// Share of attempted publishes that failed (0.0 - 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn failure_ratio(&self) -> f64 {
        let attempted = self.messages.published + self.messages.failed;
        if attempted == 0 {
            0.0
        } else {
            self.messages.failed as f64 / attempted as f64
        }
    }
}
