use super::orchestrator::{CycleResult, EndpointOutcome};

/// Counters for monitoring how the engine is doing
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncMetrics {
    pub total_cycles: u64,
    pub successful_cycles: u64,
    pub failed_cycles: u64,
    pub cancelled_cycles: u64,
    pub manual_triggers: u64,
    pub coalesced_triggers: u64,
    pub updated_payloads: u64,
    pub unchanged_payloads: u64,
    pub endpoint_failures: u64,
}

impl SyncMetrics {
    pub fn record_cycle(&mut self, result: &CycleResult) {
        self.total_cycles += 1;
        if result.is_success() {
            self.successful_cycles += 1;
        } else if result.is_cancelled() {
            self.cancelled_cycles += 1;
        } else {
            self.failed_cycles += 1;
        }

        for outcome in result.per_endpoint.values() {
            match outcome {
                EndpointOutcome::Updated(_) => self.updated_payloads += 1,
                EndpointOutcome::Unchanged => self.unchanged_payloads += 1,
                EndpointOutcome::Failed(e) if !e.is_cancelled() => self.endpoint_failures += 1,
                EndpointOutcome::Failed(_) => {}
            }
        }
    }

    /// Share of non-cancelled cycles that succeeded (0.0 to 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let total = self.successful_cycles + self.failed_cycles;
        if total == 0 {
            0.0
        } else {
            self.successful_cycles as f64 / total as f64
        }
    }
}
