pub mod cached_state;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod errors;
pub mod fallback_cache;
pub mod fingerprint;
pub mod metrics;
pub mod orchestrator;
pub mod scheduler;
pub mod snapshot;
pub mod subscription;

pub use cached_state::{CachedState, FetchStatus};
pub use config::SyncConfig;
pub use endpoint::{EndpointFetcher, EndpointId, EndpointSpec, HttpFetcher};
pub use engine::{SyncEngine, Trigger};
pub use errors::{CycleError, EndpointFailure, FetchError};
pub use fallback_cache::{CacheStats, FallbackCache};
pub use fingerprint::{Change, Fingerprint, dedupe};
pub use metrics::SyncMetrics;
pub use orchestrator::{CycleResult, EndpointOutcome, run_cycle};
pub use scheduler::{BackoffTracker, SchedulerState};
pub use snapshot::{EndpointEntry, PublicSnapshot};
pub use subscription::{Subscription, SubscriptionManager};
