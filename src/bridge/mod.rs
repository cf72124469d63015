pub mod client;
pub mod health;
pub mod payload;
pub mod status;
pub mod sync;

pub use health::{BridgeHealth, HealthStatus};
pub use payload::{Payload, PayloadKind};
pub use status::{BridgeStatus, MemoryUsage, MessageCounters};

/// Default user agent for `bridgewatch` - automatically uses the package version
///
/// All HTTP traffic to the bridge goes through `client::new`, which can be
/// overridden per call or via the `BRIDGEWATCH_USER_AGENT` environment variable.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
