/**
 * Error taxonomy for endpoint fetches and poll cycles, plus helpers for
 * engine lifecycle errors
 */
use super::endpoint::EndpointId;
use crate::error::Error;

/// Why a single endpoint fetch produced no payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("malformed payload: {0}")]
    Decode(String),

    #[error("transport failure{}: {message}", status_suffix(.status_code))]
    Transport {
        status_code: Option<u16>,
        message: String,
    },

    /// Intentional abort; never surfaced and never counted as a failure
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status_code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn http_status(status_code: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status_code: Some(status_code),
            message: message.into(),
        }
    }
}

#[allow(clippy::ref_option)]
fn status_suffix(status_code: &Option<u16>) -> String {
    status_code.map_or_else(String::new, |code| format!(" (HTTP {code})"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    pub endpoint: EndpointId,
    pub error: FetchError,
}

/// Cycle-level outcome that is not a success
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CycleError {
    /// Every endpoint failed with a real error this cycle
    #[error("all {} endpoints failed: {}", .0.len(), describe_failures(.0))]
    AllFailed(Vec<EndpointFailure>),

    /// The engine stopped while the cycle was running
    #[error("cycle cancelled")]
    Cancelled,
}

impl CycleError {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn describe_failures(failures: &[EndpointFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.endpoint, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Create an `AlreadyStarted` error for engine `component`s
#[must_use]
pub fn already_started_error(component: &str) -> Error {
    Error::Custom(format!("{component} already started"))
}

/// Create an error for an engine that has been stopped and cannot be reused
#[must_use]
pub fn engine_stopped_error(component: &str) -> Error {
    Error::Custom(format!("{component} has been stopped"))
}

/// Create an `InvalidConfig` error for rejected settings
#[must_use]
pub fn invalid_config_error(message: &str) -> Error {
    Error::Custom(format!("invalid configuration: {message}"))
}
