use super::health::BridgeHealth;
use super::status::BridgeStatus;
use crate::bridge::sync::errors::FetchError;
use serde::{Deserialize, Serialize};

/// A decoded response from one monitored endpoint.
///
/// There is no "empty" variant: absence of data is always expressed as
/// `Option<Payload>` by the caller, so an all-zero status report is still data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Payload {
    Health(BridgeHealth),
    Status(BridgeStatus),
    Json(serde_json::Value),
}

impl Payload {
    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::Health(_) => PayloadKind::Health,
            Self::Status(_) => PayloadKind::Status,
            Self::Json(_) => PayloadKind::Json,
        }
    }

    #[must_use]
    pub const fn as_health(&self) -> Option<&BridgeHealth> {
        match self {
            Self::Health(health) => Some(health),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_status(&self) -> Option<&BridgeStatus> {
        match self {
            Self::Status(status) => Some(status),
            _ => None,
        }
    }
}

/// Decode contract for an endpoint's response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Health,
    Status,
    Json,
}

impl PayloadKind {
    /// Decode a raw response body into the payload shape this kind promises.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Decode` when the body is not JSON or does not
    /// match the expected shape.
    pub fn decode(self, body: &[u8]) -> Result<Payload, FetchError> {
        let decoded = match self {
            Self::Health => serde_json::from_slice(body).map(Payload::Health),
            Self::Status => serde_json::from_slice(body).map(Payload::Status),
            Self::Json => serde_json::from_slice(body).map(Payload::Json),
        };
        decoded.map_err(|e| FetchError::Decode(format!("{self:?} payload: {e}")))
    }
}
