//! Content fingerprints and the change detector built on them.
//!
//! A fingerprint is the SHA-256 of a canonical JSON rendering: object keys are
//! sorted at every level and no whitespace is emitted. Two payloads that only
//! differ in key order therefore share a fingerprint, whatever map ordering
//! the decoder happened to use.
use super::cached_state::CachedState;
use crate::bridge::payload::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn of(payload: &Payload) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => Self::of_value(&value),
            // Only reachable for payloads serde cannot represent as JSON
            Err(_) => Self::digest(format!("{payload:?}").as_bytes()),
        }
    }

    #[must_use]
    pub fn of_value(value: &Value) -> Self {
        let mut canonical = String::new();
        write_canonical(value, &mut canonical);
        Self::digest(canonical.as_bytes())
    }

    fn digest(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for logs
        f.write_str(self.0.get(..12).unwrap_or(&self.0))
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Verdict of the change detector for one freshly fetched payload
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Update {
        payload: Arc<Payload>,
        fingerprint: Fingerprint,
    },
    Unchanged,
}

/// Compare a new payload against what the cache last committed.
#[must_use]
pub fn dedupe(payload: Payload, cached: &CachedState) -> Change {
    let fingerprint = Fingerprint::of(&payload);
    if cached.last_fingerprint.as_ref() == Some(&fingerprint) {
        Change::Unchanged
    } else {
        Change::Update {
            payload: Arc::new(payload),
            fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::payload::PayloadKind;
    use chrono::Utc;
    use serde_json::{Map, json};

    #[test]
    fn test_key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": [1, 2], "x": null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": null, "y": [1, 2]}, "b": 1}"#).unwrap();
        // Decoded objects keep the wire order
        assert_ne!(a.to_string(), b.to_string());
        assert_eq!(Fingerprint::of_value(&a), Fingerprint::of_value(&b));
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut forward = Map::new();
        forward.insert("mqtt".to_string(), json!(true));
        forward.insert("cloud".to_string(), json!(false));
        let mut backward = Map::new();
        backward.insert("cloud".to_string(), json!(false));
        backward.insert("mqtt".to_string(), json!(true));

        let (forward, backward) = (Value::Object(forward), Value::Object(backward));
        assert_eq!(forward.to_string(), r#"{"mqtt":true,"cloud":false}"#);
        assert_eq!(backward.to_string(), r#"{"cloud":false,"mqtt":true}"#);
        assert_eq!(Fingerprint::of_value(&forward), Fingerprint::of_value(&backward));
    }

    #[test]
    fn test_payload_fingerprint_ignores_key_order() {
        let a = PayloadKind::Json.decode(br#"{"depth": 3, "queue": "outbound"}"#).unwrap();
        let b = PayloadKind::Json.decode(br#"{"queue": "outbound", "depth": 3}"#).unwrap();
        assert_ne!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_array_order_matters() {
        let a = json!({"items": [1, 2]});
        let b = json!({"items": [2, 1]});
        assert_ne!(Fingerprint::of_value(&a), Fingerprint::of_value(&b));
    }

    #[test]
    fn test_canonical_rendering() {
        let value = json!({"z": "q\"uote", "a": [true, 1.5]});
        assert_eq!(value.to_string(), r#"{"z":"q\"uote","a":[true,1.5]}"#);
        let mut out = String::new();
        write_canonical(&value, &mut out);
        assert_eq!(out, r#"{"a":[true,1.5],"z":"q\"uote"}"#);
    }

    #[test]
    fn test_dedupe_same_payload_twice() {
        let mut cached = CachedState::default();
        let payload = Payload::Json(json!({"status": "ok"}));

        let Change::Update { payload: first, fingerprint } = dedupe(payload.clone(), &cached) else {
            panic!("first sighting must be an update");
        };
        cached.commit(first, fingerprint, Utc::now());

        assert_eq!(dedupe(payload, &cached), Change::Unchanged);
    }

    #[test]
    fn test_zero_payload_is_still_data() {
        let cached = CachedState::default();
        let change = dedupe(Payload::Json(json!(0)), &cached);
        assert!(matches!(change, Change::Update { .. }));
    }
}
