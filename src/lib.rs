//! Status synchronization for an MQTT-to-cloud water-quality bridge.
//!
//! [`bridge::sync::SyncEngine`] polls the bridge's health and status
//! endpoints, merges them into one [`bridge::sync::PublicSnapshot`], holds
//! the last good data through outages, and slows down while the bridge is
//! unreachable.
pub mod bridge;
pub mod error;
pub mod monitor;

pub use bridge::sync::{PublicSnapshot, SyncConfig, SyncEngine};
pub use error::{Error, Result};
