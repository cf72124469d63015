use super::endpoint::EndpointId;
use super::snapshot::PublicSnapshot;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

/// Live subscription ids and their patterns
type Registry = Arc<Mutex<HashMap<String, String>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, String>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A consumer's view onto published snapshots.
///
/// Built on a `watch` channel, so a slow consumer skips intermediate
/// snapshots and always lands on the latest one. Dropping it deregisters it.
pub struct Subscription {
    pub id: String,
    pub pattern: String,
    receiver: watch::Receiver<Arc<PublicSnapshot>>,
    seen_versions: BTreeMap<EndpointId, u64>,
    registry: Registry,
}

impl Subscription {
    fn new(
        pattern: String,
        mut receiver: watch::Receiver<Arc<PublicSnapshot>>,
        registry: Registry,
    ) -> Self {
        let current = receiver.borrow_and_update().clone();
        let id = Uuid::new_v4().to_string();
        lock(&registry).insert(id.clone(), pattern.clone());
        let mut subscription = Self {
            id,
            pattern,
            receiver,
            seen_versions: BTreeMap::new(),
            registry,
        };
        subscription.remember(&current);
        subscription
    }

    /// Wait until a snapshot relevant to this subscription is published.
    ///
    /// `*` wakes on every publish; any other pattern only wakes when one of
    /// its matching endpoints changed. Returns `None` once the engine is gone.
    pub async fn changed(&mut self) -> Option<Arc<PublicSnapshot>> {
        loop {
            if self.receiver.changed().await.is_err() {
                return None;
            }
            let snapshot = self.receiver.borrow_and_update().clone();
            let relevant = self.pattern == "*" || self.has_new_matching_data(&snapshot);
            self.remember(&snapshot);
            if relevant {
                return Some(snapshot);
            }
        }
    }

    #[must_use]
    pub fn latest(&self) -> Arc<PublicSnapshot> {
        self.receiver.borrow().clone()
    }

    fn has_new_matching_data(&self, snapshot: &PublicSnapshot) -> bool {
        snapshot.endpoints.iter().any(|(id, entry)| {
            SubscriptionManager::pattern_matches(&self.pattern, id.as_str())
                && self.seen_versions.get(id) != Some(&entry.version)
        })
    }

    fn remember(&mut self, snapshot: &PublicSnapshot) {
        for (id, entry) in &snapshot.endpoints {
            self.seen_versions.insert(id.clone(), entry.version);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.id);
    }
}

/// Owns the publishing side of the snapshot channel and tracks who listens
pub struct SubscriptionManager {
    sender: watch::Sender<Arc<PublicSnapshot>>,
    subscriptions: Registry,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(PublicSnapshot::initial()));
        Self {
            sender,
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn current(&self) -> Arc<PublicSnapshot> {
        self.sender.borrow().clone()
    }

    /// Publish `snapshot` if it differs from the current one, stamping the
    /// next revision. Returns whether anything was published.
    pub fn publish(&self, mut snapshot: PublicSnapshot) -> bool {
        self.sender.send_if_modified(|current| {
            if !snapshot.differs_from(current) {
                return false;
            }
            snapshot.revision = current.revision + 1;
            *current = Arc::new(snapshot);
            true
        })
    }

    #[must_use]
    pub fn subscribe(&self, pattern: String) -> Subscription {
        Subscription::new(pattern, self.sender.subscribe(), Arc::clone(&self.subscriptions))
    }

    pub(crate) fn pattern_matches(pattern: &str, endpoint: &str) -> bool {
        if pattern == "*" || pattern == endpoint {
            return true;
        }

        // Prefix patterns: "queue:*" matches "queue:outbound"
        if let Some(prefix) = pattern.strip_suffix('*') {
            return endpoint.starts_with(prefix);
        }

        false
    }

    /// Subscriptions that have not been dropped yet
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        lock(&self.subscriptions).len()
    }
}
