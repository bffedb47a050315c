use crate::core::WirePolicy;
use prometheus_client::{metrics::gauge::Gauge, registry::Registry};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::watch;

/// The full set of wire policies, keyed by policy key.
pub type WirePolicies = Arc<BTreeMap<String, WirePolicy>>;

/// Publishes the most recent set of translated wire policies.
///
/// Each update replaces the whole set, so policies that are no longer
/// produced are withdrawn. Subscribers are only notified when the set
/// changes.
#[derive(Clone, Debug)]
pub struct PolicySink {
    tx: Arc<watch::Sender<WirePolicies>>,
    emitted: Gauge,
}

impl PolicySink {
    pub fn new(prom: &mut Registry) -> Self {
        let emitted = Gauge::default();
        prom.register(
            "wire_policies",
            "Number of wire policies currently published",
            emitted.clone(),
        );

        let (tx, _) = watch::channel(WirePolicies::default());
        Self {
            tx: Arc::new(tx),
            emitted,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WirePolicies> {
        self.tx.subscribe()
    }

    /// Replaces the published set. Returns whether it changed.
    pub fn update(&self, policies: impl IntoIterator<Item = WirePolicy>) -> bool {
        let mut next = BTreeMap::new();
        for policy in policies {
            if let Some(prev) = next.insert(policy.key.clone(), policy) {
                tracing::warn!(key = %prev.key, "Duplicate wire policy key");
            }
        }
        self.emitted.set(next.len() as i64);

        self.tx.send_if_modified(|current| {
            if **current == next {
                return false;
            }
            *current = Arc::new(next);
            true
        })
    }
}
