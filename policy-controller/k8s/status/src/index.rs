use crate::aggregate::aggregate;
use agw_policy_controller_core::Outcome;
use agw_policy_controller_k8s_api::{
    self as k8s, AgentgatewayPolicy, BackendTlsPolicy, PolicyStatus, Resource,
};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use prometheus_client::{metrics::counter::Counter, registry::Registry};
use std::{fmt, sync::Arc};
use tokio::{
    sync::mpsc::{error::TrySendError, Receiver, Sender},
    time::{self, Duration},
};

pub type SharedIndex = Arc<RwLock<Index>>;

/// The policy resource types whose status this controller writes.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum PolicyResource {
    AgentgatewayPolicy,
    BackendTlsPolicy,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PolicyRef {
    pub resource: PolicyResource,
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, PartialEq)]
pub struct Update {
    pub id: PolicyRef,
    pub patch: k8s::Patch<serde_json::Value>,
}

/// Remembers the last status sent for each policy so that unchanged statuses
/// are not patched again.
pub struct Index {
    controller_name: String,
    updates: Sender<Update>,
    sent: HashMap<PolicyRef, PolicyStatus>,
    metrics: IndexMetrics,
}

#[derive(Clone, Debug)]
pub struct IndexMetrics {
    patches_enqueued: Counter,
    patch_channel_full: Counter,
}

pub struct Controller {
    client: k8s::Client,
    field_manager: String,
    updates: Receiver<Update>,
    index: SharedIndex,
    patch_timeout: Duration,
    metrics: ControllerMetrics,
}

#[derive(Clone, Debug)]
pub struct ControllerMetrics {
    patch_succeeded: Counter,
    patch_failed: Counter,
    patch_timeout: Counter,
}

// === impl PolicyRef ===

impl PolicyRef {
    pub fn new(resource: PolicyResource, namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            resource,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.resource, self.namespace, self.name)
    }
}

// === impl PolicyResource ===

impl PolicyResource {
    fn api_version(&self) -> std::borrow::Cow<'static, str> {
        match self {
            Self::AgentgatewayPolicy => AgentgatewayPolicy::api_version(&()),
            Self::BackendTlsPolicy => BackendTlsPolicy::api_version(&()),
        }
    }
}

impl fmt::Display for PolicyResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::AgentgatewayPolicy => AgentgatewayPolicy::kind(&()),
            Self::BackendTlsPolicy => BackendTlsPolicy::kind(&()),
        };
        f.write_str(&kind)
    }
}

// === impl IndexMetrics ===

impl IndexMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let patches_enqueued = Counter::default();
        prom.register(
            "patches_enqueued",
            "Number of status patches enqueued for the controller",
            patches_enqueued.clone(),
        );

        let patch_channel_full = Counter::default();
        prom.register(
            "patch_channel_full",
            "Number of status patches dropped because the update queue was full",
            patch_channel_full.clone(),
        );

        Self {
            patches_enqueued,
            patch_channel_full,
        }
    }
}

// === impl Index ===

impl Index {
    pub fn shared(
        controller_name: impl ToString,
        updates: Sender<Update>,
        metrics: IndexMetrics,
    ) -> SharedIndex {
        Arc::new(RwLock::new(Self {
            controller_name: controller_name.to_string(),
            updates,
            sent: HashMap::new(),
            metrics,
        }))
    }

    /// Aggregates `outcomes` into a status for `id` and enqueues a patch if
    /// it differs from both the resource's `current` status and the last
    /// status sent. Returns whether a patch was enqueued.
    pub fn report(
        &mut self,
        id: PolicyRef,
        generation: Option<i64>,
        current: Option<&PolicyStatus>,
        outcomes: &[Outcome],
    ) -> bool {
        let status = aggregate(&self.controller_name, generation, current, outcomes, now());

        if current == Some(&status) {
            self.sent.insert(id, status);
            return false;
        }
        if self.sent.get(&id) == Some(&status) {
            tracing::trace!(%id, "Status patch already sent");
            return false;
        }

        let patch = make_patch(&id, &status);
        match self.updates.try_send(Update {
            id: id.clone(),
            patch,
        }) {
            Ok(()) => {
                tracing::debug!(%id, "Enqueued status patch");
                self.metrics.patches_enqueued.inc();
                self.sent.insert(id, status);
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%id, "Status update queue full; will retry on the next reconciliation");
                self.metrics.patch_channel_full.inc();
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!(%id, "Status controller has stopped");
                false
            }
        }
    }

    /// Forgets the status last sent for `id` so that the next report patches
    /// it again.
    pub fn forget(&mut self, id: &PolicyRef) {
        self.sent.remove(id);
    }

    /// Drops state for policies that no longer exist.
    pub fn retain(&mut self, live: &HashSet<PolicyRef>) {
        self.sent.retain(|id, _| live.contains(id));
    }
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let patch_succeeded = Counter::default();
        prom.register(
            "patch_succeeded",
            "Counter patches successfully applied to policy resources",
            patch_succeeded.clone(),
        );

        let patch_failed = Counter::default();
        prom.register(
            "patch_failed",
            "Counter patches that failed to apply to policy resources",
            patch_failed.clone(),
        );

        let patch_timeout = Counter::default();
        prom.register(
            "patch_timeout",
            "Counter patches that timed out while being applied to policy resources",
            patch_timeout.clone(),
        );

        Self {
            patch_succeeded,
            patch_failed,
            patch_timeout,
        }
    }
}

// === impl Controller ===

impl Controller {
    pub fn new(
        client: k8s::Client,
        field_manager: impl ToString,
        updates: Receiver<Update>,
        index: SharedIndex,
        patch_timeout: Duration,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            client,
            field_manager: field_manager.to_string(),
            updates,
            index,
            patch_timeout,
            metrics,
        }
    }

    pub async fn run(mut self) {
        let params = k8s::PatchParams::apply(&self.field_manager);

        while let Some(Update { id, patch }) = self.updates.recv().await {
            let patched = match id.resource {
                PolicyResource::AgentgatewayPolicy => {
                    let api = k8s::Api::<AgentgatewayPolicy>::namespaced(
                        self.client.clone(),
                        &id.namespace,
                    );
                    time::timeout(self.patch_timeout, api.patch_status(&id.name, &params, &patch))
                        .await
                        .map(|res| res.map(drop))
                }
                PolicyResource::BackendTlsPolicy => {
                    let api = k8s::Api::<BackendTlsPolicy>::namespaced(
                        self.client.clone(),
                        &id.namespace,
                    );
                    time::timeout(self.patch_timeout, api.patch_status(&id.name, &params, &patch))
                        .await
                        .map(|res| res.map(drop))
                }
            };

            match patched {
                Ok(Ok(())) => {
                    tracing::debug!(%id, "Patched status");
                    self.metrics.patch_succeeded.inc();
                }
                Ok(Err(error)) => {
                    tracing::error!(%id, %error, "Failed to patch status");
                    self.metrics.patch_failed.inc();
                    self.index.write().forget(&id);
                }
                Err(_) => {
                    tracing::error!(%id, timeout = ?self.patch_timeout, "Timed out patching status");
                    self.metrics.patch_timeout.inc();
                    self.index.write().forget(&id);
                }
            }
        }
    }
}

fn now() -> DateTime<Utc> {
    #[cfg(not(test))]
    let timestamp = Utc::now();
    #[cfg(test)]
    let timestamp = DateTime::<Utc>::MIN_UTC;
    timestamp
}

pub(crate) fn make_patch(id: &PolicyRef, status: &PolicyStatus) -> k8s::Patch<serde_json::Value> {
    let value = serde_json::json!({
        "apiVersion": id.resource.api_version(),
        "kind": id.resource.to_string(),
        "status": status,
    });
    k8s::Patch::Merge(value)
}
