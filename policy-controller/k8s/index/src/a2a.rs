//! Marks Service ports that speak the agent-to-agent protocol.

use crate::Snapshot;
use agw_policy_controller_core::{
    policy::BackendPolicy, PolicyKind, PolicyTarget, TypedResource, WirePolicy,
};

pub const A2A_APP_PROTOCOL: &str = "kgateway.dev/a2a";

/// Emits one policy per Service port whose `appProtocol` is
/// [`A2A_APP_PROTOCOL`], in namespace, name, and port order.
pub fn translate(snapshot: &Snapshot) -> Vec<WirePolicy> {
    let mut policies = vec![];
    for (namespace, name, svc) in snapshot.services() {
        for port in &svc.ports {
            if port.app_protocol.as_deref() != Some(A2A_APP_PROTOCOL) {
                continue;
            }
            tracing::debug!(%namespace, %name, port = port.port, "Found A2A service");
            policies.push(WirePolicy {
                key: format!("a2a/{namespace}/{name}/{}", port.port),
                name: Some(TypedResource::new("Service", namespace, name)),
                target: PolicyTarget::Service {
                    namespace: namespace.to_string(),
                    hostname: snapshot.cluster_info().service_hostname(namespace, name),
                    port: Some(port.port),
                },
                kind: PolicyKind::Backend(BackendPolicy::A2a),
            });
        }
    }
    policies
}
