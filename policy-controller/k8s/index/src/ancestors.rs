//! Determines the resources against which a declaration reports status.

use crate::Snapshot;
use agw_policy_controller_core::AncestorRef;
use agw_policy_controller_k8s_api::{self as k8s, policy::LocalPolicyTargetRef};
use std::collections::BTreeSet;

/// The ancestors of one declaration. When resolution fails, `refs` holds the
/// declaration itself and `error` says why it is not attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ancestors {
    pub refs: Vec<AncestorRef>,
    pub error: Option<String>,
}

pub fn resolve_ancestors(
    snapshot: &Snapshot,
    namespace: &str,
    target_ref: &LocalPolicyTargetRef,
) -> Ancestors {
    let fallback = AncestorRef::new(&target_ref.group, &target_ref.kind, namespace, &target_ref.name);
    let not_found = |kind: &str| Ancestors {
        refs: vec![fallback.clone()],
        error: Some(format!(
            "Policy is not attached: {kind} {namespace}/{} not found",
            target_ref.name
        )),
    };

    match (target_ref.group.as_str(), target_ref.kind.as_str()) {
        (k8s::GATEWAY_GROUP, "Gateway") => {
            if snapshot.gateway(namespace, &target_ref.name).is_none() {
                return not_found("Gateway");
            }
        }

        (k8s::AGENTGATEWAY_GROUP, "AgentgatewayBackend") => {
            if snapshot.backend(namespace, &target_ref.name).is_none() {
                return not_found("AgentgatewayBackend");
            }
        }

        (k8s::GATEWAY_GROUP, "HTTPRoute") => {
            let Some(route) = snapshot.route(namespace, &target_ref.name) else {
                return not_found("HTTPRoute");
            };

            // Report against each distinct parent Gateway, ignoring sections.
            let parents = route
                .parents
                .iter()
                .filter(|p| {
                    p.group.as_deref().unwrap_or(k8s::GATEWAY_GROUP) == k8s::GATEWAY_GROUP
                        && p.kind.as_deref().unwrap_or("Gateway") == "Gateway"
                })
                .map(|p| (p.namespace.as_deref().unwrap_or(namespace), p.name.as_str()))
                .collect::<BTreeSet<_>>();
            if parents.is_empty() {
                return Ancestors {
                    refs: vec![fallback],
                    error: Some(format!(
                        "Policy is not attached: HTTPRoute {namespace}/{} has no Gateway parentRefs",
                        target_ref.name
                    )),
                };
            }

            let mut refs = parents
                .into_iter()
                .map(|(ns, name)| AncestorRef::new(k8s::GATEWAY_GROUP, "Gateway", ns, name))
                .collect::<Vec<_>>();
            refs.sort_by_key(ToString::to_string);
            return Ancestors { refs, error: None };
        }

        _ => {}
    }

    Ancestors {
        refs: vec![fallback],
        error: None,
    }
}
