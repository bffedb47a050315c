//! Maps attachment declarations onto canonical targets.

use crate::Snapshot;
use agw_policy_controller_core::{PolicyTarget, TargetKind};
use agw_policy_controller_k8s_api::{
    self as k8s,
    policy::{traffic::PolicyPhase, AgentgatewayPolicySpec, LocalPolicyTargetRef},
};

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unsupported target kind {0}")]
    UnsupportedKind(String),

    #[error("target not found: Service {namespace}/{name} has no port named {port}")]
    PortNotFound {
        namespace: String,
        name: String,
        port: String,
    },

    #[error("target not found: Service {namespace}/{name}")]
    ServiceNotFound { namespace: String, name: String },

    #[error("target not found: Gateway {namespace}/{name} has no listener named {listener}")]
    ListenerNotFound {
        namespace: String,
        name: String,
        listener: String,
    },

    #[error("target not found: AgentgatewayBackend {namespace}/{name} has no section named {section}")]
    SectionNotFound {
        namespace: String,
        name: String,
        section: String,
    },

    #[error("invalid port {0}")]
    InvalidPort(String),

    #[error("Only one Kind of targetRef can be set on one policy")]
    MixedKinds,
}

/// A category that may not be used with the declaration's target kind.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum RestrictionError {
    #[error("the 'frontend' field can only target a Gateway")]
    Frontend,

    #[error("the 'traffic' field can only target a Gateway or HTTPRoute")]
    Traffic,

    #[error("the 'traffic.phase=PreRouting' field can only target a Gateway")]
    PreRouting,

    #[error("backend.{0} may not be used with a Service target")]
    ServiceBackend(&'static str),

    #[error("backend.{0} requires an AgentgatewayBackend target")]
    NotBackend(&'static str),

    #[error("At least one of traffic, frontend, or backend must be provided.")]
    Empty,
}

/// Expands a policy's `targetRefs`, then its `targetSelectors`, into concrete
/// references. Selectors match resources in the policy's namespace, in name
/// order.
pub fn declarations(
    snapshot: &Snapshot,
    namespace: &str,
    spec: &AgentgatewayPolicySpec,
) -> Vec<LocalPolicyTargetRef> {
    let mut refs = spec.target_refs.clone();
    for selector in &spec.target_selectors {
        let labels = k8s::labels::Selector {
            match_labels: selector.match_labels.clone(),
        };
        let names = snapshot.select_targets(&selector.group, &selector.kind, namespace, &labels);
        refs.extend(names.into_iter().map(|n| selector.to_target_ref(n)));
    }
    refs
}

/// Resolves a declaration against the snapshot.
pub fn resolve_target(
    snapshot: &Snapshot,
    namespace: &str,
    target_ref: &LocalPolicyTargetRef,
) -> Result<PolicyTarget, ResolveError> {
    let LocalPolicyTargetRef {
        group,
        kind,
        name,
        section_name,
    } = target_ref;

    let target = match (group.as_str(), kind.as_str()) {
        (k8s::GATEWAY_GROUP, "Gateway") => {
            // A missing Gateway is reported when its ancestors are resolved.
            let listeners = snapshot.gateway(namespace, name).map(|gw| &gw.listeners);
            if let (Some(listeners), Some(listener)) = (listeners, section_name) {
                if !listeners.contains(listener) {
                    return Err(ResolveError::ListenerNotFound {
                        namespace: namespace.to_string(),
                        name: name.clone(),
                        listener: listener.clone(),
                    });
                }
            }
            PolicyTarget::Gateway {
                namespace: namespace.to_string(),
                name: name.clone(),
                listener: section_name.clone(),
            }
        }
        (k8s::GATEWAY_GROUP, "HTTPRoute") => PolicyTarget::Route {
            namespace: namespace.to_string(),
            name: name.clone(),
            kind: kind.clone(),
            rule: section_name.clone(),
        },
        (k8s::AGENTGATEWAY_GROUP, "AgentgatewayBackend") => {
            let sections = snapshot.backend(namespace, name).map(|b| &b.sections);
            if let (Some(sections), Some(section)) = (sections, section_name) {
                if !sections.contains(section) {
                    return Err(ResolveError::SectionNotFound {
                        namespace: namespace.to_string(),
                        name: name.clone(),
                        section: section.clone(),
                    });
                }
            }
            PolicyTarget::Backend {
                namespace: namespace.to_string(),
                name: name.clone(),
                section: section_name.clone(),
            }
        }
        ("" | "core", "Service") => PolicyTarget::Service {
            namespace: namespace.to_string(),
            hostname: snapshot.cluster_info().service_hostname(namespace, name),
            port: section_name
                .as_deref()
                .map(|section| service_port(snapshot, namespace, name, section))
                .transpose()?,
        },
        _ => return Err(ResolveError::UnsupportedKind(target_ref.canonical_kind())),
    };
    Ok(target)
}

/// A numeric section is the port itself; otherwise it names one of the
/// Service's ports.
fn service_port(
    snapshot: &Snapshot,
    namespace: &str,
    name: &str,
    section: &str,
) -> Result<u16, ResolveError> {
    if section.bytes().all(|b| b.is_ascii_digit()) {
        return match section.parse::<u16>() {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(ResolveError::InvalidPort(section.to_string())),
        };
    }

    let svc = snapshot
        .service(namespace, name)
        .ok_or_else(|| ResolveError::ServiceNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })?;
    svc.port_by_name(section)
        .ok_or_else(|| ResolveError::PortNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
            port: section.to_string(),
        })
}

/// Checks that every configured category may be attached to `kind`.
pub fn check_categories(spec: &AgentgatewayPolicySpec, kind: TargetKind) -> Vec<RestrictionError> {
    let mut errors = vec![];
    if spec.is_empty() {
        errors.push(RestrictionError::Empty);
        return errors;
    }

    let frontend = spec.frontend.as_ref().filter(|f| !f.is_empty());
    if frontend.is_some() && !kind.is_gateway() {
        errors.push(RestrictionError::Frontend);
    }

    if let Some(traffic) = spec.traffic.as_ref().filter(|t| !t.is_empty()) {
        if traffic.phase == Some(PolicyPhase::PreRouting) {
            if !kind.is_gateway() {
                errors.push(RestrictionError::PreRouting);
            }
        } else if !kind.is_gateway() && !kind.is_route() {
            errors.push(RestrictionError::Traffic);
        }
    }

    if let Some(backend) = &spec.backend {
        for (field, set) in [("mcp", backend.mcp.is_some()), ("ai", backend.ai.is_some())] {
            if !set {
                continue;
            }
            match kind {
                TargetKind::Backend | TargetKind::SubBackend => {}
                TargetKind::Service => errors.push(RestrictionError::ServiceBackend(field)),
                _ => errors.push(RestrictionError::NotBackend(field)),
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClusterInfo;
    use kubert::index::IndexNamespacedResource;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn target_ref(group: &str, kind: &str, name: &str, section: Option<&str>) -> LocalPolicyTargetRef {
        LocalPolicyTargetRef {
            group: group.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            section_name: section.map(Into::into),
        }
    }

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new(ClusterInfo::default());
        let svc: k8s::Service = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": { "namespace": "ns", "name": "web" },
            "spec": { "ports": [{ "name": "http", "port": 8080 }] },
        }))
        .expect("service must parse");
        snapshot.apply(svc);
        snapshot
    }

    #[rstest]
    #[case(
        target_ref("gateway.networking.k8s.io", "Gateway", "gw", None),
        TargetKind::Gateway
    )]
    #[case(
        target_ref("gateway.networking.k8s.io", "Gateway", "gw", Some("https")),
        TargetKind::Listener
    )]
    #[case(
        target_ref("gateway.networking.k8s.io", "HTTPRoute", "r", None),
        TargetKind::Route
    )]
    #[case(
        target_ref("gateway.networking.k8s.io", "HTTPRoute", "r", Some("rule1")),
        TargetKind::RouteRule
    )]
    #[case(
        target_ref("agentgateway.dev", "AgentgatewayBackend", "b", None),
        TargetKind::Backend
    )]
    #[case(
        target_ref("agentgateway.dev", "AgentgatewayBackend", "b", Some("openai")),
        TargetKind::SubBackend
    )]
    #[case(target_ref("", "Service", "web", Some("http")), TargetKind::Service)]
    fn resolves_kinds(#[case] tr: LocalPolicyTargetRef, #[case] kind: TargetKind) {
        let target = resolve_target(&snapshot(), "ns", &tr).expect("target must resolve");
        assert_eq!(target.kind(), kind);
    }

    #[test]
    fn service_port_by_name() {
        let target = resolve_target(&snapshot(), "ns", &target_ref("", "Service", "web", Some("http")))
            .expect("target must resolve");
        assert_eq!(
            target,
            PolicyTarget::Service {
                namespace: "ns".to_string(),
                hostname: "web.ns.svc.cluster.local".to_string(),
                port: Some(8080),
            }
        );
    }

    #[test]
    fn service_port_by_number() {
        let target = resolve_target(&snapshot(), "ns", &target_ref("", "Service", "api", Some("9090")))
            .expect("numeric ports need no lookup");
        assert_eq!(target.attachment_name(), ":ns/api.ns.svc.cluster.local/9090");
    }

    #[test]
    fn unknown_port_name_does_not_fall_back() {
        let err = resolve_target(&snapshot(), "ns", &target_ref("", "Service", "web", Some("grpc")))
            .expect_err("unknown port name must fail");
        assert_eq!(
            err,
            ResolveError::PortNotFound {
                namespace: "ns".to_string(),
                name: "web".to_string(),
                port: "grpc".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "target not found: Service ns/web has no port named grpc"
        );
    }

    #[test]
    fn unknown_sections_are_not_found() {
        let mut snapshot = snapshot();
        let gw: k8s::Gateway = serde_json::from_value(serde_json::json!({
            "apiVersion": "gateway.networking.k8s.io/v1beta1",
            "kind": "Gateway",
            "metadata": { "namespace": "ns", "name": "gw" },
            "spec": {
                "gatewayClassName": "agentgateway",
                "listeners": [{ "name": "http", "port": 8080, "protocol": "HTTP" }],
            },
        }))
        .expect("gateway must parse");
        snapshot.apply(gw);
        let backend: k8s::AgentgatewayBackend = serde_json::from_value(serde_json::json!({
            "apiVersion": "agentgateway.dev/v1alpha1",
            "kind": "AgentgatewayBackend",
            "metadata": { "namespace": "ns", "name": "tools" },
            "spec": { "mcp": { "targets": [{ "name": "search" }] } },
        }))
        .expect("backend must parse");
        snapshot.apply(backend);

        let gateway = |section| target_ref("gateway.networking.k8s.io", "Gateway", "gw", Some(section));
        let backend = |section| target_ref("agentgateway.dev", "AgentgatewayBackend", "tools", Some(section));

        assert!(resolve_target(&snapshot, "ns", &gateway("http")).is_ok());
        assert_eq!(
            resolve_target(&snapshot, "ns", &gateway("https"))
                .expect_err("unknown listener must fail")
                .to_string(),
            "target not found: Gateway ns/gw has no listener named https"
        );

        assert!(resolve_target(&snapshot, "ns", &backend("search")).is_ok());
        assert_eq!(
            resolve_target(&snapshot, "ns", &backend("fetch"))
                .expect_err("unknown section must fail")
                .to_string(),
            "target not found: AgentgatewayBackend ns/tools has no section named fetch"
        );
    }

    #[test]
    fn unsupported_kind() {
        let err = resolve_target(
            &snapshot(),
            "ns",
            &target_ref("gateway.networking.k8s.io", "GRPCRoute", "r", None),
        )
        .expect_err("GRPCRoute is not supported");
        assert_eq!(
            err.to_string(),
            "unsupported target kind GRPCRoute.gateway.networking.k8s.io"
        );
    }

    fn spec(value: serde_json::Value) -> AgentgatewayPolicySpec {
        serde_json::from_value(value).expect("spec must parse")
    }

    #[rstest]
    #[case(serde_json::json!({ "frontend": { "tcp": {} } }), TargetKind::Listener, vec![])]
    #[case(
        serde_json::json!({ "frontend": { "tcp": {} } }),
        TargetKind::Route,
        vec![RestrictionError::Frontend]
    )]
    #[case(serde_json::json!({ "traffic": { "retry": {} } }), TargetKind::RouteRule, vec![])]
    #[case(
        serde_json::json!({ "traffic": { "retry": {} } }),
        TargetKind::Service,
        vec![RestrictionError::Traffic]
    )]
    #[case(
        serde_json::json!({ "traffic": { "phase": "PreRouting", "transformation": {} } }),
        TargetKind::Route,
        vec![RestrictionError::PreRouting]
    )]
    #[case(
        serde_json::json!({ "backend": { "mcp": {} } }),
        TargetKind::RouteRule,
        vec![RestrictionError::NotBackend("mcp")]
    )]
    #[case(
        serde_json::json!({ "backend": { "ai": {}, "mcp": {} } }),
        TargetKind::Service,
        vec![RestrictionError::ServiceBackend("mcp"), RestrictionError::ServiceBackend("ai")]
    )]
    #[case(serde_json::json!({ "backend": { "mcp": {} } }), TargetKind::SubBackend, vec![])]
    #[case(serde_json::json!({}), TargetKind::Gateway, vec![RestrictionError::Empty])]
    #[case(serde_json::json!({ "frontend": {} }), TargetKind::Gateway, vec![RestrictionError::Empty])]
    #[case(
        serde_json::json!({ "frontend": {}, "traffic": { "retry": {} } }),
        TargetKind::RouteRule,
        vec![]
    )]
    #[case(
        serde_json::json!({ "traffic": { "phase": "PreRouting" }, "backend": {} }),
        TargetKind::Gateway,
        vec![RestrictionError::Empty]
    )]
    fn category_restrictions(
        #[case] value: serde_json::Value,
        #[case] kind: TargetKind,
        #[case] expected: Vec<RestrictionError>,
    ) {
        assert_eq!(check_categories(&spec(value), kind), expected);
    }

    #[test]
    fn selectors_expand_in_name_order() {
        let mut snapshot = snapshot();
        for name in ["web-b", "web-a", "other"] {
            let app = if name == "other" { "other" } else { "web" };
            let svc: k8s::Service = serde_json::from_value(serde_json::json!({
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": { "namespace": "ns", "name": name, "labels": { "app": app } },
            }))
            .expect("service must parse");
            snapshot.apply(svc);
        }
        let spec = spec(serde_json::json!({
            "targetRefs": [{ "group": "gateway.networking.k8s.io", "kind": "Gateway", "name": "gw" }],
            "targetSelectors": [{ "kind": "Service", "matchLabels": { "app": "web" } }],
            "traffic": {},
        }));
        let names = declarations(&snapshot, "ns", &spec)
            .into_iter()
            .map(|tr| tr.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["gw", "web-a", "web-b"]);
    }
}
