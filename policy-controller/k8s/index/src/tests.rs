use super::*;
use agw_policy_controller_core::AncestorRef;
use agw_policy_controller_k8s_api::{
    self as k8s, AgentgatewayBackend, AgentgatewayPolicy, BackendTlsPolicy, ConfigMap, Gateway,
    HttpRoute, Secret, Service,
};
use kubert::index::IndexNamespacedResource;
use maplit::btreemap;
use serde_json::json;
use std::collections::BTreeMap;

mod backend_tls_policy;
mod traffic;

struct TestConfig {
    index: SharedSnapshot,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            index: Snapshot::shared(ClusterInfo::default()),
        }
    }
}

impl TestConfig {
    fn apply<T>(&self, resource: T)
    where
        Snapshot: IndexNamespacedResource<T>,
    {
        self.index.write().apply(resource);
    }

    fn translate(&self, policy: &AgentgatewayPolicy) -> PolicyTranslation {
        translate_policy(&self.index.read(), policy)
    }

    fn translate_backend_tls(&self, policy: &BackendTlsPolicy) -> PolicyTranslation {
        translate_backend_tls(&self.index.read(), policy)
    }
}

fn mk_gateway(ns: &str, name: &str, listeners: &[&str]) -> Gateway {
    let listeners = listeners
        .iter()
        .map(|l| json!({ "name": l, "port": 8080, "protocol": "HTTP" }))
        .collect::<Vec<_>>();
    let gateway: Gateway = serde_json::from_value(json!({
        "apiVersion": "gateway.networking.k8s.io/v1beta1",
        "kind": "Gateway",
        "metadata": { "namespace": ns, "name": name },
        "spec": {
            "gatewayClassName": "agentgateway",
            "listeners": listeners,
        },
    }))
    .expect("gateway must parse");
    gateway
}

/// A route whose parents are Gateways in the route's namespace.
fn mk_route(ns: &str, name: &str, parents: &[&str]) -> HttpRoute {
    let parents = parents
        .iter()
        .map(|p| json!({ "group": k8s::GATEWAY_GROUP, "kind": "Gateway", "name": p }))
        .collect::<Vec<_>>();
    let route: HttpRoute = serde_json::from_value(json!({
        "apiVersion": "gateway.networking.k8s.io/v1beta1",
        "kind": "HTTPRoute",
        "metadata": { "namespace": ns, "name": name },
        "spec": { "parentRefs": parents },
    }))
    .expect("route must parse");
    route
}

fn mk_service(ns: &str, name: &str, ports: &[(&str, u16)]) -> Service {
    let ports = ports
        .iter()
        .map(|(name, port)| json!({ "name": name, "port": port }))
        .collect::<Vec<_>>();
    let svc: Service = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": { "namespace": ns, "name": name },
        "spec": { "ports": ports },
    }))
    .expect("service must parse");
    svc
}

fn mk_backend(ns: &str, name: &str, spec: serde_json::Value) -> AgentgatewayBackend {
    let backend: AgentgatewayBackend = serde_json::from_value(json!({
        "apiVersion": "agentgateway.dev/v1alpha1",
        "kind": "AgentgatewayBackend",
        "metadata": { "namespace": ns, "name": name },
        "spec": spec,
    }))
    .expect("backend must parse");
    backend
}

fn mk_secret(
    ns: &str,
    name: &str,
    labels: BTreeMap<&str, &str>,
    data: BTreeMap<&str, &str>,
) -> Secret {
    let secret: Secret = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": { "namespace": ns, "name": name, "labels": labels },
        "stringData": data,
    }))
    .expect("secret must parse");
    secret
}

fn mk_config_map(
    ns: &str,
    name: &str,
    jwks_uri: Option<&str>,
    data: BTreeMap<&str, &str>,
) -> ConfigMap {
    let annotations = jwks_uri
        .map(|uri| btreemap! { "agentgateway.dev/jwks-uri" => uri })
        .unwrap_or_default();
    let cm: ConfigMap = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": { "namespace": ns, "name": name, "annotations": annotations },
        "data": data,
    }))
    .expect("config map must parse");
    cm
}

fn mk_policy(ns: &str, name: &str, spec: serde_json::Value) -> AgentgatewayPolicy {
    let policy: AgentgatewayPolicy = serde_json::from_value(json!({
        "apiVersion": "agentgateway.dev/v1alpha1",
        "kind": "AgentgatewayPolicy",
        "metadata": { "namespace": ns, "name": name, "generation": 1 },
        "spec": spec,
    }))
    .expect("policy must parse");
    policy
}

fn mk_backend_tls_policy(
    ns: &str,
    name: &str,
    created: &str,
    spec: serde_json::Value,
) -> BackendTlsPolicy {
    let policy: BackendTlsPolicy = serde_json::from_value(json!({
        "apiVersion": "gateway.networking.k8s.io/v1",
        "kind": "BackendTLSPolicy",
        "metadata": { "namespace": ns, "name": name, "creationTimestamp": created },
        "spec": spec,
    }))
    .expect("backend tls policy must parse");
    policy
}

fn gateway_target(name: &str) -> serde_json::Value {
    json!({ "group": k8s::GATEWAY_GROUP, "kind": "Gateway", "name": name })
}

fn route_target(name: &str) -> serde_json::Value {
    json!({ "group": k8s::GATEWAY_GROUP, "kind": "HTTPRoute", "name": name })
}

fn gateway_ancestor(ns: &str, name: &str) -> AncestorRef {
    AncestorRef::new(k8s::GATEWAY_GROUP, "Gateway", ns, name)
}

#[test]
fn key_sets_survive_the_removal_of_a_duplicate() {
    const URI: &str = "http://idp.default.svc.cluster.local:8443/keys";
    let test = TestConfig::default();
    test.apply(mk_config_map("default", "jwks-b", Some(URI), btreemap! { "jwks" => "b" }));
    test.apply(mk_config_map("default", "jwks-a", Some(URI), btreemap! { "jwks" => "a" }));
    assert_eq!(test.index.read().jwks(URI), Some("a"));

    <Snapshot as IndexNamespacedResource<ConfigMap>>::delete(
        &mut test.index.write(),
        "default".to_string(),
        "jwks-a".to_string(),
    );
    assert_eq!(test.index.read().jwks(URI), Some("b"));

    // Dropping the annotation withdraws the last owner.
    test.apply(mk_config_map("default", "jwks-b", None, btreemap! { "jwks" => "b" }));
    assert_eq!(test.index.read().jwks(URI), None);
}
