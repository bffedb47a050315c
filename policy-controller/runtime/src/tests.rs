use crate::{
    index::{ClusterInfo, SharedSnapshot, Snapshot},
    k8s::{self, AgentgatewayPolicy, BackendTlsPolicy, Gateway, Service},
    status, PolicySink, Reconciled, Reconciler,
};
use kubert::index::IndexNamespacedResource;
use pretty_assertions::assert_eq;
use prometheus_client::registry::Registry;
use serde_json::json;
use tokio::sync::mpsc;

struct TestConfig {
    snapshot: SharedSnapshot,
    sink: PolicySink,
    updates: mpsc::Receiver<status::Update>,
    reconciler: Reconciler,
}

impl Default for TestConfig {
    fn default() -> Self {
        let mut prom = Registry::default();
        let snapshot = Snapshot::shared(ClusterInfo::default());
        let sink = PolicySink::new(&mut prom);
        let (tx, updates) = mpsc::channel(16);
        let status = status::Index::shared(
            crate::core::POLICY_CONTROLLER_NAME,
            tx,
            status::IndexMetrics::register(&mut prom),
        );
        let reconciler = Reconciler::new(snapshot.clone(), status, sink.clone());
        Self {
            snapshot,
            sink,
            updates,
            reconciler,
        }
    }
}

impl TestConfig {
    fn apply<T>(&self, resource: T)
    where
        Snapshot: IndexNamespacedResource<T>,
    {
        self.snapshot.write().apply(resource);
    }

    fn delete<T>(&self, namespace: &str, name: &str)
    where
        Snapshot: IndexNamespacedResource<T>,
    {
        <Snapshot as IndexNamespacedResource<T>>::delete(
            &mut self.snapshot.write(),
            namespace.to_string(),
            name.to_string(),
        );
    }

    fn updated(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.updates.try_recv().ok())
            .map(|update| update.id.to_string())
            .collect()
    }

    fn keys(&self) -> Vec<String> {
        self.sink.subscribe().borrow().keys().cloned().collect()
    }
}

fn mk_gateway(name: &str) -> Gateway {
    serde_json::from_value(json!({
        "apiVersion": "gateway.networking.k8s.io/v1beta1",
        "kind": "Gateway",
        "metadata": { "namespace": "default", "name": name },
        "spec": {
            "gatewayClassName": "agentgateway",
            "listeners": [{ "name": "http", "port": 8080, "protocol": "HTTP" }],
        },
    }))
    .expect("gateway must parse")
}

fn mk_agent_service(name: &str) -> Service {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": { "namespace": "default", "name": name },
        "spec": {
            "ports": [
                { "name": "a2a", "port": 9090, "appProtocol": "kgateway.dev/a2a" },
                { "name": "http", "port": 8080 },
            ],
        },
    }))
    .expect("service must parse")
}

fn mk_policy(name: &str, generation: i64) -> AgentgatewayPolicy {
    serde_json::from_value(json!({
        "apiVersion": "agentgateway.dev/v1alpha1",
        "kind": "AgentgatewayPolicy",
        "metadata": { "namespace": "default", "name": name, "generation": generation },
        "spec": {
            "targetRefs": [{ "group": k8s::GATEWAY_GROUP, "kind": "Gateway", "name": "gw" }],
            "traffic": { "timeouts": { "request": "5s" } },
        },
    }))
    .expect("policy must parse")
}

#[test]
fn publishes_policies_and_reports_status() {
    let mut test = TestConfig::default();
    test.apply(mk_gateway("gw"));
    test.apply(mk_agent_service("agent"));
    test.apply(mk_policy("pol", 1));

    assert_eq!(
        test.reconciler.reconcile(),
        Reconciled {
            wire_policies: 2,
            patches: 1,
        }
    );
    assert_eq!(
        test.keys(),
        vec![
            "a2a/default/agent/9090".to_string(),
            "traffic/default/pol:timeout:default/gw".to_string(),
        ]
    );
    assert_eq!(test.updated(), vec!["AgentgatewayPolicy default/pol"]);

    // Nothing changed, so nothing is patched again.
    assert_eq!(
        test.reconciler.reconcile(),
        Reconciled {
            wire_policies: 2,
            patches: 0,
        }
    );
    assert!(test.updated().is_empty());

    // A new generation changes every condition's observedGeneration.
    test.apply(mk_policy("pol", 2));
    assert_eq!(test.reconciler.reconcile().patches, 1);
    assert_eq!(test.updated(), vec!["AgentgatewayPolicy default/pol"]);
}

#[test]
fn deleted_policies_are_withdrawn() {
    let mut test = TestConfig::default();
    test.apply(mk_gateway("gw"));
    test.apply(mk_policy("pol", 1));
    test.reconciler.reconcile();
    assert_eq!(test.updated().len(), 1);

    test.delete::<AgentgatewayPolicy>("default", "pol");
    assert_eq!(
        test.reconciler.reconcile(),
        Reconciled {
            wire_policies: 0,
            patches: 0,
        }
    );
    assert!(test.keys().is_empty());

    // A recreated policy is reported afresh.
    test.apply(mk_policy("pol", 1));
    assert_eq!(test.reconciler.reconcile().patches, 1);
}

#[test]
fn backend_tls_policies_for_other_targets_are_not_patched() {
    let mut test = TestConfig::default();
    test.apply(mk_gateway("gw"));
    let policy: BackendTlsPolicy = serde_json::from_value(json!({
        "apiVersion": "gateway.networking.k8s.io/v1",
        "kind": "BackendTLSPolicy",
        "metadata": { "namespace": "default", "name": "tls" },
        "spec": {
            "targetRefs": [{ "group": k8s::GATEWAY_GROUP, "kind": "Gateway", "name": "gw" }],
            "validation": { "hostname": "gw.example.com", "wellKnownCACertificates": "System" },
        },
    }))
    .expect("backend tls policy must parse");
    test.apply(policy);

    assert_eq!(test.reconciler.reconcile(), Reconciled::default());
    assert!(test.updated().is_empty());
}
