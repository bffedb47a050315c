use super::*;
use agw_policy_controller_core::{
    policy::{backend::BackendTls, BackendPolicy},
    Acceptance, Outcome, PolicyKind, PolicyTarget, ResolvedRefs, TypedResource, WirePolicy,
};
use pretty_assertions::assert_eq;

const CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----";

fn service_ancestor(name: &str) -> AncestorRef {
    AncestorRef::new("", "Service", "default", name)
}

fn spec(section: Option<&str>, validation: serde_json::Value) -> serde_json::Value {
    let mut target = json!({ "group": "", "kind": "Service", "name": "web" });
    if let Some(section) = section {
        target["sectionName"] = json!(section);
    }
    json!({ "targetRefs": [target], "validation": validation })
}

fn system_roots() -> serde_json::Value {
    json!({
        "hostname": "web.example.com",
        "wellKnownCACertificates": "System",
        "subjectAltNames": [
            { "type": "Hostname", "hostname": "web.example.com" },
            { "type": "URI", "uri": "spiffe://cluster.local/ns/default/sa/web" },
        ],
    })
}

#[test]
fn oldest_policy_wins() {
    let test = TestConfig::default();
    test.apply(mk_service("default", "web", &[("https", 8443)]));

    let a = mk_backend_tls_policy("default", "a", "2024-01-01T00:00:00Z", spec(None, system_roots()));
    let b = mk_backend_tls_policy("default", "b", "2024-01-01T00:00:01Z", spec(None, system_roots()));
    test.apply(a.clone());
    test.apply(b.clone());

    let out = test.translate_backend_tls(&b);
    assert!(out.policies.is_empty());
    assert_eq!(
        out.outcomes,
        vec![Outcome {
            ancestors: vec![service_ancestor("web")],
            acceptance: Acceptance::Conflicted {
                winner: "a".to_string()
            },
            resolved_refs: Some(ResolvedRefs::Resolved),
        }]
    );

    let out = test.translate_backend_tls(&a);
    assert_eq!(
        out.policies,
        vec![WirePolicy {
            key: "default/a:backend-tls:default/web.default.svc.cluster.local".to_string(),
            name: Some(TypedResource::new("BackendTLSPolicy", "default", "a")),
            target: PolicyTarget::Service {
                namespace: "default".to_string(),
                hostname: "web.default.svc.cluster.local".to_string(),
                port: None,
            },
            kind: PolicyKind::Backend(BackendPolicy::Tls(BackendTls {
                root: None,
                hostname: Some("web.example.com".to_string()),
                verify_subject_alt_names: vec![
                    "web.example.com".to_string(),
                    "spiffe://cluster.local/ns/default/sa/web".to_string(),
                ],
                ..BackendTls::default()
            })),
        }]
    );
    assert_eq!(out.outcomes[0].acceptance, Acceptance::Valid);
}

#[test]
fn distinct_sections_do_not_conflict() {
    let test = TestConfig::default();
    test.apply(mk_service("default", "web", &[("https", 8443), ("admin", 9443)]));

    let a = mk_backend_tls_policy(
        "default",
        "a",
        "2024-01-01T00:00:00Z",
        spec(Some("https"), system_roots()),
    );
    let b = mk_backend_tls_policy(
        "default",
        "b",
        "2024-01-01T00:00:01Z",
        spec(Some("admin"), system_roots()),
    );
    test.apply(a);
    test.apply(b.clone());

    let out = test.translate_backend_tls(&b);
    assert_eq!(
        out.policies
            .iter()
            .map(|p| p.key.as_str())
            .collect::<Vec<_>>(),
        vec!["default/b:backend-tls:default/web.default.svc.cluster.local/9443"]
    );
    assert_eq!(out.outcomes[0].acceptance, Acceptance::Valid);
}

#[test]
fn missing_ca_fails_closed() {
    let test = TestConfig::default();
    test.apply(mk_service("default", "web", &[("https", 8443)]));

    let policy = mk_backend_tls_policy(
        "default",
        "a",
        "2024-01-01T00:00:00Z",
        spec(
            None,
            json!({
                "hostname": "web.example.com",
                "caCertificateRefs": [{ "group": "", "kind": "ConfigMap", "name": "ca" }],
            }),
        ),
    );
    test.apply(policy.clone());
    let out = test.translate_backend_tls(&policy);

    assert_eq!(out.policies.len(), 1);
    let PolicyKind::Backend(BackendPolicy::Tls(tls)) = &out.policies[0].kind else {
        panic!("expected a backend TLS policy: {:?}", out.policies[0].kind);
    };
    assert_eq!(tls.root.as_deref(), Some(BackendTls::INVALID_ROOT));
    assert_eq!(
        out.outcomes,
        vec![Outcome {
            ancestors: vec![service_ancestor("web")],
            acceptance: Acceptance::Rejected {
                reason: "NoValidCACertificate".to_string(),
                message: "certificate reference not found: ConfigMap default/ca".to_string(),
            },
            resolved_refs: Some(ResolvedRefs::InvalidCaCertificateRef(
                "Certificate reference not found".to_string()
            )),
        }]
    );
}

#[test]
fn config_map_roots() {
    let test = TestConfig::default();
    test.apply(mk_service("default", "web", &[("https", 8443)]));
    test.apply(mk_config_map("default", "ca", None, btreemap! { "ca.crt" => CERT }));

    let policy = mk_backend_tls_policy(
        "default",
        "a",
        "2024-01-01T00:00:00Z",
        spec(
            Some("https"),
            json!({
                "hostname": "web.example.com",
                "caCertificateRefs": [{ "group": "", "kind": "ConfigMap", "name": "ca" }],
            }),
        ),
    );
    test.apply(policy.clone());
    let out = test.translate_backend_tls(&policy);

    assert_eq!(
        out.policies[0].target,
        PolicyTarget::Service {
            namespace: "default".to_string(),
            hostname: "web.default.svc.cluster.local".to_string(),
            port: Some(8443),
        }
    );
    let PolicyKind::Backend(BackendPolicy::Tls(tls)) = &out.policies[0].kind else {
        panic!("expected a backend TLS policy: {:?}", out.policies[0].kind);
    };
    assert_eq!(tls.root.as_deref(), Some(CERT));
    assert_eq!(out.outcomes[0].acceptance, Acceptance::Valid);
    assert_eq!(out.outcomes[0].resolved_refs, Some(ResolvedRefs::Resolved));
}

#[test]
fn unknown_well_known_roots_are_invalid() {
    let test = TestConfig::default();
    test.apply(mk_service("default", "web", &[("https", 8443)]));

    let policy = mk_backend_tls_policy(
        "default",
        "a",
        "2024-01-01T00:00:00Z",
        spec(
            None,
            json!({ "hostname": "web.example.com", "wellKnownCACertificates": "Mozilla" }),
        ),
    );
    test.apply(policy.clone());
    let out = test.translate_backend_tls(&policy);

    assert_eq!(
        out.outcomes[0].acceptance,
        Acceptance::Invalid("unknown wellKnownCACertificates: Mozilla".to_string())
    );
}

#[test]
fn unsupported_targets_are_skipped() {
    let test = TestConfig::default();
    test.apply(mk_gateway("default", "gw", &["https"]));

    let policy = mk_backend_tls_policy(
        "default",
        "a",
        "2024-01-01T00:00:00Z",
        json!({
            "targetRefs": [gateway_target("gw")],
            "validation": system_roots(),
        }),
    );
    let out = test.translate_backend_tls(&policy);
    assert_eq!(out, PolicyTranslation::default());
}
