use super::*;
use agw_policy_controller_core::{
    policy::{
        traffic::{
            ApiKey, ApiKeyAuth, BasicAuthMode, ExtAuthz, ExtAuthzFailureMode, ExtAuthzProtocol,
            Jwt, JwtProvider, Phase, Timeout, TrafficKind, TrafficPolicy,
        },
        BackendReference, JwtMode,
    },
    Acceptance, PolicyKind, PolicyTarget,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn ext_authz(target: Option<BackendReference>) -> TrafficKind {
    TrafficKind::ExtAuthz(ExtAuthz {
        target,
        failure_mode: ExtAuthzFailureMode::Deny,
        protocol: ExtAuthzProtocol::Grpc {
            context: BTreeMap::new(),
            metadata: BTreeMap::new(),
        },
        include_request_headers: vec![],
        include_request_body: None,
    })
}

fn authz_service() -> BackendReference {
    BackendReference::Service {
        hostname: "authz.default.svc.cluster.local".to_string(),
        namespace: "default".to_string(),
        port: 9000,
    }
}

#[test]
fn pre_routing_only_allows_gateway_phase_features() {
    let test = TestConfig::default();
    test.apply(mk_gateway("default", "gw", &["http"]));
    test.apply(mk_service("default", "authz", &[("grpc", 9000)]));

    let policy = mk_policy(
        "default",
        "pol",
        json!({
            "targetRefs": [gateway_target("gw")],
            "traffic": {
                "phase": "PreRouting",
                "extAuth": { "backendRef": { "name": "authz", "port": 9000 } },
                "cors": { "allowOrigins": ["https://example.com"] },
            },
        }),
    );
    let out = test.translate(&policy);

    assert_eq!(out.policies.len(), 1);
    assert_eq!(out.policies[0].key, "traffic/default/pol:extauth:default/gw");
    assert_eq!(
        out.policies[0].kind,
        PolicyKind::Traffic(TrafficPolicy {
            phase: Phase::Gateway,
            kind: ext_authz(Some(authz_service())),
        })
    );
    assert_eq!(
        out.outcomes[0].acceptance,
        Acceptance::PartiallyValid(
            "phase PreRouting does not support cors; only extAuth, transformation, and extProc may be set"
                .to_string()
        )
    );
}

#[test]
fn pre_routing_requires_a_gateway() {
    let test = TestConfig::default();
    test.apply(mk_gateway("default", "gw", &["http"]));
    test.apply(mk_route("default", "r", &["gw"]));
    test.apply(mk_service("default", "authz", &[("grpc", 9000)]));

    let policy = mk_policy(
        "default",
        "pol",
        json!({
            "targetRefs": [route_target("r")],
            "traffic": {
                "phase": "PreRouting",
                "extAuth": { "backendRef": { "name": "authz", "port": 9000 } },
            },
        }),
    );
    let out = test.translate(&policy);

    assert!(out.policies.is_empty());
    assert_eq!(
        out.outcomes[0].acceptance,
        Acceptance::Invalid(
            "the 'traffic.phase=PreRouting' field can only target a Gateway".to_string()
        )
    );
    assert_eq!(
        out.outcomes[0].ancestors,
        vec![gateway_ancestor("default", "gw")]
    );
}

#[test]
fn ext_auth_without_backend_denies() {
    let test = TestConfig::default();
    test.apply(mk_gateway("default", "gw", &["http"]));

    let policy = mk_policy(
        "default",
        "pol",
        json!({
            "targetRefs": [gateway_target("gw")],
            "traffic": {
                "extAuth": { "backendRef": { "name": "authz", "port": 9000 } },
            },
        }),
    );
    let out = test.translate(&policy);

    assert_eq!(out.policies.len(), 1);
    assert_eq!(
        out.policies[0].kind,
        PolicyKind::Traffic(TrafficPolicy {
            phase: Phase::Route,
            kind: ext_authz(None),
        })
    );
    assert_eq!(
        out.outcomes[0].acceptance,
        Acceptance::PartiallyValid(
            "failed to build extAuth: unable to find the Service default/authz".to_string()
        )
    );
}

#[test]
fn jwt_reads_remote_key_sets_from_the_cache() {
    let test = TestConfig::default();
    test.apply(mk_gateway("default", "gw", &["http"]));
    test.apply(mk_service("default", "idp", &[("https", 8443)]));
    test.apply(mk_config_map(
        "default",
        "idp-jwks",
        Some("http://idp.default.svc.cluster.local:8443/keys"),
        btreemap! { "jwks" => r#"{"keys":[]}"# },
    ));

    let policy = mk_policy(
        "default",
        "pol",
        json!({
            "targetRefs": [gateway_target("gw")],
            "traffic": {
                "jwtAuthentication": {
                    "providers": [
                        {
                            "issuer": "https://idp.example.com",
                            "audiences": ["api"],
                            "jwks": {
                                "remote": {
                                    "jwksPath": "/keys",
                                    "backendRef": { "name": "idp", "port": 8443 },
                                },
                            },
                        },
                        {
                            "issuer": "other",
                            "jwks": {
                                "remote": {
                                    "jwksPath": "keys",
                                    "backendRef": { "name": "missing", "port": 8443 },
                                },
                            },
                        },
                    ],
                },
            },
        }),
    );
    let out = test.translate(&policy);

    assert_eq!(out.policies.len(), 1);
    assert_eq!(
        out.policies[0].kind,
        PolicyKind::Traffic(TrafficPolicy {
            phase: Phase::Route,
            kind: TrafficKind::Jwt(Jwt {
                mode: JwtMode::Strict,
                providers: vec![JwtProvider {
                    issuer: "https://idp.example.com".to_string(),
                    audiences: vec!["api".to_string()],
                    jwks: r#"{"keys":[]}"#.to_string(),
                }],
            }),
        })
    );
    assert_eq!(
        out.outcomes[0].acceptance,
        Acceptance::PartiallyValid(
            "failed to build jwtAuthentication: provider other: unable to find the Service default/missing"
                .to_string()
        )
    );
}

#[test]
fn api_keys_from_selected_secrets() {
    let test = TestConfig::default();
    test.apply(mk_gateway("default", "gw", &["http"]));
    test.apply(mk_secret(
        "default",
        "keys-b",
        btreemap! { "team" => "a" },
        btreemap! { "bob" => r#"{"key":"def","metadata":{"user":"bob"}}"# },
    ));
    test.apply(mk_secret(
        "default",
        "keys-a",
        btreemap! { "team" => "a" },
        btreemap! { "alice" => "abc" },
    ));
    test.apply(mk_secret(
        "default",
        "keys-c",
        btreemap! { "team" => "b" },
        btreemap! { "carol" => "ghi" },
    ));

    let policy = mk_policy(
        "default",
        "pol",
        json!({
            "targetRefs": [gateway_target("gw")],
            "traffic": {
                "apiKeyAuthentication": {
                    "secretRef": { "name": "keys-c" },
                    "secretSelector": { "matchLabels": { "team": "a" } },
                },
            },
        }),
    );
    let out = test.translate(&policy);

    assert_eq!(
        out.policies[0].kind,
        PolicyKind::Traffic(TrafficPolicy {
            phase: Phase::Route,
            kind: TrafficKind::ApiKeyAuth(ApiKeyAuth {
                keys: vec![
                    ApiKey {
                        key: "abc".to_string(),
                        metadata: None,
                    },
                    ApiKey {
                        key: "def".to_string(),
                        metadata: Some(json!({ "user": "bob" })),
                    },
                ],
                mode: BasicAuthMode::Strict,
            }),
        })
    );
    assert_eq!(out.outcomes[0].acceptance, Acceptance::Valid);
}

#[test]
fn basic_auth_secret_without_htaccess() {
    let test = TestConfig::default();
    test.apply(mk_gateway("default", "gw", &["http"]));
    test.apply(mk_secret(
        "default",
        "creds",
        BTreeMap::new(),
        btreemap! { "users" => "alice:$apr1$xyz" },
    ));

    let policy = mk_policy(
        "default",
        "pol",
        json!({
            "targetRefs": [gateway_target("gw")],
            "traffic": {
                "basicAuthentication": { "secretRef": { "name": "creds" } },
            },
        }),
    );
    let out = test.translate(&policy);

    assert!(out.policies.is_empty());
    assert_eq!(
        out.outcomes[0].acceptance,
        Acceptance::Invalid(
            "failed to build basicAuthentication: basic authentication secret creds found, but doesn't contain '.htaccess' key"
                .to_string()
        )
    );
}

#[test]
fn gateway_and_rule_timeouts_keep_their_own_scope() {
    let test = TestConfig::default();
    test.apply(mk_gateway("default", "gw", &["http"]));
    test.apply(mk_route("default", "r", &["gw"]));

    let gateway = mk_policy(
        "default",
        "gw-pol",
        json!({
            "targetRefs": [gateway_target("gw")],
            "traffic": { "timeouts": { "request": "10s" } },
        }),
    );
    let mut rule = route_target("r");
    rule["sectionName"] = json!("rule-1");
    let route = mk_policy(
        "default",
        "rule-pol",
        json!({
            "targetRefs": [rule],
            "traffic": { "timeouts": { "request": "2s" } },
        }),
    );

    let gateway = test.translate(&gateway).policies;
    let route = test.translate(&route).policies;
    assert_eq!(
        [gateway[0].key.as_str(), route[0].key.as_str()],
        [
            "traffic/default/gw-pol:timeout:default/gw",
            "traffic/default/rule-pol:timeout:default/r/rule-1",
        ]
    );

    assert_eq!(
        gateway
            .iter()
            .map(|p| (p.target.clone(), p.kind.clone()))
            .collect::<Vec<_>>(),
        vec![(
            PolicyTarget::Gateway {
                namespace: "default".to_string(),
                name: "gw".to_string(),
                listener: None,
            },
            PolicyKind::Traffic(TrafficPolicy {
                phase: Phase::Route,
                kind: TrafficKind::Timeout(Timeout {
                    request: Some(Duration::from_secs(10)),
                    backend_request: None,
                }),
            }),
        )]
    );
    assert_eq!(
        route
            .iter()
            .map(|p| (p.target.clone(), p.kind.clone()))
            .collect::<Vec<_>>(),
        vec![(
            PolicyTarget::Route {
                namespace: "default".to_string(),
                name: "r".to_string(),
                kind: "HTTPRoute".to_string(),
                rule: Some("rule-1".to_string()),
            },
            PolicyKind::Traffic(TrafficPolicy {
                phase: Phase::Route,
                kind: TrafficKind::Timeout(Timeout {
                    request: Some(Duration::from_secs(2)),
                    backend_request: None,
                }),
            }),
        )]
    );
    assert!(gateway[0].target.kind() < route[0].target.kind());
}
