//! Translates `BackendTLSPolicy` resources.
//!
//! At most one BackendTLSPolicy applies to a given target. When several claim
//! the same target, the oldest wins and the others report a conflict for that
//! target without emitting a wire policy.

use crate::{
    ancestors::resolve_ancestors,
    backend::ca_certificate,
    conflict,
    policy::PolicyTranslation,
    resolve::resolve_target,
    Snapshot,
};
use agw_policy_controller_core::{
    policy::{backend::BackendTls, BackendPolicy},
    Acceptance, Outcome, PolicyKind, PolicyTarget, ResolvedRefs, TypedResource, WirePolicy,
};
use agw_policy_controller_k8s_api::{
    self as k8s,
    backend_tls_policy::{BackendTlsValidation, SubjectAltNameType},
    BackendTlsPolicy, ResourceExt,
};
use thiserror::Error;

pub(crate) const KIND: &str = "BackendTLSPolicy";

const WELL_KNOWN_SYSTEM: &str = "System";

/// Why the configured CA roots could not be loaded.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CaError {
    #[error("unknown wellKnownCACertificates: {0}")]
    UnknownWellKnown(String),

    #[error("no CACertificateRefs specified")]
    NoRefs,

    #[error("invalid certificate reference: {kind} {name}")]
    InvalidKind { kind: String, name: String },

    #[error("certificate reference not found: ConfigMap {0}")]
    NotFound(String),

    #[error("certificate invalid: {0}")]
    Invalid(String),
}

/// The CA roots and reference resolution shared by every target of a policy.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Roots {
    root: Option<String>,
    error: Option<CaError>,
    resolved_refs: ResolvedRefs,
}

pub fn translate(snapshot: &Snapshot, policy: &BackendTlsPolicy) -> PolicyTranslation {
    let namespace = policy.namespace().unwrap_or_default();
    let name = policy.name_unchecked();
    let own = conflict::priority(policy);
    let validation = &policy.spec.validation;

    let roots = roots(snapshot, &namespace, validation);
    let verify_subject_alt_names = validation
        .subject_alt_names
        .iter()
        .filter_map(|san| match san.kind {
            SubjectAltNameType::Hostname => san.hostname.clone(),
            SubjectAltNameType::Uri => san.uri.clone(),
        })
        .collect::<Vec<_>>();

    let mut out = PolicyTranslation::default();
    for target_ref in &policy.spec.target_refs {
        let supported = matches!(
            (target_ref.group.as_str(), target_ref.kind.as_str()),
            ("" | "core", "Service") | (k8s::AGENTGATEWAY_GROUP, "AgentgatewayBackend")
        );
        if !supported {
            tracing::warn!(%namespace, %name, target = %target_ref, "Unsupported BackendTLSPolicy target kind");
            continue;
        }

        let ancestors = resolve_ancestors(snapshot, &namespace, target_ref);
        let outcome = |acceptance| Outcome {
            ancestors: ancestors.refs.clone(),
            acceptance,
            resolved_refs: Some(roots.resolved_refs.clone()),
        };

        let claimants = snapshot
            .backend_tls_policies_in(&namespace)
            .filter(|p| {
                p.spec
                    .target_refs
                    .iter()
                    .any(|t| conflict::same_target(t, target_ref))
            })
            .map(conflict::priority);
        if let Some(winner) = conflict::outranked_by(&own, claimants) {
            tracing::debug!(%namespace, %name, target = %target_ref, winner = %winner.name, "Conflicted");
            out.outcomes.push(outcome(Acceptance::Conflicted {
                winner: winner.name,
            }));
            continue;
        }

        let target = match resolve_target(snapshot, &namespace, target_ref) {
            Ok(target) => target,
            Err(error) => {
                out.outcomes.push(outcome(Acceptance::NotAttached(error.to_string())));
                continue;
            }
        };

        out.policies.push(policy_for(
            &namespace,
            &name,
            target,
            BackendTls {
                root: roots.root.clone(),
                hostname: Some(validation.hostname.clone()),
                verify_subject_alt_names: verify_subject_alt_names.clone(),
                ..BackendTls::default()
            },
        ));

        let acceptance = match (&ancestors.error, &roots.error) {
            (Some(error), _) => Acceptance::NotAttached(error.clone()),
            (None, Some(error @ CaError::UnknownWellKnown(_))) => {
                Acceptance::Invalid(error.to_string())
            }
            (None, Some(error)) => Acceptance::Rejected {
                reason: "NoValidCACertificate".to_string(),
                message: error.to_string(),
            },
            (None, None) => Acceptance::Valid,
        };
        out.outcomes.push(outcome(acceptance));
    }
    out
}

fn policy_for(namespace: &str, name: &str, target: PolicyTarget, tls: BackendTls) -> WirePolicy {
    WirePolicy {
        key: format!(
            "{namespace}/{name}:backend-tls{}",
            target.attachment_name()
        ),
        name: Some(TypedResource::new(KIND, namespace, name)),
        target,
        kind: PolicyKind::Backend(BackendPolicy::Tls(tls)),
    }
}

/// Loads the CA roots. On failure the root is [`BackendTls::INVALID_ROOT`] so
/// that the data plane refuses connections instead of skipping verification.
fn roots(snapshot: &Snapshot, namespace: &str, validation: &BackendTlsValidation) -> Roots {
    match load_roots(snapshot, namespace, validation) {
        Ok(root) => Roots {
            root,
            error: None,
            resolved_refs: ResolvedRefs::Resolved,
        },
        Err(error) => {
            let resolved_refs = match &error {
                CaError::InvalidKind { kind, .. } => {
                    ResolvedRefs::InvalidKind(format!("Certificate reference invalid: {kind}"))
                }
                CaError::NotFound(_) => ResolvedRefs::InvalidCaCertificateRef(
                    "Certificate reference not found".to_string(),
                ),
                CaError::Invalid(message) => {
                    ResolvedRefs::InvalidCaCertificateRef(format!("Certificate invalid: {message}"))
                }
                CaError::UnknownWellKnown(_) | CaError::NoRefs => ResolvedRefs::Resolved,
            };
            Roots {
                root: Some(BackendTls::INVALID_ROOT.to_string()),
                error: Some(error),
                resolved_refs,
            }
        }
    }
}

fn load_roots(
    snapshot: &Snapshot,
    namespace: &str,
    validation: &BackendTlsValidation,
) -> Result<Option<String>, CaError> {
    if let Some(well_known) = &validation.well_known_ca_certificates {
        if well_known == WELL_KNOWN_SYSTEM {
            return Ok(None);
        }
        return Err(CaError::UnknownWellKnown(well_known.clone()));
    }

    if validation.ca_certificate_refs.is_empty() {
        return Err(CaError::NoRefs);
    }

    let mut pems = Vec::with_capacity(validation.ca_certificate_refs.len());
    for cert_ref in &validation.ca_certificate_refs {
        if !matches!(cert_ref.group.as_str(), "" | "core") || cert_ref.kind != "ConfigMap" {
            return Err(CaError::InvalidKind {
                kind: cert_ref.kind.clone(),
                name: cert_ref.name.clone(),
            });
        }
        let config_map = snapshot
            .config_map(namespace, &cert_ref.name)
            .ok_or_else(|| CaError::NotFound(format!("{namespace}/{}", cert_ref.name)))?;
        let pem = ca_certificate(config_map).map_err(|e| CaError::Invalid(e.to_string()))?;
        pems.push(pem);
    }
    Ok(Some(pems.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClusterInfo;
    use agw_policy_controller_k8s_api::ConfigMap;
    use kubert::index::IndexNamespacedResource;
    use pretty_assertions::assert_eq;

    const CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----";

    fn validation(value: serde_json::Value) -> BackendTlsValidation {
        serde_json::from_value(value).expect("validation must parse")
    }

    fn snapshot_with_ca(data: &str) -> Snapshot {
        let mut snapshot = Snapshot::new(ClusterInfo::default());
        let cm: ConfigMap = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "namespace": "ns", "name": "ca" },
            "data": { "ca.crt": data },
        }))
        .expect("config map must parse");
        snapshot.apply(cm);
        snapshot
    }

    #[test]
    fn system_roots_are_unset() {
        let snapshot = Snapshot::new(ClusterInfo::default());
        let v = validation(serde_json::json!({
            "hostname": "example.com",
            "wellKnownCACertificates": "System",
        }));
        assert_eq!(load_roots(&snapshot, "ns", &v), Ok(None));
    }

    #[test]
    fn config_map_roots_are_concatenated() {
        let snapshot = snapshot_with_ca(CERT);
        let v = validation(serde_json::json!({
            "hostname": "example.com",
            "caCertificateRefs": [
                { "group": "", "kind": "ConfigMap", "name": "ca" },
                { "group": "", "kind": "ConfigMap", "name": "ca" },
            ],
        }));
        assert_eq!(
            load_roots(&snapshot, "ns", &v),
            Ok(Some(format!("{CERT}\n{CERT}")))
        );
    }

    #[test]
    fn invalid_references_fail_closed() {
        let snapshot = snapshot_with_ca("garbage");

        let v = validation(serde_json::json!({
            "hostname": "example.com",
            "caCertificateRefs": [{ "group": "", "kind": "Secret", "name": "ca" }],
        }));
        let r = roots(&snapshot, "ns", &v);
        assert_eq!(r.root.as_deref(), Some(BackendTls::INVALID_ROOT));
        assert_eq!(
            r.resolved_refs,
            ResolvedRefs::InvalidKind("Certificate reference invalid: Secret".to_string())
        );

        let v = validation(serde_json::json!({
            "hostname": "example.com",
            "caCertificateRefs": [{ "group": "", "kind": "ConfigMap", "name": "ca" }],
        }));
        let r = roots(&snapshot, "ns", &v);
        assert_eq!(r.root.as_deref(), Some(BackendTls::INVALID_ROOT));
        assert!(matches!(
            r.resolved_refs,
            ResolvedRefs::InvalidCaCertificateRef(ref m) if m.starts_with("Certificate invalid: ")
        ));

        let v = validation(serde_json::json!({
            "hostname": "example.com",
            "caCertificateRefs": [{ "group": "", "kind": "ConfigMap", "name": "missing" }],
        }));
        assert_eq!(
            roots(&snapshot, "ns", &v).resolved_refs,
            ResolvedRefs::InvalidCaCertificateRef("Certificate reference not found".to_string())
        );
    }
}
