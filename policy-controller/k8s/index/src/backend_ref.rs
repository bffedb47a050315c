//! Resolves references to side-call destinations.

use crate::Snapshot;
use agw_policy_controller_core::policy::BackendReference;
use agw_policy_controller_k8s_api::{
    self as k8s,
    policy::{BackendObjectReference, RemoteJwks},
};
use anyhow::{anyhow, bail, Result};

/// Resolves a reference to a Service port or an `AgentgatewayBackend`. The
/// referent must exist in the snapshot.
pub(crate) fn resolve(
    snapshot: &Snapshot,
    namespace: &str,
    backend_ref: &BackendObjectReference,
) -> Result<BackendReference> {
    let ns = backend_ref.namespace(namespace);
    let name = backend_ref.name.as_str();
    match (backend_ref.group(), backend_ref.kind()) {
        ("" | "core", "Service") => {
            if name.contains('.') {
                bail!("service name invalid; the name of the Service, not the hostname");
            }
            if snapshot.service(ns, name).is_none() {
                bail!("unable to find the Service {ns}/{name}");
            }
            let port = backend_ref
                .port
                .ok_or_else(|| anyhow!("port is required for Service targets"))?;
            let port = u16::try_from(port)
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| anyhow!("invalid port {port}"))?;
            Ok(BackendReference::Service {
                hostname: snapshot.cluster_info().service_hostname(ns, name),
                namespace: ns.to_string(),
                port,
            })
        }

        (k8s::AGENTGATEWAY_GROUP, "AgentgatewayBackend") => {
            if snapshot.backend(ns, name).is_none() {
                bail!("unable to find the Backend {ns}/{name}");
            }
            Ok(BackendReference::Backend(format!("{ns}/{name}")))
        }

        (group, kind) => bail!("unsupported backend {group}/{kind}"),
    }
}

/// Builds the URI a remote key-set is served from.
pub(crate) fn jwks_uri(snapshot: &Snapshot, namespace: &str, remote: &RemoteJwks) -> Result<String> {
    let authority = match resolve(snapshot, namespace, &remote.backend_ref)? {
        BackendReference::Service { hostname, port, .. } => format!("{hostname}:{port}"),
        BackendReference::Backend(key) => {
            let ns = remote.backend_ref.namespace(namespace);
            let (host, port) = snapshot
                .backend(ns, &remote.backend_ref.name)
                .and_then(|b| b.static_target.clone())
                .ok_or_else(|| {
                    anyhow!("only static backends are supported for remote key-sets; {key} is not static")
                })?;
            format!("{host}:{port}")
        }
    };

    let uri = format!(
        "http://{authority}/{}",
        remote.jwks_path.trim_start_matches('/')
    );
    if let Err(error) = uri.parse::<http::Uri>() {
        bail!("invalid key-set URI {uri}: {error}");
    }
    Ok(uri)
}

/// Reads a remote key-set from the pre-resolved cache.
pub(crate) fn remote_jwks(snapshot: &Snapshot, namespace: &str, remote: &RemoteJwks) -> Result<String> {
    let uri = jwks_uri(snapshot, namespace, remote)?;
    snapshot
        .jwks(&uri)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("jwks {uri} is not available in the key-set cache"))
}
