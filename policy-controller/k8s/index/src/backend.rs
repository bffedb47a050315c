//! Translates `spec.backend`: upstream connection, authentication, MCP and AI
//! settings.

mod ai;

use crate::{
    backend_ref,
    frontend::keepalive,
    snapshot::ConfigMapInfo,
    traffic::{jwt_mode, rbac},
    translate::{opt_duration_field, Context, Feature, Output, Translated},
};
use agw_policy_controller_core::{
    policy::backend::{
        BackendAuth, BackendHttp, BackendPolicy, BackendTcp, BackendTls, HttpVersion,
        InsecureTls, McpAuthentication, McpIdentityProvider,
    },
    PolicyKind,
};
use agw_policy_controller_k8s_api::policy::backend as api;
use anyhow::{anyhow, bail, Result};

pub(crate) const CATEGORY: &str = "backend";

pub(crate) const TLS_CERT_KEY: &str = "tls.crt";
pub(crate) const TLS_PRIVATE_KEY_KEY: &str = "tls.key";
pub(crate) const CA_CERT_KEY: &str = "ca.crt";

const AUTHORIZATION_KEY: &str = "Authorization";

const FEATURES: &[Feature<api::BackendSpec, BackendPolicy>] = &[
    Feature {
        name: "tls",
        suffix: ":tls",
        translate: tls,
    },
    Feature {
        name: "http",
        suffix: ":backend-http",
        translate: http,
    },
    Feature {
        name: "tcp",
        suffix: ":backend-tcp",
        translate: tcp,
    },
    Feature {
        name: "auth",
        suffix: ":backend-auth",
        translate: auth,
    },
    Feature {
        name: "mcp authorization",
        suffix: ":mcp-authorization",
        translate: mcp_authorization,
    },
    Feature {
        name: "mcp authentication",
        suffix: ":mcp-authentication",
        translate: mcp_authentication,
    },
    Feature {
        name: "ai",
        suffix: ":ai",
        translate: ai::translate,
    },
];

pub(crate) fn translate(ctx: &Context<'_>, backend: &api::BackendSpec, out: &mut Output) {
    out.translate(ctx, CATEGORY, FEATURES, backend, PolicyKind::Backend);
}

/// Reads a PEM bundle from a ConfigMap's `ca.crt` entry.
pub(crate) fn ca_certificate(config_map: &ConfigMapInfo) -> Result<&str> {
    let pem = config_map
        .data
        .get(CA_CERT_KEY)
        .ok_or_else(|| anyhow!("{CA_CERT_KEY} key not found"))?;
    if !is_pem_certificate(pem) {
        bail!("{CA_CERT_KEY} does not contain a PEM certificate");
    }
    Ok(pem)
}

fn is_pem_certificate(pem: &str) -> bool {
    let Some(start) = pem.find("-----BEGIN CERTIFICATE-----") else {
        return false;
    };
    pem[start..].contains("-----END CERTIFICATE-----")
}

fn utf8(bytes: &[u8]) -> Option<String> {
    String::from_utf8(bytes.to_vec()).ok()
}

/// mTLS material comes from a single Secret; CA ConfigMaps, when set, replace
/// any `ca.crt` it carries. When none of the CA references can be loaded the
/// root is set to [`BackendTls::INVALID_ROOT`] so the connection fails closed.
fn tls(ctx: &Context<'_>, backend: &api::BackendSpec) -> Option<Translated<BackendPolicy>> {
    let tls = backend.tls.as_ref()?;
    let mut errors = vec![];
    let mut spec = BackendTls {
        hostname: tls.sni.clone(),
        verify_subject_alt_names: tls.verify_subject_alt_names.clone(),
        insecure: tls.insecure_skip_verify.map(|mode| match mode {
            api::InsecureTlsMode::All => InsecureTls::All,
            api::InsecureTlsMode::Hostname => InsecureTls::Hostname,
        }),
        alpn: tls.alpn_protocols.clone(),
        ..BackendTls::default()
    };

    if let Some(mtls) = tls.mtls_certificate_ref.first() {
        let id = format!("{}/{}", ctx.namespace, mtls.name);
        match ctx.snapshot.secret(ctx.namespace, &mtls.name) {
            None => errors.push(anyhow!("secret {id} not found")),
            Some(secret) => {
                let cert = secret.data.get(TLS_CERT_KEY).and_then(|v| utf8(v));
                let key = secret.data.get(TLS_PRIVATE_KEY_KEY).and_then(|v| utf8(v));
                match &cert {
                    Some(cert) if is_pem_certificate(cert) => {}
                    _ => errors.push(anyhow!(
                        "secret {id} contains invalid certificate: {TLS_CERT_KEY} is missing or not PEM"
                    )),
                }
                if key.is_none() {
                    errors.push(anyhow!(
                        "secret {id} contains invalid certificate: {TLS_PRIVATE_KEY_KEY} is missing"
                    ));
                }
                spec.cert = cert;
                spec.key = key;
                spec.root = secret.data.get(CA_CERT_KEY).and_then(|v| utf8(v));
            }
        }
    }

    if !tls.ca_certificate_refs.is_empty() {
        let mut roots = Vec::with_capacity(tls.ca_certificate_refs.len());
        for ca in &tls.ca_certificate_refs {
            let id = format!("{}/{}", ctx.namespace, ca.name);
            let Some(config_map) = ctx.snapshot.config_map(ctx.namespace, &ca.name) else {
                errors.push(anyhow!("ConfigMap {id} not found"));
                continue;
            };
            match ca_certificate(config_map) {
                Ok(pem) => roots.push(pem),
                Err(error) => errors.push(
                    error.context(format!("error extracting CA cert from ConfigMap {id}")),
                ),
            }
        }
        spec.root = Some(if roots.is_empty() {
            BackendTls::INVALID_ROOT.to_string()
        } else {
            roots.join("\n")
        });
    }

    Some(Translated::with_errors(BackendPolicy::Tls(spec), errors))
}

fn http(_: &Context<'_>, backend: &api::BackendSpec) -> Option<Translated<BackendPolicy>> {
    let http = backend.http.as_ref()?;
    let res = opt_duration_field("requestTimeout", http.request_timeout.as_ref()).map(
        |request_timeout| {
            BackendPolicy::Http(BackendHttp {
                version: http.version.map(|v| match v {
                    api::HttpVersion::Http1 => HttpVersion::Http1,
                    api::HttpVersion::Http2 => HttpVersion::Http2,
                }),
                request_timeout,
            })
        },
    );
    Some(res.into())
}

fn tcp(_: &Context<'_>, backend: &api::BackendSpec) -> Option<Translated<BackendPolicy>> {
    let tcp = backend.tcp.as_ref()?;
    Some(tcp_spec(tcp).map(BackendPolicy::Tcp).into())
}

fn tcp_spec(tcp: &api::BackendTcp) -> Result<BackendTcp> {
    Ok(BackendTcp {
        keepalives: tcp.keepalive.as_ref().map(keepalive).transpose()?,
        connect_timeout: opt_duration_field("connectTimeout", tcp.connect_timeout.as_ref())?,
    })
}

fn auth(ctx: &Context<'_>, backend: &api::BackendSpec) -> Option<Translated<BackendPolicy>> {
    let auth = backend.auth.as_ref()?;
    Some(auth_spec(ctx, auth).map(BackendPolicy::Auth).into())
}

fn auth_spec(ctx: &Context<'_>, auth: &api::BackendAuth) -> Result<BackendAuth> {
    if auth.passthrough.is_some() {
        return Ok(BackendAuth::Passthrough);
    }
    if let Some(key) = auth.key.as_ref().filter(|k| !k.is_empty()) {
        return Ok(BackendAuth::Key(key.clone()));
    }
    let Some(secret_ref) = &auth.secret_ref else {
        bail!("backend auth requires either inline key or secretRef");
    };

    let id = format!("{}/{}", ctx.namespace, secret_ref.name);
    let secret = ctx
        .snapshot
        .secret(ctx.namespace, &secret_ref.name)
        .ok_or_else(|| anyhow!("failed to get secret {id}: not found"))?;
    secret
        .data
        .get(AUTHORIZATION_KEY)
        .and_then(|v| utf8(v))
        .map(|key| BackendAuth::Key(key.trim().to_string()))
        .ok_or_else(|| anyhow!("secret {id} missing {AUTHORIZATION_KEY} value"))
}

fn mcp_authorization(_: &Context<'_>, backend: &api::BackendSpec) -> Option<Translated<BackendPolicy>> {
    let authz = backend.mcp.as_ref()?.authorization.as_ref()?;
    Some(rbac(authz).map(BackendPolicy::McpAuthorization).into())
}

fn mcp_authentication(
    ctx: &Context<'_>,
    backend: &api::BackendSpec,
) -> Option<Translated<BackendPolicy>> {
    let authn = backend.mcp.as_ref()?.authentication.as_ref()?;
    let res = backend_ref::remote_jwks(ctx.snapshot, ctx.namespace, &authn.jwks).map(|jwks| {
        BackendPolicy::McpAuthentication(McpAuthentication {
            issuer: authn.issuer.clone(),
            audiences: authn.audiences.clone(),
            provider: authn.provider.map(|p| match p {
                api::McpProvider::Auth0 => McpIdentityProvider::Auth0,
                api::McpProvider::Keycloak => McpIdentityProvider::Keycloak,
            }),
            resource_metadata: authn.resource_metadata.clone(),
            jwks,
            mode: jwt_mode(authn.mode),
        })
    });
    Some(res.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

    #[test]
    fn reads_pem_ca_bundles() {
        let mut config_map = ConfigMapInfo::default();
        assert_eq!(
            ca_certificate(&config_map).expect_err("missing").to_string(),
            "ca.crt key not found"
        );

        config_map.data.insert(CA_CERT_KEY.to_string(), "not a cert".to_string());
        assert!(ca_certificate(&config_map).is_err());

        config_map.data.insert(CA_CERT_KEY.to_string(), CERT.to_string());
        assert_eq!(ca_certificate(&config_map).expect("valid bundle"), CERT);
    }

    #[test]
    fn truncated_pem_is_rejected() {
        assert!(!is_pem_certificate("-----BEGIN CERTIFICATE-----\nMIIB"));
        assert!(is_pem_certificate(CERT));
    }
}
