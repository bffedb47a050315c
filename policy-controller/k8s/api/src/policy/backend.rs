use super::{ai::BackendAi, Authorization, JwtAuthenticationMode, Keepalive, LocalObjectRef, RemoteJwks};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct BackendSpec {
    pub tcp: Option<BackendTcp>,
    pub tls: Option<BackendTls>,
    pub http: Option<BackendHttp>,
    pub auth: Option<BackendAuth>,
    pub mcp: Option<BackendMcp>,
    pub ai: Option<BackendAi>,
}

impl BackendSpec {
    pub fn is_empty(&self) -> bool {
        self.tcp.is_none()
            && self.tls.is_none()
            && self.http.is_none()
            && self.auth.is_none()
            && self.mcp.is_none()
            && self.ai.is_none()
    }
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendTcp {
    pub keepalive: Option<Keepalive>,
    pub connect_timeout: Option<String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendTls {
    /// A Secret holding `tls.crt`, `tls.key`, and optionally `ca.crt`.
    #[serde(default)]
    pub mtls_certificate_ref: Vec<LocalObjectRef>,
    /// ConfigMaps holding `ca.crt`.
    #[serde(default)]
    pub ca_certificate_refs: Vec<LocalObjectRef>,
    pub insecure_skip_verify: Option<InsecureTlsMode>,
    pub sni: Option<String>,
    #[serde(default)]
    pub verify_subject_alt_names: Vec<String>,
    pub alpn_protocols: Option<Vec<String>>,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum InsecureTlsMode {
    All,
    Hostname,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendHttp {
    pub version: Option<HttpVersion>,
    pub request_timeout: Option<String>,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum HttpVersion {
    #[serde(rename = "HTTP1")]
    Http1,
    #[serde(rename = "HTTP2")]
    Http2,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendAuth {
    /// An inline API key.
    pub key: Option<String>,
    /// A Secret whose `Authorization` entry holds the key.
    pub secret_ref: Option<LocalObjectRef>,
    /// Forwards the client's credentials unchanged.
    pub passthrough: Option<Passthrough>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Passthrough {}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct BackendMcp {
    pub authorization: Option<Authorization>,
    pub authentication: Option<McpAuthentication>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct McpAuthentication {
    #[serde(default)]
    pub resource_metadata: BTreeMap<String, serde_json::Value>,
    pub provider: Option<McpProvider>,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub audiences: Vec<String>,
    pub jwks: RemoteJwks,
    #[serde(default)]
    pub mode: JwtAuthenticationMode,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum McpProvider {
    Auth0,
    Keycloak,
}
