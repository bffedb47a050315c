use super::{BackendReference, Keepalive, Rbac};
use std::{collections::BTreeMap, time::Duration};

/// Upstream connection settings.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendPolicy {
    Tls(BackendTls),
    Http(BackendHttp),
    Tcp(BackendTcp),
    Auth(BackendAuth),
    McpAuthorization(Rbac),
    McpAuthentication(McpAuthentication),
    Ai(Ai),
    A2a,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct BackendTls {
    pub cert: Option<String>,
    pub key: Option<String>,
    /// PEM roots; [`BackendTls::INVALID_ROOT`] when the configured roots could not
    /// be loaded.
    pub root: Option<String>,
    pub hostname: Option<String>,
    pub verify_subject_alt_names: Vec<String>,
    pub insecure: Option<InsecureTls>,
    pub alpn: Option<Vec<String>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum InsecureTls {
    All,
    Hostname,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct BackendHttp {
    pub version: Option<HttpVersion>,
    pub request_timeout: Option<Duration>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum HttpVersion {
    Http1,
    Http2,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct BackendTcp {
    pub keepalives: Option<Keepalive>,
    pub connect_timeout: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendAuth {
    Key(String),
    Passthrough,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct McpAuthentication {
    pub issuer: String,
    pub audiences: Vec<String>,
    pub provider: Option<McpIdentityProvider>,
    pub resource_metadata: BTreeMap<String, serde_json::Value>,
    pub jwks: String,
    pub mode: super::JwtMode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum McpIdentityProvider {
    Auth0,
    Keycloak,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Ai {
    pub prompt_enrichment: Option<PromptEnrichment>,
    pub defaults: BTreeMap<String, serde_json::Value>,
    pub overrides: BTreeMap<String, serde_json::Value>,
    pub prompt_guard: Option<PromptGuard>,
    pub model_aliases: BTreeMap<String, String>,
    pub prompt_caching: Option<PromptCaching>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PromptEnrichment {
    pub prepend: Vec<Message>,
    pub append: Vec<Message>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PromptGuard {
    pub request: Vec<Guard>,
    pub response: Vec<Guard>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Guard {
    pub kind: GuardKind,
    pub rejection: Option<Rejection>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GuardKind {
    Regex(RegexRules),
    Webhook(Webhook),
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RegexRules {
    pub action: RegexAction,
    pub patterns: Vec<String>,
    pub builtins: Vec<Builtin>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub enum RegexAction {
    #[default]
    Mask,
    Reject,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum Builtin {
    Ssn,
    CreditCard,
    PhoneNumber,
    Email,
    CaSin,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Webhook {
    pub target: BackendReference,
    pub forward_header_matches: Vec<HeaderMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaderMatch {
    Exact { name: String, value: String },
    Regex { name: String, pattern: String },
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Rejection {
    pub body: String,
    pub status: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PromptCaching {
    pub cache_system: bool,
    pub cache_messages: bool,
    pub cache_tools: bool,
    pub min_tokens: Option<u32>,
}

// === impl BackendTls ===

impl BackendTls {
    pub const INVALID_ROOT: &'static str = "invalid";
}
