use super::{Attribute, BackendReference, Header, JwtMode, Rbac};
use std::{collections::BTreeMap, time::Duration};

/// A traffic sub-policy, tagged with the phase in which it executes.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct TrafficPolicy {
    pub phase: Phase,
    pub kind: TrafficKind,
}

/// Gateway-phase policies run before route selection; route-phase policies run
/// after it. Policies in different phases never merge.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub enum Phase {
    Gateway,
    #[default]
    Route,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrafficKind {
    ExtAuthz(ExtAuthz),
    ExtProc(ExtProc),
    Authorization(Rbac),
    LocalRateLimit(Vec<LocalRateLimit>),
    RemoteRateLimit(RemoteRateLimit),
    Transformation(Transformation),
    Csrf(Csrf),
    Cors(Cors),
    HeaderModifier(HeaderModifier),
    HostRewrite(HostRewrite),
    Retry(Retry),
    Timeout(Timeout),
    Jwt(Jwt),
    BasicAuth(BasicAuth),
    ApiKeyAuth(ApiKeyAuth),
    DirectResponse(DirectResponse),
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ExtAuthz {
    /// Unset when the backend could not be resolved; the data plane then
    /// denies every request rather than skipping authorization.
    pub target: Option<BackendReference>,
    pub failure_mode: ExtAuthzFailureMode,
    pub protocol: ExtAuthzProtocol,
    pub include_request_headers: Vec<String>,
    pub include_request_body: Option<BodyOptions>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum ExtAuthzFailureMode {
    Allow,
    Deny,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtAuthzProtocol {
    Grpc {
        context: BTreeMap<String, String>,
        metadata: BTreeMap<String, String>,
    },
    Http {
        path: Option<String>,
        redirect: Option<String>,
        include_response_headers: Vec<String>,
        add_request_headers: BTreeMap<String, String>,
        metadata: BTreeMap<String, String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BodyOptions {
    pub max_request_bytes: u32,
    pub allow_partial_message: bool,
    pub pack_as_bytes: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ExtProc {
    pub target: BackendReference,
    pub failure_mode: ExtProcFailureMode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum ExtProcFailureMode {
    FailClosed,
    FailOpen,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct LocalRateLimit {
    pub max_tokens: u64,
    pub tokens_per_fill: u64,
    pub fill_interval: Duration,
    pub kind: RateLimitKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum RateLimitKind {
    Requests,
    Tokens,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RemoteRateLimit {
    pub domain: String,
    pub target: BackendReference,
    pub descriptors: Vec<Descriptor>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Descriptor {
    pub entries: Vec<Attribute>,
    pub kind: RateLimitKind,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Transformation {
    pub request: Option<Transform>,
    pub response: Option<Transform>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Transform {
    pub set: Vec<Header>,
    pub add: Vec<Header>,
    pub remove: Vec<String>,
    pub body: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Csrf {
    pub additional_origins: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Cors {
    pub allow_credentials: bool,
    pub allow_headers: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_origins: Vec<String>,
    pub expose_headers: Vec<String>,
    pub max_age: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct HeaderModifier {
    pub request: Option<HeaderEdits>,
    pub response: Option<HeaderEdits>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct HeaderEdits {
    pub add: Vec<Header>,
    pub set: Vec<Header>,
    pub remove: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum HostRewrite {
    Auto,
    None,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Retry {
    pub attempts: u8,
    pub backoff: Option<Duration>,
    pub codes: Vec<u16>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Timeout {
    pub request: Option<Duration>,
    pub backend_request: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Jwt {
    pub mode: JwtMode,
    pub providers: Vec<JwtProvider>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct JwtProvider {
    pub issuer: String,
    pub audiences: Vec<String>,
    /// The JSON key-set, inlined or taken from the key-set cache.
    pub jwks: String,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BasicAuth {
    pub htpasswd: String,
    pub realm: Option<String>,
    pub mode: BasicAuthMode,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub enum BasicAuthMode {
    #[default]
    Strict,
    Optional,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ApiKeyAuth {
    pub keys: Vec<ApiKey>,
    pub mode: BasicAuthMode,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ApiKey {
    pub key: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DirectResponse {
    pub status: u16,
    pub body: Option<String>,
}
