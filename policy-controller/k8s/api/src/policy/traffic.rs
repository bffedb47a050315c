use super::{
    Authorization, BackendObjectReference, JwtAuthenticationMode, LocalObjectRef,
    NamedExpression, RemoteJwks,
};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Traffic {
    pub phase: Option<PolicyPhase>,
    pub transformation: Option<Transformation>,
    pub ext_proc: Option<ExtProc>,
    pub ext_auth: Option<ExtAuth>,
    pub rate_limit: Option<RateLimits>,
    pub cors: Option<Cors>,
    pub csrf: Option<Csrf>,
    pub header_modifiers: Option<HeaderModifiers>,
    pub host_rewrite: Option<HostRewrite>,
    pub timeouts: Option<Timeouts>,
    pub retry: Option<Retry>,
    pub authorization: Option<Authorization>,
    pub jwt_authentication: Option<JwtAuthentication>,
    pub basic_authentication: Option<BasicAuthentication>,
    pub api_key_authentication: Option<ApiKeyAuthentication>,
    pub direct_response: Option<DirectResponse>,
}

impl Traffic {
    /// True if no setting is configured. The phase alone configures nothing.
    pub fn is_empty(&self) -> bool {
        self.transformation.is_none()
            && self.ext_proc.is_none()
            && self.ext_auth.is_none()
            && self.rate_limit.is_none()
            && self.cors.is_none()
            && self.csrf.is_none()
            && self.header_modifiers.is_none()
            && self.host_rewrite.is_none()
            && self.timeouts.is_none()
            && self.retry.is_none()
            && self.authorization.is_none()
            && self.jwt_authentication.is_none()
            && self.basic_authentication.is_none()
            && self.api_key_authentication.is_none()
            && self.direct_response.is_none()
    }
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum PolicyPhase {
    PreRouting,
    PostRouting,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Transformation {
    pub request: Option<Transform>,
    pub response: Option<Transform>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Transform {
    #[serde(default)]
    pub set: Vec<HeaderTransformation>,
    #[serde(default)]
    pub add: Vec<HeaderTransformation>,
    #[serde(default)]
    pub remove: Vec<String>,
    /// A CEL expression producing the new body.
    pub body: Option<String>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct HeaderTransformation {
    pub name: String,
    /// A CEL expression.
    pub value: String,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtProc {
    pub backend_ref: BackendObjectReference,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtAuth {
    pub backend_ref: BackendObjectReference,
    pub grpc: Option<ExtAuthGrpc>,
    pub http: Option<ExtAuthHttp>,
    pub forward_body: Option<ExtAuthBody>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtAuthGrpc {
    #[serde(default)]
    pub context_extensions: BTreeMap<String, String>,
    #[serde(default)]
    pub request_metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtAuthHttp {
    pub path: Option<String>,
    pub redirect: Option<String>,
    #[serde(default)]
    pub allowed_request_headers: Vec<String>,
    #[serde(default)]
    pub add_request_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub allowed_response_headers: Vec<String>,
    #[serde(default)]
    pub response_metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtAuthBody {
    pub max_size: i32,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct RateLimits {
    #[serde(default)]
    pub local: Vec<LocalRateLimit>,
    pub global: Option<GlobalRateLimit>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct LocalRateLimit {
    pub requests: Option<i32>,
    pub tokens: Option<i32>,
    pub unit: LocalRateLimitUnit,
    pub burst: Option<i32>,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum LocalRateLimitUnit {
    Seconds,
    Minutes,
    Hours,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRateLimit {
    pub backend_ref: BackendObjectReference,
    pub domain: String,
    pub descriptors: Vec<RateLimitDescriptor>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct RateLimitDescriptor {
    pub entries: Vec<NamedExpression>,
    pub unit: Option<RateLimitUnit>,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum RateLimitUnit {
    Requests,
    Tokens,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cors {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default)]
    pub allow_methods: Vec<String>,
    #[serde(default)]
    pub allow_headers: Vec<String>,
    #[serde(default)]
    pub expose_headers: Vec<String>,
    pub allow_credentials: Option<bool>,
    /// Seconds.
    pub max_age: Option<i32>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Csrf {
    #[serde(default)]
    pub additional_origins: Vec<String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct HeaderModifiers {
    pub request: Option<HeaderFilter>,
    pub response: Option<HeaderFilter>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct HeaderFilter {
    #[serde(default)]
    pub set: Vec<HttpHeader>,
    #[serde(default)]
    pub add: Vec<HttpHeader>,
    #[serde(default)]
    pub remove: Vec<String>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct HostRewrite {
    pub mode: HostRewriteMode,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum HostRewriteMode {
    Auto,
    None,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Timeouts {
    pub request: Option<String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Retry {
    #[serde(default)]
    pub codes: Vec<i32>,
    pub attempts: Option<i64>,
    pub backoff: Option<String>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct JwtAuthentication {
    #[serde(default)]
    pub mode: JwtAuthenticationMode,
    pub providers: Vec<JwtProvider>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct JwtProvider {
    pub issuer: String,
    #[serde(default)]
    pub audiences: Vec<String>,
    pub jwks: Jwks,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Jwks {
    pub remote: Option<RemoteJwks>,
    pub inline: Option<String>,
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum CredentialMode {
    #[default]
    Strict,
    Optional,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuthentication {
    #[serde(default)]
    pub mode: CredentialMode,
    pub realm: Option<String>,
    /// Inline `htpasswd` entries; take precedence over `secretRef`.
    #[serde(default)]
    pub users: Vec<String>,
    pub secret_ref: Option<LocalObjectRef>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyAuthentication {
    #[serde(default)]
    pub mode: CredentialMode,
    pub secret_ref: Option<LocalObjectRef>,
    pub secret_selector: Option<crate::labels::Selector>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct DirectResponse {
    pub status: i32,
    pub body: Option<String>,
}
