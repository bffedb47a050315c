pub mod ai;
pub mod backend;
pub mod frontend;
pub mod target_ref;
pub mod traffic;

pub use self::{
    backend::BackendSpec,
    frontend::Frontend,
    target_ref::{BackendObjectReference, LocalPolicyTargetRef, LocalPolicyTargetSelector},
    traffic::Traffic,
};
use crate::status::PolicyStatus;

/// Attaches frontend, traffic, or backend settings to gateways, listeners,
/// routes, backends, or services.
#[derive(
    Clone, Debug, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "agentgateway.dev",
    version = "v1alpha1",
    kind = "AgentgatewayPolicy",
    status = "PolicyStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AgentgatewayPolicySpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_refs: Vec<LocalPolicyTargetRef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_selectors: Vec<LocalPolicyTargetSelector>,

    /// Listener-level settings. Only valid on Gateways.
    pub frontend: Option<Frontend>,

    /// Request processing settings.
    pub traffic: Option<Traffic>,

    /// Upstream connection settings.
    pub backend: Option<BackendSpec>,
}

/// A local object reference whose `name` is required.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct LocalObjectRef {
    pub name: String,
}

/// A named CEL expression.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct NamedExpression {
    pub name: String,
    pub expression: String,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Keepalive {
    pub retries: Option<i32>,
    pub time: Option<String>,
    pub interval: Option<String>,
}

/// Allows or denies requests matching any of a set of CEL expressions.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Authorization {
    pub policy: AuthorizationRules,
    #[serde(default)]
    pub action: AuthorizationAction,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRules {
    pub match_expressions: Vec<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub enum AuthorizationAction {
    #[default]
    Allow,
    Deny,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub enum JwtAuthenticationMode {
    #[default]
    Strict,
    Optional,
    Permissive,
}

/// A key set fetched from a backend; the controller reads it from the
/// pre-resolved key-set cache.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteJwks {
    pub jwks_path: String,
    pub cache_duration: Option<String>,
    pub backend_ref: BackendObjectReference,
}

// === impl AgentgatewayPolicySpec ===

impl AgentgatewayPolicySpec {
    /// True if no category configures anything.
    pub fn is_empty(&self) -> bool {
        self.frontend.as_ref().map_or(true, Frontend::is_empty)
            && self.traffic.as_ref().map_or(true, Traffic::is_empty)
            && self.backend.as_ref().map_or(true, BackendSpec::is_empty)
    }
}
