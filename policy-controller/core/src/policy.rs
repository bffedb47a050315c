//! Wire policies: the normalized units handed to the data plane.
//!
//! Every payload type sets only the fields its source declared, leaving the
//! rest unset. The data plane merges overlapping policies field-by-field,
//! giving precedence to the more specific [`TargetKind`](crate::TargetKind).

pub mod backend;
pub mod frontend;
pub mod traffic;

use crate::PolicyTarget;
use std::time::Duration;

pub use self::{backend::BackendPolicy, frontend::FrontendPolicy, traffic::TrafficPolicy};

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct WirePolicy {
    /// Unique per owner, category, feature and target.
    pub key: String,
    /// The resource that produced this policy.
    pub name: Option<TypedResource>,
    pub target: PolicyTarget,
    pub kind: PolicyKind,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub struct TypedResource {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyKind {
    Frontend(FrontendPolicy),
    Traffic(TrafficPolicy),
    Backend(BackendPolicy),
}

/// A concrete destination for side calls (auth servers, tracing collectors,
/// rate limit services, webhooks).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendReference {
    Service {
        hostname: String,
        namespace: String,
        port: u16,
    },
    /// An `AgentgatewayBackend`, keyed by `namespace/name`.
    Backend(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Keepalive {
    pub time: Option<Duration>,
    pub interval: Option<Duration>,
    pub retries: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// A named CEL expression.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Attribute {
    pub name: String,
    pub expression: String,
}

/// Allow and deny CEL rule sets.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Rbac {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum JwtMode {
    Strict,
    Optional,
    Permissive,
}

// === impl WirePolicy ===

impl WirePolicy {
    pub fn is_frontend(&self) -> bool {
        matches!(self.kind, PolicyKind::Frontend(_))
    }

    pub fn is_traffic(&self) -> bool {
        matches!(self.kind, PolicyKind::Traffic(_))
    }

    pub fn is_backend(&self) -> bool {
        matches!(self.kind, PolicyKind::Backend(_))
    }
}

// === impl TypedResource ===

impl TypedResource {
    pub fn new(kind: impl ToString, namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for TypedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}
