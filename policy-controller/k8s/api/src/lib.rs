#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod backend_tls_policy;
pub mod duration;
pub mod labels;
pub mod policy;
pub mod status;

pub use self::{
    backend::{AgentgatewayBackend, AgentgatewayBackendSpec},
    backend_tls_policy::{BackendTlsPolicy, BackendTlsPolicySpec},
    labels::Labels,
    policy::{AgentgatewayPolicy, AgentgatewayPolicySpec},
    status::{PolicyAncestorStatus, PolicyStatus},
};
pub use k8s_gateway_api::{self as gateway, Gateway, HttpRoute};
pub use k8s_openapi::{
    api::core::v1::{ConfigMap, LocalObjectReference, Secret, Service, ServicePort, ServiceSpec},
    apimachinery::pkg::apis::meta::v1::{Condition, Time},
    ByteString,
};
pub use kube::{
    api::{Api, ObjectMeta, Patch, PatchParams, Resource, ResourceExt},
    Client,
};

/// The API group of the agentgateway resources.
pub const AGENTGATEWAY_GROUP: &str = "agentgateway.dev";

/// The API group of the Gateway API resources.
pub const GATEWAY_GROUP: &str = "gateway.networking.k8s.io";
