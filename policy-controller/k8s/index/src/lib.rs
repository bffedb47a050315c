//! Agentgateway Policy Controller Index
//!
//! Translates user-authored policy resources into the normalized wire policies consumed by the
//! data plane, along with the per-target outcomes from which policy status is derived. The index
//! watches the following cluster resources:
//!
//! - `AgentgatewayPolicy` and `BackendTLSPolicy` resources are the policies being translated.
//! - `Gateway`, `HTTPRoute`, `AgentgatewayBackend`, and `Service` resources are the targets to
//!   which policies attach. A policy attached to an `HTTPRoute` reports status against the route's
//!   parent `Gateway`s.
//! - `Secret` and `ConfigMap` resources hold credentials, certificates, and pre-resolved JWKS
//!   documents that translation reads.
//!
//! ```text
//! [ Gateway | HTTPRoute | Backend | Service ] <- [ AgentgatewayPolicy ] -> [ Secret | ConfigMap ]
//! ```
//!
//! Translation is a pure function of the [`Snapshot`] and a policy object: it never writes to the
//! snapshot, and the same inputs always produce the same wire policies and outcomes. Failures in
//! one declaration or feature are recorded in that declaration's outcome and never prevent the
//! rest of the policy from being translated.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod a2a;
mod ancestors;
mod backend;
mod backend_ref;
mod backend_tls;
mod cluster_info;
mod conflict;
pub mod expression;
mod frontend;
mod policy;
pub mod resolve;
pub mod snapshot;
mod traffic;
mod translate;

#[cfg(test)]
mod tests;

pub use self::{
    a2a::{translate as translate_a2a, A2A_APP_PROTOCOL},
    ancestors::{resolve_ancestors, Ancestors},
    backend_tls::translate as translate_backend_tls,
    cluster_info::ClusterInfo,
    policy::{translate as translate_policy, PolicyTranslation},
    snapshot::{SharedSnapshot, Snapshot},
};
