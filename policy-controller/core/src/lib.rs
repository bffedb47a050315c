#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod outcome;
pub mod policy;
mod priority;
pub mod target;

pub use self::{
    outcome::{Acceptance, AncestorRef, Outcome, ResolvedRefs},
    policy::{PolicyKind, TypedResource, WirePolicy},
    priority::ClaimPriority,
    target::{PolicyTarget, TargetKind},
};

pub const POLICY_CONTROLLER_NAME: &str = "agentgateway.dev/agentgateway";

/// The group of the synthetic ancestor used for summary status entries.
pub const STATUS_SUMMARY_GROUP: &str = "gateway.kgateway.dev";
