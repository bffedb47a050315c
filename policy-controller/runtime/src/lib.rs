pub use agw_policy_controller_core as core;
pub use agw_policy_controller_k8s_api as k8s;
pub use agw_policy_controller_k8s_index as index;
pub use agw_policy_controller_k8s_status as status;

mod args;
mod reconcile;
mod sink;

#[cfg(test)]
mod tests;

pub use self::{
    args::Args,
    reconcile::{Reconciled, Reconciler},
    sink::{PolicySink, WirePolicies},
};
