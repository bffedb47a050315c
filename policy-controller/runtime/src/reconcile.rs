use crate::{
    index::{self, SharedSnapshot},
    k8s::ResourceExt,
    sink::PolicySink,
    status::{self, PolicyRef, PolicyResource},
};
use ahash::AHashSet as HashSet;
use tokio::time::{self, Duration, MissedTickBehavior};

/// Periodically translates every policy in the snapshot, publishes the
/// resulting wire policies, and reports each policy's status.
pub struct Reconciler {
    snapshot: SharedSnapshot,
    status: status::SharedIndex,
    sink: PolicySink,
}

/// Counts from a single reconciliation pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub wire_policies: usize,
    pub patches: usize,
}

impl Reconciler {
    pub fn new(snapshot: SharedSnapshot, status: status::SharedIndex, sink: PolicySink) -> Self {
        Self {
            snapshot,
            status,
            sink,
        }
    }

    pub async fn run(self, period: Duration) {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Reconciled {
                wire_policies,
                patches,
            } = self.reconcile();
            tracing::debug!(wire_policies, patches, "Reconciled");
        }
    }

    /// Runs one pass over the current snapshot.
    ///
    /// The snapshot lock is released before statuses are reported.
    pub fn reconcile(&self) -> Reconciled {
        let mut policies = vec![];
        let mut reports = vec![];
        {
            let snapshot = self.snapshot.read();

            for policy in snapshot.policies() {
                let index::PolicyTranslation {
                    policies: wire,
                    outcomes,
                } = index::translate_policy(&snapshot, policy);
                policies.extend(wire);
                reports.push((
                    PolicyRef::new(
                        PolicyResource::AgentgatewayPolicy,
                        policy.namespace().unwrap_or_default(),
                        policy.name_unchecked(),
                    ),
                    policy.metadata.generation,
                    policy.status.clone(),
                    outcomes,
                ));
            }

            for policy in snapshot.backend_tls_policies() {
                let index::PolicyTranslation {
                    policies: wire,
                    outcomes,
                } = index::translate_backend_tls(&snapshot, policy);
                policies.extend(wire);
                // Policies whose targets this controller does not own report
                // nothing and are left untouched.
                if outcomes.is_empty() {
                    continue;
                }
                reports.push((
                    PolicyRef::new(
                        PolicyResource::BackendTlsPolicy,
                        policy.namespace().unwrap_or_default(),
                        policy.name_unchecked(),
                    ),
                    policy.metadata.generation,
                    policy.status.clone(),
                    outcomes,
                ));
            }

            policies.extend(index::translate_a2a(&snapshot));
        }

        let wire_policies = policies.len();
        if self.sink.update(policies) {
            tracing::info!(wire_policies, "Published wire policies");
        }

        let mut status = self.status.write();
        let live = reports
            .iter()
            .map(|(id, ..)| id.clone())
            .collect::<HashSet<_>>();
        status.retain(&live);

        let mut patches = 0;
        for (id, generation, current, outcomes) in reports {
            if status.report(id, generation, current.as_ref(), &outcomes) {
                patches += 1;
            }
        }

        Reconciled {
            wire_policies,
            patches,
        }
    }
}
