//! Folds per-declaration outcomes into a policy's `status.ancestors`.

use agw_policy_controller_core::{
    Acceptance, AncestorRef, Outcome, ResolvedRefs, STATUS_SUMMARY_GROUP,
};
use agw_policy_controller_k8s_api::{
    gateway::ParentReference, Condition, PolicyAncestorStatus, PolicyStatus, Time,
};
use chrono::{DateTime, Utc};

/// The most ancestors reported by this controller before the remainder is
/// summarized.
pub const MAX_ANCESTORS: usize = 15;

/// The API server rejects policy statuses with more entries than this.
const MAX_STATUS_ENTRIES: usize = 16;

pub(crate) const ACCEPTED: &str = "Accepted";
pub(crate) const ATTACHED: &str = "Attached";
pub(crate) const RESOLVED_REFS: &str = "ResolvedRefs";
const STATUS_SUMMARIZED: &str = "StatusSummarized";

const POLICY_ACCEPTED: &str = "Policy accepted";
const POLICY_ATTACHED: &str = "Attached to all targets";
const NOT_ATTACHED_INVALID: &str = "Policy is not attached due to invalid status";
const REFS_RESOLVED: &str = "Resolved all references";

const STATUS_TRUE: &str = "True";
const STATUS_FALSE: &str = "False";

/// Builds the status of one policy object.
///
/// Entries written by other controllers are kept, ahead of ours. Outcomes
/// naming the same ancestor are merged into one entry. Our entries are
/// ordered by ancestor and reuse the `lastTransitionTime` of a previous
/// condition whose status has not changed.
pub fn aggregate(
    controller_name: &str,
    generation: Option<i64>,
    previous: Option<&PolicyStatus>,
    outcomes: &[Outcome],
    now: DateTime<Utc>,
) -> PolicyStatus {
    let previous = previous.map(|s| s.ancestors.as_slice()).unwrap_or_default();

    let mut merged: Vec<(&AncestorRef, Acceptance, Option<ResolvedRefs>)> = vec![];
    for outcome in outcomes {
        for ancestor in &outcome.ancestors {
            match merged.iter_mut().find(|(a, ..)| *a == ancestor) {
                Some((_, acceptance, refs)) => {
                    *acceptance = std::mem::replace(acceptance, Acceptance::Valid)
                        .merge(outcome.acceptance.clone());
                    *refs = ResolvedRefs::merge(refs.take(), outcome.resolved_refs.clone());
                }
                None => merged.push((
                    ancestor,
                    outcome.acceptance.clone(),
                    outcome.resolved_refs.clone(),
                )),
            }
        }
    }
    let mut entries = merged
        .into_iter()
        .map(|(ancestor, acceptance, refs)| {
            (
                ancestor.to_string(),
                ancestor.clone(),
                conditions(&acceptance, refs.as_ref()),
            )
        })
        .collect::<Vec<_>>();
    entries.sort_by(|(a, ..), (b, ..)| a.cmp(b));

    let mut ours = Vec::with_capacity(entries.len().min(MAX_ANCESTORS + 1));
    let ignored = entries.len().saturating_sub(MAX_ANCESTORS);
    for (_, ancestor, conditions) in entries.into_iter().take(MAX_ANCESTORS) {
        ours.push(ancestor_status(
            controller_name,
            generation,
            previous,
            ancestor,
            conditions,
            now,
        ));
    }
    if ignored > 0 {
        tracing::debug!(ignored, "Summarizing ancestors beyond the status limit");
        let summary = Cond {
            type_: STATUS_SUMMARIZED,
            status: STATUS_TRUE,
            reason: "StatusSummary".to_string(),
            message: format!("{ignored} AncestorRefs ignored due to max status size"),
        };
        ours.push(ancestor_status(
            controller_name,
            generation,
            previous,
            AncestorRef::summary(STATUS_SUMMARY_GROUP),
            vec![summary],
            now,
        ));
    }

    let mut ancestors = previous
        .iter()
        .filter(|a| a.controller_name != controller_name)
        .cloned()
        .collect::<Vec<_>>();
    ancestors.extend(ours);
    ancestors.truncate(MAX_STATUS_ENTRIES);
    PolicyStatus { ancestors }
}

/// A condition before timestamps and generations are assigned.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Cond {
    type_: &'static str,
    status: &'static str,
    reason: String,
    message: String,
}

impl Cond {
    fn new(type_: &'static str, status: &'static str, reason: &str, message: &str) -> Self {
        Self {
            type_,
            status,
            reason: reason.to_string(),
            message: message.to_string(),
        }
    }
}

/// The conditions for one ancestor, ordered `Accepted`, `Attached`,
/// `ResolvedRefs`.
fn conditions(acceptance: &Acceptance, resolved_refs: Option<&ResolvedRefs>) -> Vec<Cond> {
    let mut conds = match acceptance {
        Acceptance::Valid => vec![
            Cond::new(ACCEPTED, STATUS_TRUE, "Valid", POLICY_ACCEPTED),
            Cond::new(ATTACHED, STATUS_TRUE, "Attached", POLICY_ATTACHED),
        ],
        Acceptance::PartiallyValid(message) => {
            vec![Cond::new(ACCEPTED, STATUS_TRUE, "PartiallyValid", message)]
        }
        Acceptance::Invalid(message) => vec![
            Cond::new(ACCEPTED, STATUS_TRUE, "Invalid", message),
            Cond::new(ATTACHED, STATUS_FALSE, "Pending", NOT_ATTACHED_INVALID),
        ],
        Acceptance::NotAttached(message) => vec![
            Cond::new(ACCEPTED, STATUS_TRUE, "Valid", POLICY_ACCEPTED),
            Cond::new(ATTACHED, STATUS_FALSE, "Pending", message),
        ],
        Acceptance::Conflicted { winner } => {
            let message = format!("policy {winner} matches the same target but with higher priority");
            vec![
                Cond::new(ACCEPTED, STATUS_FALSE, "Conflicted", &message),
                Cond::new(ATTACHED, STATUS_FALSE, "Conflicted", &message),
            ]
        }
        Acceptance::Rejected { reason, message } => vec![
            Cond::new(ACCEPTED, STATUS_FALSE, reason, message),
            Cond::new(ATTACHED, STATUS_FALSE, "Pending", NOT_ATTACHED_INVALID),
        ],
    };

    if let Some(refs) = resolved_refs {
        conds.push(match refs {
            ResolvedRefs::Resolved => {
                Cond::new(RESOLVED_REFS, STATUS_TRUE, "ResolvedRefs", REFS_RESOLVED)
            }
            ResolvedRefs::InvalidKind(message) => {
                Cond::new(RESOLVED_REFS, STATUS_FALSE, "InvalidKind", message)
            }
            ResolvedRefs::InvalidCaCertificateRef(message) => {
                Cond::new(RESOLVED_REFS, STATUS_FALSE, "InvalidCACertificateRef", message)
            }
        });
    }
    conds
}

fn ancestor_status(
    controller_name: &str,
    generation: Option<i64>,
    previous: &[PolicyAncestorStatus],
    ancestor: AncestorRef,
    conditions: Vec<Cond>,
    now: DateTime<Utc>,
) -> PolicyAncestorStatus {
    let ancestor_ref = parent_ref(ancestor);
    let existing = previous
        .iter()
        .find(|a| a.controller_name == controller_name && a.ancestor_ref == ancestor_ref)
        .map(|a| a.conditions.as_slice())
        .unwrap_or_default();

    let conditions = conditions
        .into_iter()
        .map(|c| {
            let last_transition_time = existing
                .iter()
                .find(|e| e.type_ == c.type_ && e.status == c.status)
                .map(|e| e.last_transition_time.clone())
                .unwrap_or_else(|| Time(now));
            Condition {
                type_: c.type_.to_string(),
                status: c.status.to_string(),
                reason: c.reason,
                message: c.message,
                observed_generation: generation,
                last_transition_time,
            }
        })
        .collect();

    PolicyAncestorStatus {
        ancestor_ref,
        controller_name: controller_name.to_string(),
        conditions,
    }
}

fn parent_ref(ancestor: AncestorRef) -> ParentReference {
    ParentReference {
        group: ancestor.group,
        kind: ancestor.kind,
        namespace: ancestor.namespace,
        name: ancestor.name,
        section_name: ancestor.section_name,
        port: ancestor.port,
    }
}
