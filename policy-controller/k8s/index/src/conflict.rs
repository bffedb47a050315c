//! Picks a single winner among policies that claim the same target.

use agw_policy_controller_core::ClaimPriority;
use agw_policy_controller_k8s_api::{policy::LocalPolicyTargetRef, ResourceExt};

/// Two declarations claim the same target when they name the same group,
/// kind, name, and section.
pub(crate) fn same_target(a: &LocalPolicyTargetRef, b: &LocalPolicyTargetRef) -> bool {
    a.group == b.group && a.kind == b.kind && a.name == b.name && a.section_name == b.section_name
}

pub(crate) fn priority<R: ResourceExt>(resource: &R) -> ClaimPriority {
    ClaimPriority::new(
        resource.creation_timestamp().map(|t| t.0),
        resource.namespace().unwrap_or_default(),
        resource.name_unchecked(),
    )
}

/// Returns the claimant that outranks `own`, if any.
pub(crate) fn outranked_by(
    own: &ClaimPriority,
    claimants: impl IntoIterator<Item = ClaimPriority>,
) -> Option<ClaimPriority> {
    claimants
        .into_iter()
        .filter(|c| c != own)
        .min()
        .filter(|winner| winner.wins_over(own))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{offset::Utc, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(secs: i64, name: &str) -> ClaimPriority {
        ClaimPriority::new(Utc.timestamp_opt(secs, 0).single(), "ns", name)
    }

    #[test]
    fn oldest_claim_wins() {
        let a = at(0, "a");
        let b = at(1, "b");
        assert_eq!(outranked_by(&b, [a.clone(), b.clone()]), Some(a.clone()));
        assert_eq!(outranked_by(&a, [a.clone(), b]), None);
    }

    #[test]
    fn simultaneous_claims_order_by_name() {
        let a = at(0, "a");
        let b = at(0, "b");
        let c = at(0, "c");
        let all = [c.clone(), a.clone(), b.clone()];
        assert_eq!(outranked_by(&a, all.clone()), None);
        assert_eq!(outranked_by(&b, all.clone()), Some(a.clone()));
        assert_eq!(outranked_by(&c, all), Some(a));
    }

    #[test]
    fn sole_claimant_is_not_conflicted() {
        let a = at(0, "a");
        assert_eq!(outranked_by(&a, [a.clone()]), None);
    }

    #[test]
    fn sections_distinguish_targets() {
        let target = |section: Option<&str>| LocalPolicyTargetRef {
            group: String::new(),
            kind: "Service".to_string(),
            name: "svc".to_string(),
            section_name: section.map(Into::into),
        };
        assert!(same_target(&target(None), &target(None)));
        assert!(!same_target(&target(Some("http")), &target(None)));
        assert!(!same_target(&target(Some("http")), &target(Some("grpc"))));
    }
}
