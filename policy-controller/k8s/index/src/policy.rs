//! Translates an `AgentgatewayPolicy` into wire policies and per-target
//! outcomes.

use crate::{
    ancestors::resolve_ancestors,
    backend, frontend,
    resolve::{self, ResolveError},
    traffic,
    translate::{Context, Output},
    Snapshot,
};
use agw_policy_controller_core::{
    Acceptance, AncestorRef, Outcome, WirePolicy, STATUS_SUMMARY_GROUP,
};
use agw_policy_controller_k8s_api::{
    policy::LocalPolicyTargetRef, AgentgatewayPolicy, ResourceExt,
};

/// The result of translating one policy object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyTranslation {
    pub policies: Vec<WirePolicy>,
    pub outcomes: Vec<Outcome>,
}

/// Translates every declaration of `policy` against the snapshot.
///
/// Each declaration yields one outcome. A declaration that cannot be
/// resolved, or whose target kind does not permit a configured category,
/// produces no wire policies; the remaining declarations are unaffected.
/// Declarations that share an ancestor have their verdicts merged, so an
/// error in any one of them is reported against it.
pub fn translate(snapshot: &Snapshot, policy: &AgentgatewayPolicy) -> PolicyTranslation {
    let namespace = policy.namespace().unwrap_or_default();
    let name = policy.name_unchecked();
    let spec = &policy.spec;

    let declarations = resolve::declarations(snapshot, &namespace, spec);
    let Some(first) = declarations.first() else {
        tracing::debug!(%namespace, %name, "Policy has no targets");
        return PolicyTranslation {
            policies: vec![],
            outcomes: vec![Outcome {
                ancestors: vec![AncestorRef::summary(STATUS_SUMMARY_GROUP)],
                acceptance: Acceptance::Invalid("policy does not select any targets".to_string()),
                resolved_refs: None,
            }],
        };
    };

    let mut out = Output::default();
    let mut merged: Vec<(AncestorRef, Acceptance)> = Vec::with_capacity(declarations.len());

    for decl in &declarations {
        let (ancestors, acceptance) =
            translate_declaration(snapshot, policy, &namespace, &name, first, decl, &mut out);

        for ancestor in ancestors {
            match merged.iter_mut().find(|(a, _)| *a == ancestor) {
                Some((_, prior)) => {
                    *prior = std::mem::replace(prior, Acceptance::Valid).merge(acceptance.clone());
                }
                None => merged.push((ancestor, acceptance.clone())),
            }
        }
    }

    // Ancestors that share a verdict are reported together, in the order
    // they were first named.
    let mut outcomes: Vec<Outcome> = vec![];
    for (ancestor, acceptance) in merged {
        match outcomes.iter_mut().find(|o| o.acceptance == acceptance) {
            Some(outcome) => outcome.ancestors.push(ancestor),
            None => outcomes.push(Outcome {
                ancestors: vec![ancestor],
                acceptance,
                resolved_refs: None,
            }),
        }
    }

    tracing::debug!(
        %namespace,
        %name,
        policies = out.policies.len(),
        outcomes = outcomes.len(),
        "Translated policy",
    );
    PolicyTranslation {
        policies: out.policies,
        outcomes,
    }
}

fn translate_declaration(
    snapshot: &Snapshot,
    policy: &AgentgatewayPolicy,
    namespace: &str,
    name: &str,
    first: &LocalPolicyTargetRef,
    decl: &LocalPolicyTargetRef,
    out: &mut Output,
) -> (Vec<AncestorRef>, Acceptance) {
    let raw = || vec![AncestorRef::new(&decl.group, &decl.kind, namespace, &decl.name)];

    let resolved = if decl.group != first.group || decl.kind != first.kind {
        Err(ResolveError::MixedKinds)
    } else {
        resolve::resolve_target(snapshot, namespace, decl)
    };
    let target = match resolved {
        Ok(target) => target,
        Err(error) => {
            tracing::debug!(%namespace, %name, target = %decl, %error, "Skipping declaration");
            return (raw(), Acceptance::NotAttached(error.to_string()));
        }
    };

    let ancestors = resolve_ancestors(snapshot, namespace, decl);

    let restrictions = resolve::check_categories(&policy.spec, target.kind());
    if !restrictions.is_empty() {
        let message = restrictions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        tracing::debug!(%namespace, %name, %target, %message, "Declaration violates category restrictions");
        return (ancestors.refs, Acceptance::Invalid(message));
    }

    let ctx = Context {
        snapshot,
        namespace,
        name,
        target: &target,
    };
    let mut decl_out = Output::default();
    if let Some(spec) = &policy.spec.frontend {
        frontend::translate(&ctx, spec, &mut decl_out);
    }
    if let Some(spec) = &policy.spec.traffic {
        traffic::translate(&ctx, spec, &mut decl_out);
    }
    if let Some(spec) = &policy.spec.backend {
        backend::translate(&ctx, spec, &mut decl_out);
    }

    let acceptance = match ancestors.error {
        Some(error) => Acceptance::NotAttached(error),
        None => Acceptance::from_translation(decl_out.policies.len(), &decl_out.errors),
    };
    out.extend(decl_out);
    (ancestors.refs, acceptance)
}
