//! Shared machinery for the category translators.
//!
//! Each category is a table of features. A feature's translator returns
//! `None` when its sub-spec is unset, so a category emits one wire policy per
//! configured feature and nothing for the rest. Errors are collected per
//! feature; a failing feature never suppresses its siblings.

use crate::{expression, Snapshot};
use agw_policy_controller_core::{PolicyKind, PolicyTarget, TypedResource, WirePolicy};
use agw_policy_controller_k8s_api::duration;
use anyhow::{anyhow, Context as _, Result};
use std::time::Duration;

pub(crate) const POLICY_KIND: &str = "AgentgatewayPolicy";

/// Everything a translator may consult for one resolved target.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Context<'a> {
    pub snapshot: &'a Snapshot,
    pub namespace: &'a str,
    pub name: &'a str,
    pub target: &'a PolicyTarget,
}

/// The result of translating one feature.
#[derive(Debug)]
pub(crate) enum Translated<T> {
    Ok(T),
    /// The feature is emitted, but parts of it were dropped.
    Partial(T, Vec<anyhow::Error>),
    Err(anyhow::Error),
}

/// One row of a category table.
pub(crate) struct Feature<S, T> {
    pub name: &'static str,
    pub suffix: &'static str,
    pub translate: fn(&Context<'_>, &S) -> Option<Translated<T>>,
}

/// Policies and rendered error messages accumulated across categories.
#[derive(Debug, Default)]
pub(crate) struct Output {
    pub policies: Vec<WirePolicy>,
    pub errors: Vec<String>,
}

// === impl Context ===

impl Context<'_> {
    pub fn owner(&self) -> TypedResource {
        TypedResource::new(POLICY_KIND, self.namespace, self.name)
    }

    /// `{category}/{ns}/{name}{suffix}{attachment}`
    pub fn key(&self, category: &str, suffix: &str) -> String {
        format!(
            "{category}/{}/{}{suffix}{}",
            self.namespace,
            self.name,
            self.target.attachment_name()
        )
    }

    pub fn policy(&self, category: &str, suffix: &str, kind: PolicyKind) -> WirePolicy {
        WirePolicy {
            key: self.key(category, suffix),
            name: Some(self.owner()),
            target: self.target.clone(),
            kind,
        }
    }
}

// === impl Translated ===

impl<T> From<Result<T>> for Translated<T> {
    fn from(res: Result<T>) -> Self {
        match res {
            Ok(t) => Self::Ok(t),
            Err(error) => Self::Err(error),
        }
    }
}

impl<T> Translated<T> {
    /// Emits `value`, reporting `errors` if there are any.
    pub fn with_errors(value: T, errors: Vec<anyhow::Error>) -> Self {
        if errors.is_empty() {
            Self::Ok(value)
        } else {
            Self::Partial(value, errors)
        }
    }
}

// === impl Output ===

impl Output {
    /// Runs every feature of a category table against `spec`.
    pub fn translate<S, T>(
        &mut self,
        ctx: &Context<'_>,
        category: &'static str,
        features: &[Feature<S, T>],
        spec: &S,
        wrap: impl Fn(T) -> PolicyKind,
    ) {
        for feature in features {
            let Some(translated) = (feature.translate)(ctx, spec) else {
                continue;
            };
            self.push(ctx, category, feature, translated, &wrap);
        }
    }

    pub fn push<S, T>(
        &mut self,
        ctx: &Context<'_>,
        category: &'static str,
        feature: &Feature<S, T>,
        translated: Translated<T>,
        wrap: impl Fn(T) -> PolicyKind,
    ) {
        let (value, errors) = match translated {
            Translated::Ok(value) => (Some(value), vec![]),
            Translated::Partial(value, errors) => (Some(value), errors),
            Translated::Err(error) => (None, vec![error]),
        };

        for error in errors {
            tracing::debug!(
                namespace = %ctx.namespace,
                name = %ctx.name,
                target = %ctx.target,
                feature = %feature.name,
                %error,
                "Failed to translate policy feature",
            );
            self.error(format!("failed to build {}: {error:#}", feature.name));
        }

        if let Some(value) = value {
            let policy = ctx.policy(category, feature.suffix, wrap(value));
            tracing::trace!(key = %policy.key, "Generated policy");
            self.policies.push(policy);
        }
    }

    pub fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    pub fn extend(&mut self, other: Output) {
        self.policies.extend(other.policies);
        self.errors.extend(other.errors);
    }
}

// === helpers ===

/// Converts a non-negative 32-bit value to its unsigned wire width.
pub(crate) fn u32_field(field: &str, value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| anyhow!("{field} must be a non-negative 32-bit integer (got {value})"))
}

pub(crate) fn opt_u32_field(field: &str, value: Option<i32>) -> Result<Option<u32>> {
    value.map(|v| u32_field(field, v)).transpose()
}

pub(crate) fn duration_field(field: &str, value: &str) -> Result<Duration> {
    duration::parse(value).with_context(|| format!("invalid {field} {value:?}"))
}

pub(crate) fn opt_duration_field(field: &str, value: Option<&String>) -> Result<Option<Duration>> {
    value.map(|v| duration_field(field, v)).transpose()
}

/// Checks that a CEL expression is well formed.
pub(crate) fn cel_field(field: &str, expr: &str) -> Result<()> {
    expression::check(expr).with_context(|| format!("{field} is not a valid CEL expression: {expr}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClusterInfo;
    use pretty_assertions::assert_eq;

    #[test]
    fn keys_include_category_feature_and_attachment() {
        let snapshot = Snapshot::new(ClusterInfo::default());
        let target = PolicyTarget::Gateway {
            namespace: "ns".to_string(),
            name: "gw".to_string(),
            listener: Some("https".to_string()),
        };
        let ctx = Context {
            snapshot: &snapshot,
            namespace: "ns",
            name: "pol",
            target: &target,
        };
        assert_eq!(ctx.key("traffic", ":cors"), "traffic/ns/pol:cors:ns/gw/https");
        assert_eq!(ctx.owner().to_string(), "AgentgatewayPolicy/ns/pol");
    }

    #[test]
    fn numeric_fields_reject_negatives() {
        assert_eq!(u32_field("maxBufferSize", 10).expect("in range"), 10);
        let err = u32_field("maxBufferSize", -1).expect_err("negative");
        assert_eq!(
            err.to_string(),
            "maxBufferSize must be a non-negative 32-bit integer (got -1)"
        );
    }

    #[test]
    fn durations_name_their_field() {
        assert_eq!(
            opt_duration_field("time", Some(&"1m30s".to_string())).expect("valid"),
            Some(Duration::from_secs(90))
        );
        let err = duration_field("time", "soon").expect_err("invalid");
        assert!(format!("{err:#}").starts_with("invalid time \"soon\": "));
    }

    #[test]
    fn expressions_are_checked() {
        assert!(cel_field("filter", "response.code >= 500").is_ok());
        let err = cel_field("filter", "response.code >=").expect_err("dangling operator");
        assert!(err
            .to_string()
            .starts_with("filter is not a valid CEL expression"));
    }
}
