use crate::{
    backend_ref,
    frontend::attributes,
    translate::{opt_u32_field, Context, Translated},
};
use agw_policy_controller_core::policy::traffic::{
    Descriptor, LocalRateLimit, RateLimitKind, RemoteRateLimit, TrafficKind,
};
use agw_policy_controller_k8s_api::policy::traffic as api;
use anyhow::{bail, Context as _, Result};
use std::time::Duration;

/// Only the first configured local limit is enforced.
pub(super) fn local(_: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let limit = traffic.rate_limit.as_ref()?.local.first()?;
    Some(
        local_limit(limit)
            .map(|limit| TrafficKind::LocalRateLimit(vec![limit]))
            .into(),
    )
}

fn local_limit(limit: &api::LocalRateLimit) -> Result<LocalRateLimit> {
    let (capacity, kind) = match (
        opt_u32_field("requests", limit.requests)?,
        opt_u32_field("tokens", limit.tokens)?,
    ) {
        (Some(requests), _) => (requests, RateLimitKind::Requests),
        (None, Some(tokens)) => (tokens, RateLimitKind::Tokens),
        (None, None) => bail!("local rate limit requires requests or tokens"),
    };
    let burst = opt_u32_field("burst", limit.burst)?.unwrap_or(0);

    let fill_interval = match limit.unit {
        api::LocalRateLimitUnit::Seconds => Duration::from_secs(1),
        api::LocalRateLimitUnit::Minutes => Duration::from_secs(60),
        api::LocalRateLimitUnit::Hours => Duration::from_secs(60 * 60),
    };

    Ok(LocalRateLimit {
        max_tokens: u64::from(capacity) + u64::from(burst),
        tokens_per_fill: u64::from(capacity),
        fill_interval,
        kind,
    })
}

pub(super) fn global(ctx: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let global = traffic.rate_limit.as_ref()?.global.as_ref()?;
    Some(
        remote(ctx, global)
            .map(TrafficKind::RemoteRateLimit)
            .into(),
    )
}

fn remote(ctx: &Context<'_>, global: &api::GlobalRateLimit) -> Result<RemoteRateLimit> {
    let target = backend_ref::resolve(ctx.snapshot, ctx.namespace, &global.backend_ref)
        .context("failed to build global rate limit")?;
    let descriptors = global
        .descriptors
        .iter()
        .map(|d| {
            Ok(Descriptor {
                entries: attributes(&d.entries)?,
                kind: match d.unit {
                    Some(api::RateLimitUnit::Tokens) => RateLimitKind::Tokens,
                    Some(api::RateLimitUnit::Requests) | None => RateLimitKind::Requests,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RemoteRateLimit {
        domain: global.domain.clone(),
        target,
        descriptors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn mk_limit(requests: Option<i32>, tokens: Option<i32>, burst: Option<i32>) -> api::LocalRateLimit {
        api::LocalRateLimit {
            requests,
            tokens,
            unit: api::LocalRateLimitUnit::Minutes,
            burst,
        }
    }

    #[rstest]
    #[case(mk_limit(Some(10), None, Some(5)), 15, 10, RateLimitKind::Requests)]
    #[case(mk_limit(Some(10), Some(99), None), 10, 10, RateLimitKind::Requests)]
    #[case(mk_limit(None, Some(1000), Some(24)), 1024, 1000, RateLimitKind::Tokens)]
    fn local_limits(
        #[case] limit: api::LocalRateLimit,
        #[case] max_tokens: u64,
        #[case] tokens_per_fill: u64,
        #[case] kind: RateLimitKind,
    ) {
        assert_eq!(
            local_limit(&limit).expect("valid limit"),
            LocalRateLimit {
                max_tokens,
                tokens_per_fill,
                fill_interval: Duration::from_secs(60),
                kind,
            }
        );
    }

    #[test]
    fn local_limit_requires_a_capacity() {
        let err = local_limit(&mk_limit(None, None, Some(1))).expect_err("no capacity");
        assert_eq!(err.to_string(), "local rate limit requires requests or tokens");
    }

    #[test]
    fn local_limit_rejects_negative_burst() {
        assert!(local_limit(&mk_limit(Some(1), None, Some(-1))).is_err());
    }
}
