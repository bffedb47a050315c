//! Translates `spec.traffic`: request processing on gateways and routes.

mod auth;
mod rate_limit;

pub(crate) use self::auth::{jwt_mode, rbac};

use crate::{
    backend_ref,
    translate::{cel_field, opt_duration_field, u32_field, Context, Feature, Output, Translated},
};
use agw_policy_controller_core::{
    policy::{
        traffic::{
            BodyOptions, Cors, Csrf, DirectResponse, ExtAuthz, ExtAuthzFailureMode,
            ExtAuthzProtocol, ExtProc, ExtProcFailureMode, HeaderEdits, HeaderModifier,
            HostRewrite, Phase, Retry, Timeout, TrafficKind, Transform, Transformation,
        },
        Header, TrafficPolicy,
    },
    PolicyKind,
};
use agw_policy_controller_k8s_api::policy::traffic::{self as api, PolicyPhase};
use anyhow::{anyhow, bail, Result};
use std::{collections::BTreeMap, time::Duration};

pub(crate) const CATEGORY: &str = "traffic";

/// Features that may run before route selection.
const PRE_ROUTING: &[&str] = &["extAuth", "extProc", "transformation"];

const FEATURES: &[Feature<api::Traffic, TrafficKind>] = &[
    Feature {
        name: "extAuth",
        suffix: ":extauth",
        translate: ext_auth,
    },
    Feature {
        name: "extProc",
        suffix: ":extproc",
        translate: ext_proc,
    },
    Feature {
        name: "authorization",
        suffix: ":rbac",
        translate: auth::authorization,
    },
    Feature {
        name: "localRateLimit",
        suffix: ":rl-local",
        translate: rate_limit::local,
    },
    Feature {
        name: "globalRateLimit",
        suffix: ":rl-global",
        translate: rate_limit::global,
    },
    Feature {
        name: "transformation",
        suffix: ":transformation",
        translate: transformation,
    },
    Feature {
        name: "csrf",
        suffix: ":csrf",
        translate: csrf,
    },
    Feature {
        name: "cors",
        suffix: ":cors",
        translate: cors,
    },
    Feature {
        name: "headerModifiers",
        suffix: ":header-modifier",
        translate: header_modifiers,
    },
    Feature {
        name: "hostRewrite",
        suffix: ":hostname-rewrite",
        translate: host_rewrite,
    },
    Feature {
        name: "timeouts",
        suffix: ":timeout",
        translate: timeouts,
    },
    Feature {
        name: "retry",
        suffix: ":retry",
        translate: retry,
    },
    Feature {
        name: "directResponse",
        suffix: ":direct-response",
        translate: direct_response,
    },
    Feature {
        name: "jwtAuthentication",
        suffix: ":jwt",
        translate: auth::jwt,
    },
    Feature {
        name: "apiKeyAuthentication",
        suffix: ":apikeyauth",
        translate: auth::api_keys,
    },
    Feature {
        name: "basicAuthentication",
        suffix: ":basicauth",
        translate: auth::basic,
    },
];

pub(crate) fn translate(ctx: &Context<'_>, traffic: &api::Traffic, out: &mut Output) {
    let pre_routing = traffic.phase == Some(PolicyPhase::PreRouting);
    let phase = if pre_routing {
        Phase::Gateway
    } else {
        Phase::Route
    };
    let wrap = |kind: TrafficKind| PolicyKind::Traffic(TrafficPolicy { phase, kind });

    for feature in FEATURES {
        let Some(translated) = (feature.translate)(ctx, traffic) else {
            continue;
        };
        if pre_routing && !PRE_ROUTING.contains(&feature.name) {
            out.error(format!(
                "phase PreRouting does not support {}; only extAuth, transformation, and extProc may be set",
                feature.name
            ));
            continue;
        }
        out.push(ctx, CATEGORY, feature, translated, &wrap);
    }
}

fn ext_auth(ctx: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let ext_auth = traffic.ext_auth.as_ref()?;

    let include_request_body = match &ext_auth.forward_body {
        Some(body) => match u32_field("forwardBody.maxSize", body.max_size) {
            Ok(max_request_bytes) => Some(BodyOptions {
                max_request_bytes,
                allow_partial_message: true,
                pack_as_bytes: false,
            }),
            Err(error) => return Some(Translated::Err(error)),
        },
        None => None,
    };

    let (protocol, include_request_headers) = match (&ext_auth.grpc, &ext_auth.http) {
        (Some(grpc), _) => (
            ExtAuthzProtocol::Grpc {
                context: grpc.context_extensions.clone(),
                metadata: grpc.request_metadata.clone(),
            },
            vec![],
        ),
        (None, Some(http)) => (
            ExtAuthzProtocol::Http {
                path: http.path.clone(),
                redirect: http.redirect.clone(),
                include_response_headers: http.allowed_response_headers.clone(),
                add_request_headers: http.add_request_headers.clone(),
                metadata: http.response_metadata.clone(),
            },
            http.allowed_request_headers.clone(),
        ),
        (None, None) => (
            ExtAuthzProtocol::Grpc {
                context: BTreeMap::new(),
                metadata: BTreeMap::new(),
            },
            vec![],
        ),
    };

    for (key, expr) in protocol_expressions(&protocol) {
        if let Err(error) = cel_field(key, expr) {
            return Some(Translated::Err(error));
        }
    }

    // An unresolvable authorization server still yields a policy, without a
    // target, so that requests are denied instead of passing unauthenticated.
    let (target, errors) = match backend_ref::resolve(ctx.snapshot, ctx.namespace, &ext_auth.backend_ref) {
        Ok(target) => (Some(target), vec![]),
        Err(error) => (None, vec![error]),
    };

    let spec = ExtAuthz {
        target,
        failure_mode: ExtAuthzFailureMode::Deny,
        protocol,
        include_request_headers,
        include_request_body,
    };
    Some(Translated::with_errors(TrafficKind::ExtAuthz(spec), errors))
}

/// CEL-typed entries of the protocol settings.
fn protocol_expressions(protocol: &ExtAuthzProtocol) -> Vec<(&str, &str)> {
    let maps = match protocol {
        ExtAuthzProtocol::Grpc { metadata, .. } => vec![metadata],
        ExtAuthzProtocol::Http {
            add_request_headers,
            metadata,
            ..
        } => vec![add_request_headers, metadata],
    };
    maps.into_iter()
        .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .collect()
}

fn ext_proc(ctx: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let ext_proc = traffic.ext_proc.as_ref()?;
    let res = backend_ref::resolve(ctx.snapshot, ctx.namespace, &ext_proc.backend_ref).map(|target| {
        TrafficKind::ExtProc(ExtProc {
            target,
            failure_mode: ExtProcFailureMode::FailClosed,
        })
    });
    Some(res.into())
}

fn transformation(_: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let spec = traffic.transformation.as_ref()?;
    let mut errors = vec![];
    let request = spec.request.as_ref().and_then(|t| transform(t, &mut errors));
    let response = spec.response.as_ref().and_then(|t| transform(t, &mut errors));

    if request.is_none() && response.is_none() {
        if errors.is_empty() {
            return None;
        }
        let message = errors
            .iter()
            .map(|e| format!("{e:#}"))
            .collect::<Vec<_>>()
            .join("; ");
        return Some(Translated::Err(anyhow!(message)));
    }

    let kind = TrafficKind::Transformation(Transformation { request, response });
    Some(Translated::with_errors(kind, errors))
}

/// Converts one direction of a transformation. Entries with malformed
/// expressions are dropped; `None` if nothing remains.
fn transform(spec: &api::Transform, errors: &mut Vec<anyhow::Error>) -> Option<Transform> {
    let mut headers = |list: &[api::HeaderTransformation]| {
        list.iter()
            .filter_map(|h| match cel_field(&format!("header {}", h.name), &h.value) {
                Ok(()) => Some(Header {
                    name: h.name.clone(),
                    value: h.value.clone(),
                }),
                Err(error) => {
                    errors.push(error);
                    None
                }
            })
            .collect::<Vec<_>>()
    };
    let set = headers(&spec.set);
    let add = headers(&spec.add);

    let body = spec.body.as_ref().and_then(|body| match cel_field("body", body) {
        Ok(()) => Some(body.clone()),
        Err(error) => {
            errors.push(error);
            None
        }
    });

    if set.is_empty() && add.is_empty() && spec.remove.is_empty() && body.is_none() {
        return None;
    }
    Some(Transform {
        set,
        add,
        remove: spec.remove.clone(),
        body,
    })
}

fn csrf(_: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let csrf = traffic.csrf.as_ref()?;
    Some(Translated::Ok(TrafficKind::Csrf(Csrf {
        additional_origins: csrf.additional_origins.clone(),
    })))
}

fn cors(_: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let cors = traffic.cors.as_ref()?;
    let max_age = match cors.max_age.map(|s| u32_field("maxAge", s)).transpose() {
        Ok(secs) => secs.map(|s| Duration::from_secs(s.into())),
        Err(error) => return Some(Translated::Err(error)),
    };
    Some(Translated::Ok(TrafficKind::Cors(Cors {
        allow_credentials: cors.allow_credentials.unwrap_or(false),
        allow_headers: cors.allow_headers.clone(),
        allow_methods: cors.allow_methods.clone(),
        allow_origins: cors.allow_origins.clone(),
        expose_headers: cors.expose_headers.clone(),
        max_age,
    })))
}

fn header_modifiers(_: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let modifiers = traffic.header_modifiers.as_ref()?;
    fn edits(filter: &api::HeaderFilter) -> HeaderEdits {
        let headers = |list: &[api::HttpHeader]| {
            list.iter()
                .map(|h| Header {
                    name: h.name.clone(),
                    value: h.value.clone(),
                })
                .collect()
        };
        HeaderEdits {
            add: headers(&filter.add),
            set: headers(&filter.set),
            remove: filter.remove.clone(),
        }
    }
    Some(Translated::Ok(TrafficKind::HeaderModifier(HeaderModifier {
        request: modifiers.request.as_ref().map(edits),
        response: modifiers.response.as_ref().map(edits),
    })))
}

fn host_rewrite(_: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let rewrite = traffic.host_rewrite.as_ref()?;
    let mode = match rewrite.mode {
        api::HostRewriteMode::Auto => HostRewrite::Auto,
        api::HostRewriteMode::None => HostRewrite::None,
    };
    Some(Translated::Ok(TrafficKind::HostRewrite(mode)))
}

fn timeouts(_: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let timeouts = traffic.timeouts.as_ref()?;
    let res = opt_duration_field("request", timeouts.request.as_ref()).map(|request| {
        TrafficKind::Timeout(Timeout {
            request,
            backend_request: None,
        })
    });
    Some(res.into())
}

fn retry(_: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let retry = traffic.retry.as_ref()?;
    Some(retry_spec(retry).map(TrafficKind::Retry).into())
}

/// The data plane stores attempts in a byte.
const MAX_RETRY_ATTEMPTS: u8 = u8::MAX;

fn retry_spec(retry: &api::Retry) -> Result<Retry> {
    let codes = retry
        .codes
        .iter()
        .map(|&code| match u16::try_from(code) {
            Ok(code) if (100..=599).contains(&code) => Ok(code),
            _ => bail!("retry code {code} is not an HTTP status code"),
        })
        .collect::<Result<Vec<_>>>()?;

    let backoff = opt_duration_field("backoff", retry.backoff.as_ref())?;

    let attempts = match retry.attempts {
        Some(a) if a < 0 || a > i64::from(i32::MAX) => {
            bail!("retry attempts must be a non-negative 32-bit integer (got {a})")
        }
        Some(a) => u8::try_from(a).unwrap_or(MAX_RETRY_ATTEMPTS),
        None => 0,
    };

    Ok(Retry {
        attempts,
        backoff,
        codes,
    })
}

fn direct_response(_: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let response = traffic.direct_response.as_ref()?;
    let res = match u16::try_from(response.status) {
        Ok(status) if (100..=599).contains(&status) => Ok(TrafficKind::DirectResponse(DirectResponse {
            status,
            body: response.body.clone(),
        })),
        _ => Err(anyhow!(
            "status must be between 100 and 599 (got {})",
            response.status
        )),
    };
    Some(res.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse_retry(value: serde_json::Value) -> api::Retry {
        serde_json::from_value(value).expect("retry must parse")
    }

    #[rstest]
    #[case(3, 3)]
    #[case(255, 255)]
    #[case(1000, 255)]
    #[case(i64::from(i32::MAX), 255)]
    fn retry_attempts_clamp(#[case] attempts: i64, #[case] expected: u8) {
        let spec = retry_spec(&parse_retry(serde_json::json!({ "attempts": attempts })))
            .expect("attempts are in range");
        assert_eq!(spec.attempts, expected);
    }

    #[rstest]
    #[case(-1)]
    #[case(i64::from(i32::MAX) + 1)]
    fn retry_attempts_out_of_range(#[case] attempts: i64) {
        let err = retry_spec(&parse_retry(serde_json::json!({ "attempts": attempts })))
            .expect_err("attempts are out of range");
        assert_eq!(
            err.to_string(),
            format!("retry attempts must be a non-negative 32-bit integer (got {attempts})")
        );
    }

    #[test]
    fn retry_codes_and_backoff() {
        let spec = retry_spec(&parse_retry(serde_json::json!({
            "codes": [503, 504],
            "backoff": "250ms",
        })))
        .expect("retry is valid");
        assert_eq!(
            spec,
            Retry {
                attempts: 0,
                backoff: Some(Duration::from_millis(250)),
                codes: vec![503, 504],
            }
        );

        assert!(retry_spec(&parse_retry(serde_json::json!({ "codes": [70000] }))).is_err());
    }

    #[test]
    fn transforms_drop_malformed_headers() {
        let spec: api::Transform = serde_json::from_value(serde_json::json!({
            "set": [
                { "name": "x-user", "value": "jwt.sub" },
                { "name": "x-bad", "value": "jwt.(" },
            ],
            "remove": ["x-internal"],
        }))
        .expect("transform must parse");
        let mut errors = vec![];
        let transform = transform(&spec, &mut errors).expect("a valid header remains");
        assert_eq!(
            transform.set,
            vec![Header {
                name: "x-user".to_string(),
                value: "jwt.sub".to_string(),
            }]
        );
        assert_eq!(transform.remove, vec!["x-internal".to_string()]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .to_string()
            .starts_with("header x-bad is not a valid CEL expression"));
    }
}
