use crate::{
    backend_ref,
    translate::{opt_u32_field, Context, Translated},
};
use agw_policy_controller_core::policy::backend::{
    Ai, BackendPolicy, Builtin, Guard, GuardKind, HeaderMatch, Message, PromptCaching,
    PromptEnrichment, PromptGuard, RegexAction, RegexRules, Rejection, Webhook,
};
use agw_policy_controller_k8s_api::policy::{ai as api, backend::BackendSpec};
use anyhow::{anyhow, bail, Context as _, Result};
use std::collections::BTreeMap;

const DEFAULT_REJECTION_STATUS: u16 = 403;
const DEFAULT_REJECTION_MESSAGE: &str = "The request was rejected due to inappropriate content";

/// Field defaults and guard lists that fail are dropped from an otherwise
/// emitted policy.
pub(super) fn translate(ctx: &Context<'_>, backend: &BackendSpec) -> Option<Translated<BackendPolicy>> {
    let ai = backend.ai.as_ref()?;
    let mut errors = vec![];

    let defaults = fields(&ai.defaults, &mut errors);
    let overrides = fields(&ai.overrides, &mut errors);

    let prompt_guard = ai.prompt_guard.as_ref().map(|guard| {
        let mut guards = |entries: &[api::PromptGuardEntry]| match guard_list(ctx, entries) {
            Ok(guards) => guards,
            Err(error) => {
                errors.push(error);
                vec![]
            }
        };
        PromptGuard {
            request: guards(&guard.request),
            response: guards(&guard.response),
        }
    });

    let prompt_caching = match ai.prompt_caching.as_ref().map(prompt_caching).transpose() {
        Ok(caching) => caching,
        Err(error) => {
            errors.push(error);
            None
        }
    };

    let spec = Ai {
        prompt_enrichment: ai.prompt_enrichment.as_ref().map(|p| PromptEnrichment {
            prepend: messages(&p.prepend),
            append: messages(&p.append),
        }),
        defaults,
        overrides,
        prompt_guard,
        model_aliases: ai.model_aliases.clone(),
        prompt_caching,
    };
    Some(Translated::with_errors(BackendPolicy::Ai(spec), errors))
}

fn messages(msgs: &[api::Message]) -> Vec<Message> {
    msgs.iter()
        .map(|m| Message {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect()
}

fn fields(
    fields: &[api::FieldDefault],
    errors: &mut Vec<anyhow::Error>,
) -> BTreeMap<String, serde_json::Value> {
    let mut values = BTreeMap::new();
    for field in fields {
        match json_value(&field.value) {
            Ok(value) => {
                values.insert(field.field.clone(), value);
            }
            Err(error) => errors.push(error.context(format!("field {}", field.field))),
        }
    }
    values
}

/// Parses a field value as JSON. Text that is not JSON, and does not look
/// like an object or array, is taken as a bare string.
fn json_value(raw: &str) -> Result<serde_json::Value> {
    if let Ok(value) = serde_json::from_str(raw) {
        return Ok(value);
    }
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        bail!("invalid JSON value: {raw}");
    }
    Ok(serde_json::Value::String(raw.to_string()))
}

/// Any failing entry fails the whole list.
fn guard_list(ctx: &Context<'_>, entries: &[api::PromptGuardEntry]) -> Result<Vec<Guard>> {
    let mut guards = Vec::with_capacity(entries.len());
    for entry in entries {
        let kind = if let Some(webhook) = &entry.webhook {
            GuardKind::Webhook(
                self::webhook(ctx, webhook).map_err(|e| anyhow!("failed to build webhook: {e:#}"))?,
            )
        } else if let Some(regex) = &entry.regex {
            GuardKind::Regex(regex_rules(regex)?)
        } else {
            // Moderation guards are not carried on the wire.
            if entry.openai_moderation.is_some() {
                tracing::debug!("Skipping OpenAI moderation prompt guard");
            }
            continue;
        };
        let rejection = entry.custom_response.as_ref().map(rejection).transpose()?;
        guards.push(Guard { kind, rejection });
    }
    Ok(guards)
}

fn webhook(ctx: &Context<'_>, webhook: &api::Webhook) -> Result<Webhook> {
    let target = backend_ref::resolve(ctx.snapshot, ctx.namespace, &webhook.backend_ref)?;
    let forward_header_matches = webhook
        .forward_header_matches
        .iter()
        .map(|m| match m.match_type {
            api::HeaderMatchType::Exact => HeaderMatch::Exact {
                name: m.name.clone(),
                value: m.value.clone(),
            },
            api::HeaderMatchType::RegularExpression => HeaderMatch::Regex {
                name: m.name.clone(),
                pattern: m.value.clone(),
            },
        })
        .collect();
    Ok(Webhook {
        target,
        forward_header_matches,
    })
}

fn regex_rules(regex: &api::Regex) -> Result<RegexRules> {
    for pattern in &regex.matches {
        regex::Regex::new(pattern).with_context(|| format!("invalid regex {pattern:?}"))?;
    }
    Ok(RegexRules {
        action: match regex.action {
            Some(api::RegexAction::Reject) => RegexAction::Reject,
            Some(api::RegexAction::Mask) | None => RegexAction::Mask,
        },
        patterns: regex.matches.clone(),
        builtins: regex
            .builtins
            .iter()
            .map(|b| match b {
                api::Builtin::Ssn => Builtin::Ssn,
                api::Builtin::CreditCard => Builtin::CreditCard,
                api::Builtin::PhoneNumber => Builtin::PhoneNumber,
                api::Builtin::Email => Builtin::Email,
                api::Builtin::CaSin => Builtin::CaSin,
            })
            .collect(),
    })
}

fn rejection(rsp: &api::CustomResponse) -> Result<Rejection> {
    let status = match rsp.status_code {
        None => DEFAULT_REJECTION_STATUS,
        Some(code) => u16::try_from(code)
            .ok()
            .filter(|c| (100..=599).contains(c))
            .ok_or_else(|| anyhow!("custom response status {code} must be between 100 and 599"))?,
    };
    Ok(Rejection {
        body: rsp
            .message
            .clone()
            .unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string()),
        status,
    })
}

fn prompt_caching(caching: &api::PromptCaching) -> Result<PromptCaching> {
    Ok(PromptCaching {
        cache_system: caching.cache_system,
        cache_messages: caching.cache_messages,
        cache_tools: caching.cache_tools,
        min_tokens: opt_u32_field("promptCaching.minTokens", caching.min_tokens)?,
    })
}
