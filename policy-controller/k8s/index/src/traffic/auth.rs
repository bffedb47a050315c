use crate::{
    backend_ref,
    translate::{cel_field, Context, Translated},
};
use agw_policy_controller_core::policy::{
    traffic::{ApiKey, ApiKeyAuth, BasicAuth, BasicAuthMode, Jwt, JwtProvider, TrafficKind},
    JwtMode, Rbac,
};
use agw_policy_controller_k8s_api::policy::{
    traffic::{self as api, CredentialMode},
    Authorization, AuthorizationAction, JwtAuthenticationMode,
};
use anyhow::{anyhow, bail, Result};

const HTPASSWD_KEY: &str = ".htaccess";

/// Splits CEL match expressions into allow or deny rules. Every expression
/// must be well formed; a partially applied rule set could admit requests it
/// was meant to deny.
pub(crate) fn rbac(authz: &Authorization) -> Result<Rbac> {
    let exprs = &authz.policy.match_expressions;
    for expr in exprs {
        cel_field("matchExpressions", expr)?;
    }
    let mut rbac = Rbac::default();
    match authz.action {
        AuthorizationAction::Allow => rbac.allow = exprs.clone(),
        AuthorizationAction::Deny => rbac.deny = exprs.clone(),
    }
    Ok(rbac)
}

pub(crate) fn jwt_mode(mode: JwtAuthenticationMode) -> JwtMode {
    match mode {
        JwtAuthenticationMode::Strict => JwtMode::Strict,
        JwtAuthenticationMode::Optional => JwtMode::Optional,
        JwtAuthenticationMode::Permissive => JwtMode::Permissive,
    }
}

fn credential_mode(mode: CredentialMode) -> BasicAuthMode {
    match mode {
        CredentialMode::Strict => BasicAuthMode::Strict,
        CredentialMode::Optional => BasicAuthMode::Optional,
    }
}

pub(super) fn authorization(
    _: &Context<'_>,
    traffic: &api::Traffic,
) -> Option<Translated<TrafficKind>> {
    let authz = traffic.authorization.as_ref()?;
    Some(rbac(authz).map(TrafficKind::Authorization).into())
}

/// Providers whose key-set cannot be loaded are dropped; the remaining
/// providers are still enforced.
pub(super) fn jwt(ctx: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let jwt = traffic.jwt_authentication.as_ref()?;
    let mut errors = vec![];
    let mut providers = Vec::with_capacity(jwt.providers.len());
    for provider in &jwt.providers {
        let jwks = match (&provider.jwks.inline, &provider.jwks.remote) {
            (Some(inline), _) => Ok(inline.clone()),
            (None, Some(remote)) => backend_ref::remote_jwks(ctx.snapshot, ctx.namespace, remote),
            (None, None) => Err(anyhow!("jwks requires either inline or remote")),
        };
        match jwks {
            Ok(jwks) => providers.push(JwtProvider {
                issuer: provider.issuer.clone(),
                audiences: provider.audiences.clone(),
                jwks,
            }),
            Err(error) => errors.push(error.context(format!("provider {}", provider.issuer))),
        }
    }

    let spec = Jwt {
        mode: jwt_mode(jwt.mode),
        providers,
    };
    Some(Translated::with_errors(TrafficKind::Jwt(spec), errors))
}

pub(super) fn basic(ctx: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let basic = traffic.basic_authentication.as_ref()?;
    let res = htpasswd(ctx, basic).map(|htpasswd| {
        TrafficKind::BasicAuth(BasicAuth {
            htpasswd,
            realm: basic.realm.clone(),
            mode: credential_mode(basic.mode),
        })
    });
    Some(res.into())
}

fn htpasswd(ctx: &Context<'_>, basic: &api::BasicAuthentication) -> Result<String> {
    if !basic.users.is_empty() {
        return Ok(basic.users.join("\n"));
    }
    let Some(secret_ref) = &basic.secret_ref else {
        bail!("basic authentication requires users or a secretRef");
    };
    let name = &secret_ref.name;
    let secret = ctx
        .snapshot
        .secret(ctx.namespace, name)
        .ok_or_else(|| anyhow!("basic authentication secret {name} not found"))?;
    let data = secret.data.get(HTPASSWD_KEY).ok_or_else(|| {
        anyhow!("basic authentication secret {name} found, but doesn't contain '{HTPASSWD_KEY}' key")
    })?;
    String::from_utf8(data.clone())
        .map_err(|_| anyhow!("basic authentication secret {name} is not valid UTF-8"))
}

/// Collects every entry of the referenced or selected Secrets, ordered by
/// Secret name and then by entry key. Malformed entries are dropped.
pub(super) fn api_keys(ctx: &Context<'_>, traffic: &api::Traffic) -> Option<Translated<TrafficKind>> {
    let auth = traffic.api_key_authentication.as_ref()?;

    let secrets = match (&auth.secret_selector, &auth.secret_ref) {
        (Some(selector), _) => ctx.snapshot.select_secrets(ctx.namespace, selector).collect(),
        (None, Some(secret_ref)) => match ctx.snapshot.secret(ctx.namespace, &secret_ref.name) {
            Some(secret) => vec![(secret_ref.name.as_str(), secret)],
            None => {
                let error = anyhow!("API key secret {} not found", secret_ref.name);
                return Some(Translated::Err(error));
            }
        },
        (None, None) => {
            let error = anyhow!("API key authentication requires a secretRef or secretSelector");
            return Some(Translated::Err(error));
        }
    };

    let mut errors = vec![];
    let mut keys = vec![];
    for (secret, info) in secrets {
        for (entry, value) in &info.data {
            match api_key(value) {
                Ok(key) => keys.push(key),
                Err(error) => {
                    errors.push(error.context(format!("secret {secret} contains invalid key {entry}")))
                }
            }
        }
    }

    let spec = ApiKeyAuth {
        keys,
        mode: credential_mode(auth.mode),
    };
    Some(Translated::with_errors(TrafficKind::ApiKeyAuth(spec), errors))
}

/// An entry is either a raw key or a JSON object `{"key": ..., "metadata": {...}}`.
fn api_key(value: &[u8]) -> Result<ApiKey> {
    let text = std::str::from_utf8(value).map_err(|_| anyhow!("not valid UTF-8"))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        bail!("empty key");
    }
    if !trimmed.starts_with('{') {
        return Ok(ApiKey {
            key: text.to_string(),
            metadata: None,
        });
    }

    let mut entry = match serde_json::from_str::<serde_json::Value>(trimmed)? {
        serde_json::Value::Object(entry) => entry,
        _ => bail!("expected a JSON object"),
    };
    let key = match entry.remove("key") {
        Some(serde_json::Value::String(key)) => key,
        _ => bail!("missing string field 'key'"),
    };
    let metadata = match entry.remove("metadata") {
        None | Some(serde_json::Value::Null) => None,
        Some(metadata @ serde_json::Value::Object(_)) => Some(metadata),
        Some(_) => bail!("metadata must be a JSON object"),
    };
    Ok(ApiKey { key, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn raw_and_structured_keys() {
        assert_eq!(
            api_key(b"sk-123").expect("raw key"),
            ApiKey {
                key: "sk-123".to_string(),
                metadata: None,
            }
        );
        assert_eq!(
            api_key(br#" {"key": "sk-456", "metadata": {"team": "a"}} "#).expect("json key"),
            ApiKey {
                key: "sk-456".to_string(),
                metadata: Some(serde_json::json!({ "team": "a" })),
            }
        );
    }

    #[test]
    fn malformed_keys() {
        assert!(api_key(b"").is_err());
        assert!(api_key(b"{\"key\": 5}").is_err());
        assert!(api_key(b"{\"key\": \"k\", \"metadata\": [1]}").is_err());
        assert!(api_key(b"{not json").is_err());
    }

    #[test]
    fn rbac_splits_by_action() {
        let authz: Authorization = serde_json::from_value(serde_json::json!({
            "action": "Deny",
            "policy": { "matchExpressions": ["request.path == '/admin'"] },
        }))
        .expect("authorization must parse");
        assert_eq!(
            rbac(&authz).expect("valid rules"),
            Rbac {
                allow: vec![],
                deny: vec!["request.path == '/admin'".to_string()],
            }
        );
    }

    #[test]
    fn rbac_rejects_malformed_rules() {
        let authz: Authorization = serde_json::from_value(serde_json::json!({
            "policy": { "matchExpressions": ["true", "request.path =="] },
        }))
        .expect("authorization must parse");
        assert!(rbac(&authz).is_err());
    }
}
