//! Translates `spec.frontend`: listener-side transport, logging, and tracing.

use crate::{
    backend_ref,
    translate::{cel_field, opt_duration_field, opt_u32_field, Context, Feature, Output, Translated},
};
use agw_policy_controller_core::{
    policy::{
        frontend::{
            CipherSuite, FrontendHttp, FrontendTcp, FrontendTls, Logging, LoggingFields, TlsVersion,
            Tracing, TracingProtocol,
        },
        Attribute, FrontendPolicy, Keepalive,
    },
    PolicyKind,
};
use agw_policy_controller_k8s_api::policy::{
    frontend as api, Keepalive as ApiKeepalive, NamedExpression,
};
use anyhow::{bail, Result};

pub(crate) const CATEGORY: &str = "frontend";

const FEATURES: &[Feature<api::Frontend, FrontendPolicy>] = &[
    Feature {
        name: "tcp",
        suffix: ":frontend-tcp",
        translate: tcp,
    },
    Feature {
        name: "tls",
        suffix: ":frontend-tls",
        translate: tls,
    },
    Feature {
        name: "http",
        suffix: ":frontend-http",
        translate: http,
    },
    Feature {
        name: "accessLog",
        suffix: ":frontend-logging",
        translate: access_log,
    },
    Feature {
        name: "tracing",
        suffix: ":frontend-tracing",
        translate: tracing,
    },
];

pub(crate) fn translate(ctx: &Context<'_>, frontend: &api::Frontend, out: &mut Output) {
    out.translate(ctx, CATEGORY, FEATURES, frontend, PolicyKind::Frontend);
}

/// Converts keepalive settings shared by frontend and backend TCP policies.
pub(crate) fn keepalive(ka: &ApiKeepalive) -> Result<Keepalive> {
    Ok(Keepalive {
        time: opt_duration_field("keepalive.time", ka.time.as_ref())?,
        interval: opt_duration_field("keepalive.interval", ka.interval.as_ref())?,
        retries: opt_u32_field("keepalive.retries", ka.retries)?,
    })
}

/// Checks and converts a list of named CEL expressions.
pub(crate) fn attributes(exprs: &[NamedExpression]) -> Result<Vec<Attribute>> {
    exprs
        .iter()
        .map(|e| {
            cel_field(&e.name, &e.expression)?;
            Ok(Attribute {
                name: e.name.clone(),
                expression: e.expression.clone(),
            })
        })
        .collect()
}

fn tcp(_: &Context<'_>, frontend: &api::Frontend) -> Option<Translated<FrontendPolicy>> {
    let tcp = frontend.tcp.as_ref()?;
    let res = tcp
        .keepalive
        .as_ref()
        .map(keepalive)
        .transpose()
        .map(|keepalives| FrontendPolicy::Tcp(FrontendTcp { keepalives }));
    Some(res.into())
}

fn tls(_: &Context<'_>, frontend: &api::Frontend) -> Option<Translated<FrontendPolicy>> {
    let tls = frontend.tls.as_ref()?;
    let handshake_timeout =
        match opt_duration_field("handshakeTimeout", tls.handshake_timeout.as_ref()) {
            Ok(timeout) => timeout,
            Err(error) => return Some(Translated::Err(error)),
        };

    // Unknown versions and suites are dropped individually.
    let mut errors = vec![];
    let mut version = |v: Option<&String>| match v.map(|v| tls_version(v)).transpose() {
        Ok(v) => v,
        Err(error) => {
            errors.push(error);
            None
        }
    };
    let min_version = version(tls.min_protocol_version.as_ref());
    let max_version = version(tls.max_protocol_version.as_ref());

    let mut cipher_suites = Vec::with_capacity(tls.cipher_suites.len());
    for suite in &tls.cipher_suites {
        match cipher_suite(suite) {
            Ok(suite) => cipher_suites.push(suite),
            Err(error) => errors.push(error),
        }
    }

    let spec = FrontendTls {
        handshake_timeout,
        alpn: tls.alpn_protocols.clone(),
        min_version,
        max_version,
        cipher_suites,
    };
    Some(Translated::with_errors(FrontendPolicy::Tls(spec), errors))
}

fn tls_version(v: &str) -> Result<TlsVersion> {
    match v {
        "1.2" => Ok(TlsVersion::V1_2),
        "1.3" => Ok(TlsVersion::V1_3),
        v => bail!("unknown TLS version {v}"),
    }
}

fn cipher_suite(s: &str) -> Result<CipherSuite> {
    let suite = match s {
        "TLS13_AES_256_GCM_SHA384" => CipherSuite::Tls13Aes256GcmSha384,
        "TLS13_AES_128_GCM_SHA256" => CipherSuite::Tls13Aes128GcmSha256,
        "TLS13_CHACHA20_POLY1305_SHA256" => CipherSuite::Tls13Chacha20Poly1305Sha256,
        "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384" => CipherSuite::EcdheEcdsaWithAes256GcmSha384,
        "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256" => CipherSuite::EcdheEcdsaWithAes128GcmSha256,
        "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256" => {
            CipherSuite::EcdheEcdsaWithChacha20Poly1305Sha256
        }
        "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384" => CipherSuite::EcdheRsaWithAes256GcmSha384,
        "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256" => CipherSuite::EcdheRsaWithAes128GcmSha256,
        "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256" => {
            CipherSuite::EcdheRsaWithChacha20Poly1305Sha256
        }
        s => bail!("unknown cipher suite {s}"),
    };
    Ok(suite)
}

fn http(_: &Context<'_>, frontend: &api::Frontend) -> Option<Translated<FrontendPolicy>> {
    let http = frontend.http.as_ref()?;
    Some(http_spec(http).map(FrontendPolicy::Http).into())
}

fn http_spec(http: &api::FrontendHttp) -> Result<FrontendHttp> {
    Ok(FrontendHttp {
        max_buffer_size: opt_u32_field("maxBufferSize", http.max_buffer_size)?,
        http1_max_headers: opt_u32_field("http1MaxHeaders", http.http1_max_headers)?,
        http1_idle_timeout: opt_duration_field("http1IdleTimeout", http.http1_idle_timeout.as_ref())?,
        http2_window_size: opt_u32_field("http2WindowSize", http.http2_window_size)?,
        http2_connection_window_size: opt_u32_field(
            "http2ConnectionWindowSize",
            http.http2_connection_window_size,
        )?,
        http2_frame_size: opt_u32_field("http2FrameSize", http.http2_frame_size)?,
        http2_keepalive_interval: opt_duration_field(
            "http2KeepaliveInterval",
            http.http2_keepalive_interval.as_ref(),
        )?,
        http2_keepalive_timeout: opt_duration_field(
            "http2KeepaliveTimeout",
            http.http2_keepalive_timeout.as_ref(),
        )?,
    })
}

fn access_log(_: &Context<'_>, frontend: &api::Frontend) -> Option<Translated<FrontendPolicy>> {
    let log = frontend.access_log.as_ref()?;
    Some(logging(log).map(FrontendPolicy::Logging).into())
}

fn logging(log: &api::AccessLog) -> Result<Logging> {
    if let Some(filter) = &log.filter {
        cel_field("filter", filter)?;
    }
    let fields = match &log.attributes {
        Some(attrs) => Some(LoggingFields {
            remove: attrs.remove.clone(),
            add: attributes(&attrs.add)?,
        }),
        None => None,
    };
    Ok(Logging {
        filter: log.filter.clone(),
        fields,
    })
}

fn tracing(ctx: &Context<'_>, frontend: &api::Frontend) -> Option<Translated<FrontendPolicy>> {
    let tracing = frontend.tracing.as_ref()?;
    Some(tracing_spec(ctx, tracing).map(FrontendPolicy::Tracing).into())
}

fn tracing_spec(ctx: &Context<'_>, tracing: &api::Tracing) -> Result<Tracing> {
    let provider_backend = backend_ref::resolve(ctx.snapshot, ctx.namespace, &tracing.backend_ref)?;
    for (field, sampling) in [
        ("randomSampling", &tracing.random_sampling),
        ("clientSampling", &tracing.client_sampling),
    ] {
        if let Some(expr) = sampling {
            cel_field(field, expr)?;
        }
    }

    let (add, remove) = match &tracing.attributes {
        Some(attrs) => (attributes(&attrs.add)?, attrs.remove.clone()),
        None => (vec![], vec![]),
    };
    Ok(Tracing {
        provider_backend,
        attributes: add,
        remove,
        resources: attributes(&tracing.resources)?,
        protocol: match tracing.protocol {
            api::TracingProtocol::Http => TracingProtocol::Http,
            api::TracingProtocol::Grpc => TracingProtocol::Grpc,
        },
        random_sampling: tracing.random_sampling.clone(),
        client_sampling: tracing.client_sampling.clone(),
    })
}
