use super::{Attribute, BackendReference, Keepalive};
use std::time::Duration;

/// Listener-side settings. Only legal on gateways and listeners.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FrontendPolicy {
    Tcp(FrontendTcp),
    Tls(FrontendTls),
    Http(FrontendHttp),
    Logging(Logging),
    Tracing(Tracing),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FrontendTcp {
    pub keepalives: Option<Keepalive>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FrontendTls {
    pub handshake_timeout: Option<Duration>,
    pub alpn: Option<Vec<String>>,
    pub min_version: Option<TlsVersion>,
    pub max_version: Option<TlsVersion>,
    pub cipher_suites: Vec<CipherSuite>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum TlsVersion {
    V1_2,
    V1_3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum CipherSuite {
    Tls13Aes256GcmSha384,
    Tls13Aes128GcmSha256,
    Tls13Chacha20Poly1305Sha256,
    EcdheEcdsaWithAes256GcmSha384,
    EcdheEcdsaWithAes128GcmSha256,
    EcdheEcdsaWithChacha20Poly1305Sha256,
    EcdheRsaWithAes256GcmSha384,
    EcdheRsaWithAes128GcmSha256,
    EcdheRsaWithChacha20Poly1305Sha256,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FrontendHttp {
    pub max_buffer_size: Option<u32>,
    pub http1_max_headers: Option<u32>,
    pub http1_idle_timeout: Option<Duration>,
    pub http2_window_size: Option<u32>,
    pub http2_connection_window_size: Option<u32>,
    pub http2_frame_size: Option<u32>,
    pub http2_keepalive_interval: Option<Duration>,
    pub http2_keepalive_timeout: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Logging {
    pub filter: Option<String>,
    pub fields: Option<LoggingFields>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct LoggingFields {
    pub remove: Vec<String>,
    pub add: Vec<Attribute>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Tracing {
    pub provider_backend: BackendReference,
    pub attributes: Vec<Attribute>,
    pub remove: Vec<String>,
    pub resources: Vec<Attribute>,
    pub protocol: TracingProtocol,
    pub random_sampling: Option<String>,
    pub client_sampling: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub enum TracingProtocol {
    #[default]
    Http,
    Grpc,
}
