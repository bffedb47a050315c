use super::{BackendObjectReference, Keepalive, NamedExpression};

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Frontend {
    pub tcp: Option<FrontendTcp>,
    pub tls: Option<FrontendTls>,
    pub http: Option<FrontendHttp>,
    pub access_log: Option<AccessLog>,
    pub tracing: Option<Tracing>,
}

impl Frontend {
    pub fn is_empty(&self) -> bool {
        self.tcp.is_none()
            && self.tls.is_none()
            && self.http.is_none()
            && self.access_log.is_none()
            && self.tracing.is_none()
    }
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct FrontendTcp {
    pub keepalive: Option<Keepalive>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FrontendTls {
    pub handshake_timeout: Option<String>,
    pub alpn_protocols: Option<Vec<String>>,
    pub min_protocol_version: Option<String>,
    pub max_protocol_version: Option<String>,
    #[serde(default)]
    pub cipher_suites: Vec<String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FrontendHttp {
    pub max_buffer_size: Option<i32>,
    pub http1_max_headers: Option<i32>,
    pub http1_idle_timeout: Option<String>,
    pub http2_window_size: Option<i32>,
    pub http2_connection_window_size: Option<i32>,
    pub http2_frame_size: Option<i32>,
    pub http2_keepalive_interval: Option<String>,
    pub http2_keepalive_timeout: Option<String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct AccessLog {
    pub filter: Option<String>,
    pub attributes: Option<Attributes>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Attributes {
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default)]
    pub add: Vec<NamedExpression>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tracing {
    pub backend_ref: BackendObjectReference,
    #[serde(default)]
    pub protocol: TracingProtocol,
    pub attributes: Option<Attributes>,
    #[serde(default)]
    pub resources: Vec<NamedExpression>,
    pub random_sampling: Option<String>,
    pub client_sampling: Option<String>,
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum TracingProtocol {
    #[default]
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "GRPC")]
    Grpc,
}
