/// A destination other than a plain Service: a static host, an AI provider
/// pool, or a set of MCP targets.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "agentgateway.dev",
    version = "v1alpha1",
    kind = "AgentgatewayBackend",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AgentgatewayBackendSpec {
    #[serde(rename = "static")]
    pub static_backend: Option<StaticBackend>,
    pub ai: Option<AiBackend>,
    pub mcp: Option<McpBackend>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct StaticBackend {
    pub host: String,
    pub port: i32,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct AiBackend {
    /// A single provider, given as opaque provider settings.
    pub provider: Option<serde_json::Value>,
    #[serde(default)]
    pub groups: Vec<PriorityGroup>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct PriorityGroup {
    pub providers: Vec<NamedProvider>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct NamedProvider {
    pub name: String,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct McpBackend {
    pub targets: Vec<McpTarget>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct McpTarget {
    pub name: String,
}

// === impl AgentgatewayBackendSpec ===

impl AgentgatewayBackendSpec {
    /// Names of the sections a policy may target with a `sectionName`.
    pub fn section_names(&self) -> impl Iterator<Item = &str> + '_ {
        let providers = self
            .ai
            .iter()
            .flat_map(|ai| ai.groups.iter())
            .flat_map(|g| g.providers.iter())
            .map(|p| p.name.as_str());
        let targets = self
            .mcp
            .iter()
            .flat_map(|mcp| mcp.targets.iter())
            .map(|t| t.name.as_str());
        providers.chain(targets)
    }
}
