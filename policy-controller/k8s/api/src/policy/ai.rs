use super::BackendObjectReference;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendAi {
    #[serde(rename = "prompt")]
    pub prompt_enrichment: Option<PromptEnrichment>,
    pub prompt_guard: Option<PromptGuard>,
    #[serde(default)]
    pub defaults: Vec<FieldDefault>,
    #[serde(default)]
    pub overrides: Vec<FieldDefault>,
    #[serde(default)]
    pub model_aliases: BTreeMap<String, String>,
    pub prompt_caching: Option<PromptCaching>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct PromptEnrichment {
    #[serde(default)]
    pub prepend: Vec<Message>,
    #[serde(default)]
    pub append: Vec<Message>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct PromptGuard {
    #[serde(default)]
    pub request: Vec<PromptGuardEntry>,
    #[serde(default)]
    pub response: Vec<PromptGuardEntry>,
}

/// One guard. Exactly one of `regex`, `webhook`, or `openAIModeration` is
/// expected to be set.
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromptGuardEntry {
    #[serde(rename = "response")]
    pub custom_response: Option<CustomResponse>,
    pub regex: Option<Regex>,
    pub webhook: Option<Webhook>,
    #[serde(rename = "openAIModeration")]
    pub openai_moderation: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomResponse {
    pub message: Option<String>,
    pub status_code: Option<i32>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Regex {
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub builtins: Vec<Builtin>,
    pub action: Option<RegexAction>,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum Builtin {
    Ssn,
    CreditCard,
    PhoneNumber,
    Email,
    CaSin,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum RegexAction {
    Mask,
    Reject,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub backend_ref: BackendObjectReference,
    #[serde(default)]
    pub forward_header_matches: Vec<HeaderMatch>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct HeaderMatch {
    #[serde(rename = "type", default)]
    pub match_type: HeaderMatchType,
    pub name: String,
    pub value: String,
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum HeaderMatchType {
    #[default]
    Exact,
    RegularExpression,
}

/// A field name and its value as JSON text. Text that is not valid JSON is
/// treated as a string.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct FieldDefault {
    pub field: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromptCaching {
    #[serde(default)]
    pub cache_system: bool,
    #[serde(default)]
    pub cache_messages: bool,
    #[serde(default)]
    pub cache_tools: bool,
    pub min_tokens: Option<i32>,
}
