use crate::labels::Map;

/// A reference to a resource in the policy's namespace, optionally narrowed to
/// a section (listener, rule, sub-backend, or port).
#[derive(
    Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct LocalPolicyTargetRef {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    pub name: String,
    pub section_name: Option<String>,
}

/// Selects every resource of a kind in the policy's namespace whose labels match.
#[derive(
    Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct LocalPolicyTargetSelector {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    #[serde(default)]
    pub match_labels: Map,
    pub section_name: Option<String>,
}

/// A reference to a destination for side calls. Defaults to a core `Service`
/// in the referencing resource's namespace.
#[derive(
    Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub struct BackendObjectReference {
    pub group: Option<String>,
    pub kind: Option<String>,
    pub name: String,
    pub namespace: Option<String>,
    pub port: Option<i32>,
}

// === impl LocalPolicyTargetRef ===

impl LocalPolicyTargetRef {
    /// Returns the target kind, qualified by its group, if necessary.
    pub fn canonical_kind(&self) -> String {
        canonical_kind(&self.group, &self.kind)
    }
}

impl std::fmt::Display for LocalPolicyTargetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.canonical_kind(), self.name)?;
        if let Some(section) = &self.section_name {
            write!(f, "/{section}")?;
        }
        Ok(())
    }
}

// === impl LocalPolicyTargetSelector ===

impl LocalPolicyTargetSelector {
    /// Expands the selector into a reference to the named resource.
    pub fn to_target_ref(&self, name: impl ToString) -> LocalPolicyTargetRef {
        LocalPolicyTargetRef {
            group: self.group.clone(),
            kind: self.kind.clone(),
            name: name.to_string(),
            section_name: self.section_name.clone(),
        }
    }
}

// === impl BackendObjectReference ===

impl BackendObjectReference {
    pub fn group(&self) -> &str {
        self.group.as_deref().unwrap_or("")
    }

    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("Service")
    }

    pub fn namespace<'a>(&'a self, default: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(default)
    }
}

fn canonical_kind(group: &str, kind: &str) -> String {
    if group.is_empty() || group.eq_ignore_ascii_case("core") {
        kind.to_string()
    } else {
        format!("{kind}.{group}")
    }
}
