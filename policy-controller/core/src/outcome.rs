//! Per-target results handed from the engine to the status aggregator.

use std::fmt;

const NOTHING_PRODUCED: &str = "policy does not configure any settings for this target";

/// A higher-level resource against which a policy reports acceptance.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AncestorRef {
    pub group: Option<String>,
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub section_name: Option<String>,
    pub port: Option<u16>,
}

/// The acceptance verdict for one resolved target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acceptance {
    /// Translation produced policies and no errors.
    Valid,

    /// Translation produced policies and errors.
    PartiallyValid(String),

    /// Translation produced errors and nothing else.
    Invalid(String),

    /// The target or its ancestors could not be resolved.
    NotAttached(String),

    /// A higher-priority singleton policy claims the same target.
    Conflicted { winner: String },

    /// The declaration resolved but its configuration cannot be honored.
    Rejected { reason: String, message: String },
}

/// Reference resolution for policies that read certificate material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedRefs {
    Resolved,
    InvalidKind(String),
    InvalidCaCertificateRef(String),
}

/// Everything the status aggregator needs to know about one declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub ancestors: Vec<AncestorRef>,
    pub acceptance: Acceptance,
    pub resolved_refs: Option<ResolvedRefs>,
}

// === impl AncestorRef ===

impl AncestorRef {
    pub fn new(group: &str, kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            group: Some(group.to_string()),
            kind: Some(kind.to_string()),
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
            section_name: None,
            port: None,
        }
    }

    /// A placeholder ancestor used when a declaration resolves to nothing.
    pub fn summary(group: &str) -> Self {
        Self {
            group: Some(group.to_string()),
            kind: None,
            namespace: None,
            name: "StatusSummary".to_string(),
            section_name: None,
            port: None,
        }
    }
}

/// Renders `group/kind/namespace/name/section/port`; this is the key by which
/// status entries are ordered.
impl fmt::Display for AncestorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = self.port.map(|p| p.to_string());
        write!(
            f,
            "{}/{}/{}/{}/{}/{}",
            self.group.as_deref().unwrap_or_default(),
            self.kind.as_deref().unwrap_or_default(),
            self.namespace.as_deref().unwrap_or_default(),
            self.name,
            self.section_name.as_deref().unwrap_or_default(),
            port.as_deref().unwrap_or_default(),
        )
    }
}

// === impl Acceptance ===

impl Acceptance {
    /// Classifies a translation by what it produced. A translation that
    /// produced nothing is invalid even without errors.
    pub fn from_translation(produced: usize, errors: &[String]) -> Self {
        match (produced, errors.is_empty()) {
            (0, true) => Self::Invalid(NOTHING_PRODUCED.to_string()),
            (_, true) => Self::Valid,
            (0, false) => Self::Invalid(errors.join("\n")),
            (_, false) => Self::PartiallyValid(errors.join("\n")),
        }
    }

    /// Combines the verdicts of declarations that report against the same
    /// ancestor. The more severe verdict wins and every message is kept; an
    /// invalid declaration next to one that produced policies is partial.
    pub fn merge(self, other: Self) -> Self {
        if self == other {
            return self;
        }

        let produced = self.produced() || other.produced();
        let mut messages = vec![];
        for m in [self.message(), other.message()].into_iter().flatten() {
            if !messages.contains(&m) {
                messages.push(m);
            }
        }
        let message = messages.join("\n");

        let worse = if other.severity() > self.severity() {
            other
        } else {
            self
        };
        match worse {
            Self::Valid => Self::Valid,
            Self::PartiallyValid(_) => Self::PartiallyValid(message),
            Self::Invalid(_) if produced => Self::PartiallyValid(message),
            Self::Invalid(_) => Self::Invalid(message),
            Self::NotAttached(_) => Self::NotAttached(message),
            Self::Rejected { reason, .. } => Self::Rejected { reason, message },
            conflicted @ Self::Conflicted { .. } => conflicted,
        }
    }

    fn severity(&self) -> u8 {
        match self {
            Self::Valid => 0,
            Self::PartiallyValid(_) => 1,
            Self::Invalid(_) => 2,
            Self::NotAttached(_) => 3,
            Self::Rejected { .. } => 4,
            Self::Conflicted { .. } => 5,
        }
    }

    fn produced(&self) -> bool {
        matches!(self, Self::Valid | Self::PartiallyValid(_))
    }

    fn message(&self) -> Option<String> {
        match self {
            Self::PartiallyValid(m) | Self::Invalid(m) | Self::NotAttached(m) => Some(m.clone()),
            Self::Rejected { message, .. } => Some(message.clone()),
            Self::Valid | Self::Conflicted { .. } => None,
        }
    }
}

// === impl ResolvedRefs ===

impl ResolvedRefs {
    /// Keeps the first failure.
    pub fn merge(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(Self::Resolved), Some(b)) => Some(b),
            (Some(a), _) => Some(a),
            (None, b) => b,
        }
    }
}
