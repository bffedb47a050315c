use std::fmt;

/// The closed set of attachment points a policy may resolve to.
///
/// Variants are declared from least to most specific. The data plane merges
/// overlapping policies field-by-field, letting more specific kinds win.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum TargetKind {
    Gateway,
    Listener,
    Route,
    RouteRule,
    Backend,
    SubBackend,
    Service,
}

/// A canonical, proxy-visible attachment point.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyTarget {
    Gateway {
        namespace: String,
        name: String,
        listener: Option<String>,
    },
    Route {
        namespace: String,
        name: String,
        kind: String,
        rule: Option<String>,
    },
    Backend {
        namespace: String,
        name: String,
        section: Option<String>,
    },
    Service {
        namespace: String,
        hostname: String,
        port: Option<u16>,
    },
}

// === impl TargetKind ===

impl TargetKind {
    pub fn is_gateway(self) -> bool {
        matches!(self, Self::Gateway | Self::Listener)
    }

    pub fn is_route(self) -> bool {
        matches!(self, Self::Route | Self::RouteRule)
    }

    pub fn is_backend(self) -> bool {
        matches!(self, Self::Backend | Self::SubBackend | Self::Service)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gateway => "Gateway",
            Self::Listener => "Listener",
            Self::Route => "Route",
            Self::RouteRule => "RouteRule",
            Self::Backend => "Backend",
            Self::SubBackend => "SubBackend",
            Self::Service => "Service",
        };
        f.write_str(s)
    }
}

// === impl PolicyTarget ===

impl PolicyTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Gateway { listener: None, .. } => TargetKind::Gateway,
            Self::Gateway {
                listener: Some(_), ..
            } => TargetKind::Listener,
            Self::Route { rule: None, .. } => TargetKind::Route,
            Self::Route { rule: Some(_), .. } => TargetKind::RouteRule,
            Self::Backend { section: None, .. } => TargetKind::Backend,
            Self::Backend {
                section: Some(_), ..
            } => TargetKind::SubBackend,
            Self::Service { .. } => TargetKind::Service,
        }
    }

    /// The suffix that makes a wire policy key unique per target, e.g.
    /// `:ns/gw/listener` or `:ns/svc.ns.svc.cluster.local/8080`.
    pub fn attachment_name(&self) -> String {
        fn join(namespace: &str, name: &str, section: Option<&str>) -> String {
            match section {
                Some(section) => format!(":{namespace}/{name}/{section}"),
                None => format!(":{namespace}/{name}"),
            }
        }

        match self {
            Self::Gateway {
                namespace,
                name,
                listener,
            } => join(namespace, name, listener.as_deref()),
            Self::Route {
                namespace,
                name,
                rule,
                ..
            } => join(namespace, name, rule.as_deref()),
            Self::Backend {
                namespace,
                name,
                section,
            } => join(namespace, name, section.as_deref()),
            Self::Service {
                namespace,
                hostname,
                port,
            } => {
                let port = port.map(|p| p.to_string());
                join(namespace, hostname, port.as_deref())
            }
        }
    }
}

impl fmt::Display for PolicyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind(), self.attachment_name())
    }
}
