/// Holds cluster metadata.
#[derive(Clone, Debug)]
pub struct ClusterInfo {
    /// E.g. "cluster.local"
    pub dns_domain: String,
}

impl ClusterInfo {
    pub fn service_hostname(&self, ns: &str, svc: &str) -> String {
        format!("{}.{}.svc.{}", svc, ns, self.dns_domain)
    }
}

impl Default for ClusterInfo {
    fn default() -> Self {
        Self {
            dns_domain: "cluster.local".to_string(),
        }
    }
}
