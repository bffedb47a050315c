//! A consistent, read-only view of every resource the engine consults.
//!
//! The snapshot is fed by `kubert::index` watches and read under a shared
//! lock while policies are translated. It stores only the fields translation
//! needs, keyed by namespace and then name so that iteration is ordered.

use crate::ClusterInfo;
use ahash::AHashMap as HashMap;
use agw_policy_controller_k8s_api::{
    self as k8s, gateway as gw, labels::Selector, AgentgatewayBackend, AgentgatewayPolicy,
    BackendTlsPolicy, ConfigMap, Labels, ResourceExt, Secret, Service,
};
use parking_lot::RwLock;
use std::{
    collections::{btree_map::Entry, BTreeMap, BTreeSet},
    sync::Arc,
};

/// Marks a ConfigMap as a pre-resolved key-set: its `jwks` entry holds the
/// key-set served at the annotated URI.
pub const JWKS_URI_ANNOTATION: &str = "agentgateway.dev/jwks-uri";

pub const JWKS_KEY: &str = "jwks";

pub type SharedSnapshot = Arc<RwLock<Snapshot>>;

#[derive(Debug)]
pub struct Snapshot {
    cluster_info: ClusterInfo,
    gateways: Namespaced<GatewayInfo>,
    routes: Namespaced<RouteInfo>,
    backends: Namespaced<BackendInfo>,
    services: Namespaced<ServiceInfo>,
    secrets: Namespaced<SecretInfo>,
    config_maps: Namespaced<ConfigMapInfo>,
    /// Key-set ConfigMaps by URI. Several may claim a URI; the first in
    /// namespace/name order is used.
    jwks: HashMap<String, BTreeSet<(String, String)>>,
    policies: Namespaced<AgentgatewayPolicy>,
    backend_tls_policies: Namespaced<BackendTlsPolicy>,
}

#[derive(Clone, Debug, Default)]
pub struct GatewayInfo {
    pub labels: Labels,
    pub listeners: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct RouteInfo {
    pub labels: Labels,
    pub parents: Vec<gw::ParentReference>,
}

#[derive(Clone, Debug, Default)]
pub struct BackendInfo {
    pub labels: Labels,
    /// Set for static backends.
    pub static_target: Option<(String, u16)>,
    pub sections: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ServiceInfo {
    pub labels: Labels,
    pub ports: Vec<ServicePortInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServicePortInfo {
    pub name: Option<String>,
    pub port: u16,
    pub app_protocol: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SecretInfo {
    pub labels: Labels,
    pub data: BTreeMap<String, Vec<u8>>,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigMapInfo {
    pub data: BTreeMap<String, String>,
}

/// Resources of one type, by namespace and then by name.
#[derive(Debug)]
struct Namespaced<T>(BTreeMap<String, BTreeMap<String, T>>);

// === impl Snapshot ===

impl Snapshot {
    pub fn shared(cluster_info: ClusterInfo) -> SharedSnapshot {
        Arc::new(RwLock::new(Self::new(cluster_info)))
    }

    pub fn new(cluster_info: ClusterInfo) -> Self {
        Self {
            cluster_info,
            gateways: Namespaced::default(),
            routes: Namespaced::default(),
            backends: Namespaced::default(),
            services: Namespaced::default(),
            secrets: Namespaced::default(),
            config_maps: Namespaced::default(),
            jwks: HashMap::default(),
            policies: Namespaced::default(),
            backend_tls_policies: Namespaced::default(),
        }
    }

    pub fn cluster_info(&self) -> &ClusterInfo {
        &self.cluster_info
    }

    pub fn gateway(&self, namespace: &str, name: &str) -> Option<&GatewayInfo> {
        self.gateways.get(namespace, name)
    }

    pub fn route(&self, namespace: &str, name: &str) -> Option<&RouteInfo> {
        self.routes.get(namespace, name)
    }

    pub fn backend(&self, namespace: &str, name: &str) -> Option<&BackendInfo> {
        self.backends.get(namespace, name)
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<&ServiceInfo> {
        self.services.get(namespace, name)
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<&SecretInfo> {
        self.secrets.get(namespace, name)
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<&ConfigMapInfo> {
        self.config_maps.get(namespace, name)
    }

    /// Looks up a pre-resolved key-set by the URI it was fetched from.
    pub fn jwks(&self, uri: &str) -> Option<&str> {
        let (ns, name) = self.jwks.get(uri)?.first()?;
        self.config_maps
            .get(ns, name)?
            .data
            .get(JWKS_KEY)
            .map(String::as_str)
    }

    fn forget_jwks(&mut self, id: &(String, String)) {
        self.jwks.retain(|_, owners| {
            owners.remove(id);
            !owners.is_empty()
        });
    }

    /// Secrets in `namespace` whose labels match `selector`, in name order.
    pub fn select_secrets<'a>(
        &'a self,
        namespace: &str,
        selector: &'a Selector,
    ) -> impl Iterator<Item = (&'a str, &'a SecretInfo)> + 'a {
        self.secrets
            .iter_ns(namespace)
            .filter(move |(_, s)| selector.matches(&s.labels))
    }

    /// Names of the resources of the given kind in `namespace` whose labels
    /// match, in name order. Unsupported kinds select nothing.
    pub fn select_targets(&self, group: &str, kind: &str, namespace: &str, selector: &Selector) -> Vec<String> {
        fn matching<'a, T: 'a>(
            iter: impl Iterator<Item = (&'a str, &'a T)>,
            labels: impl Fn(&T) -> &Labels,
            selector: &Selector,
        ) -> Vec<String> {
            iter.filter(|(_, t)| selector.matches(labels(t)))
                .map(|(name, _)| name.to_string())
                .collect()
        }

        match (group, kind) {
            (k8s::GATEWAY_GROUP, "Gateway") => {
                matching(self.gateways.iter_ns(namespace), |g| &g.labels, selector)
            }
            (k8s::GATEWAY_GROUP, "HTTPRoute") => {
                matching(self.routes.iter_ns(namespace), |r| &r.labels, selector)
            }
            (k8s::AGENTGATEWAY_GROUP, "AgentgatewayBackend") => {
                matching(self.backends.iter_ns(namespace), |b| &b.labels, selector)
            }
            ("" | "core", "Service") => {
                matching(self.services.iter_ns(namespace), |s| &s.labels, selector)
            }
            _ => vec![],
        }
    }

    pub fn services(&self) -> impl Iterator<Item = (&str, &str, &ServiceInfo)> {
        self.services.iter()
    }

    pub fn policies(&self) -> impl Iterator<Item = &AgentgatewayPolicy> {
        self.policies.iter().map(|(_, _, p)| p)
    }

    pub fn policy(&self, namespace: &str, name: &str) -> Option<&AgentgatewayPolicy> {
        self.policies.get(namespace, name)
    }

    pub fn backend_tls_policies(&self) -> impl Iterator<Item = &BackendTlsPolicy> {
        self.backend_tls_policies.iter().map(|(_, _, p)| p)
    }

    pub fn backend_tls_policies_in(&self, namespace: &str) -> impl Iterator<Item = &BackendTlsPolicy> {
        self.backend_tls_policies.iter_ns(namespace).map(|(_, p)| p)
    }

    pub fn backend_tls_policy(&self, namespace: &str, name: &str) -> Option<&BackendTlsPolicy> {
        self.backend_tls_policies.get(namespace, name)
    }
}

impl kubert::index::IndexNamespacedResource<gw::Gateway> for Snapshot {
    fn apply(&mut self, gateway: gw::Gateway) {
        let namespace = gateway.namespace().unwrap_or_default();
        let name = gateway.name_unchecked();
        let info = GatewayInfo {
            labels: gateway.metadata.labels.into(),
            listeners: gateway
                .spec
                .listeners
                .into_iter()
                .map(|l| l.name)
                .collect(),
        };
        self.gateways.insert(namespace, name, info);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.gateways.remove(&namespace, &name);
    }
}

impl kubert::index::IndexNamespacedResource<gw::HttpRoute> for Snapshot {
    fn apply(&mut self, route: gw::HttpRoute) {
        let namespace = route.namespace().unwrap_or_default();
        let name = route.name_unchecked();
        let info = RouteInfo {
            labels: route.metadata.labels.into(),
            parents: route.spec.inner.parent_refs.unwrap_or_default(),
        };
        self.routes.insert(namespace, name, info);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.routes.remove(&namespace, &name);
    }
}

impl kubert::index::IndexNamespacedResource<AgentgatewayBackend> for Snapshot {
    fn apply(&mut self, backend: AgentgatewayBackend) {
        let namespace = backend.namespace().unwrap_or_default();
        let name = backend.name_unchecked();
        let static_target = backend.spec.static_backend.as_ref().and_then(|s| {
            match u16::try_from(s.port) {
                Ok(port) => Some((s.host.clone(), port)),
                Err(_) => {
                    tracing::warn!(%namespace, %name, port = s.port, "Invalid static backend port");
                    None
                }
            }
        });
        let info = BackendInfo {
            sections: backend.spec.section_names().map(str::to_string).collect(),
            labels: backend.metadata.labels.into(),
            static_target,
        };
        self.backends.insert(namespace, name, info);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.backends.remove(&namespace, &name);
    }
}

impl kubert::index::IndexNamespacedResource<Service> for Snapshot {
    fn apply(&mut self, service: Service) {
        let namespace = service.namespace().unwrap_or_default();
        let name = service.name_unchecked();
        let ports = service
            .spec
            .into_iter()
            .flat_map(|spec| spec.ports.into_iter().flatten())
            .filter_map(|p| match u16::try_from(p.port) {
                Ok(port) => Some(ServicePortInfo {
                    name: p.name,
                    port,
                    app_protocol: p.app_protocol,
                }),
                Err(_) => {
                    tracing::warn!(%namespace, %name, port = p.port, "Invalid service port");
                    None
                }
            })
            .collect();
        let info = ServiceInfo {
            labels: service.metadata.labels.into(),
            ports,
        };
        self.services.insert(namespace, name, info);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.services.remove(&namespace, &name);
    }
}

impl kubert::index::IndexNamespacedResource<Secret> for Snapshot {
    fn apply(&mut self, secret: Secret) {
        let namespace = secret.namespace().unwrap_or_default();
        let name = secret.name_unchecked();
        let mut data = secret
            .data
            .into_iter()
            .flatten()
            .map(|(k, v)| (k, v.0))
            .collect::<BTreeMap<_, _>>();
        // `stringData` is write-only on the API server, but objects built
        // locally may carry it.
        for (k, v) in secret.string_data.into_iter().flatten() {
            data.insert(k, v.into_bytes());
        }
        let info = SecretInfo {
            labels: secret.metadata.labels.into(),
            data,
        };
        self.secrets.insert(namespace, name, info);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.secrets.remove(&namespace, &name);
    }
}

impl kubert::index::IndexNamespacedResource<ConfigMap> for Snapshot {
    fn apply(&mut self, config_map: ConfigMap) {
        let namespace = config_map.namespace().unwrap_or_default();
        let name = config_map.name_unchecked();

        let id = (namespace.clone(), name.clone());
        self.forget_jwks(&id);
        if let Some(uri) = config_map.annotations().get(JWKS_URI_ANNOTATION) {
            tracing::debug!(%namespace, %name, %uri, "Indexed key-set");
            let owners = self.jwks.entry(uri.clone()).or_default();
            owners.insert(id);
            if owners.len() > 1 {
                tracing::warn!(%uri, owners = owners.len(), "Multiple ConfigMaps hold the same key-set");
            }
        }

        let info = ConfigMapInfo {
            data: config_map.data.unwrap_or_default(),
        };
        self.config_maps.insert(namespace, name, info);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.forget_jwks(&(namespace.clone(), name.clone()));
        self.config_maps.remove(&namespace, &name);
    }
}

impl kubert::index::IndexNamespacedResource<AgentgatewayPolicy> for Snapshot {
    fn apply(&mut self, policy: AgentgatewayPolicy) {
        let namespace = policy.namespace().unwrap_or_default();
        let name = policy.name_unchecked();
        self.policies.insert(namespace, name, policy);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.policies.remove(&namespace, &name);
    }
}

impl kubert::index::IndexNamespacedResource<BackendTlsPolicy> for Snapshot {
    fn apply(&mut self, policy: BackendTlsPolicy) {
        let namespace = policy.namespace().unwrap_or_default();
        let name = policy.name_unchecked();
        self.backend_tls_policies.insert(namespace, name, policy);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.backend_tls_policies.remove(&namespace, &name);
    }
}

// === impl ServiceInfo ===

impl ServiceInfo {
    pub fn port_by_name(&self, name: &str) -> Option<u16> {
        self.ports
            .iter()
            .find(|p| p.name.as_deref() == Some(name))
            .map(|p| p.port)
    }
}

// === impl Namespaced ===

impl<T> Default for Namespaced<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T> Namespaced<T> {
    fn get(&self, namespace: &str, name: &str) -> Option<&T> {
        self.0.get(namespace)?.get(name)
    }

    fn insert(&mut self, namespace: String, name: String, value: T) {
        self.0.entry(namespace).or_default().insert(name, value);
    }

    fn remove(&mut self, namespace: &str, name: &str) {
        if let Entry::Occupied(mut entry) = self.0.entry(namespace.to_string()) {
            entry.get_mut().remove(name);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }

    fn iter_ns<'a>(&'a self, namespace: &str) -> impl Iterator<Item = (&'a str, &'a T)> + 'a {
        self.0
            .get(namespace)
            .into_iter()
            .flat_map(|by_name| by_name.iter().map(|(n, t)| (n.as_str(), t)))
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &str, &T)> {
        self.0.iter().flat_map(|(ns, by_name)| {
            by_name
                .iter()
                .map(move |(name, t)| (ns.as_str(), name.as_str(), t))
        })
    }
}
