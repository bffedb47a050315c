use crate::{
    core::POLICY_CONTROLLER_NAME,
    index::{ClusterInfo, Snapshot},
    k8s::{self, Client, Resource},
    reconcile::Reconciler,
    sink::PolicySink,
    status,
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use tokio::{sync::mpsc, time::Duration};
use tracing::{info_span, Instrument};

// The maximum number of status patches to buffer. Patches that do not fit are
// retried on the next reconciliation.
const STATUS_UPDATE_QUEUE_SIZE: usize = 10_000;

#[derive(Debug, Parser)]
#[clap(name = "policy", about = "An agentgateway policy controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "agw=info,warn",
        env = "AGW_POLICY_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    #[clap(long, default_value = "cluster.local")]
    cluster_domain: String,

    /// The controller name written into policy status entries.
    #[clap(long, default_value = POLICY_CONTROLLER_NAME)]
    controller_name: String,

    #[clap(long, default_value = "10000")]
    reconciliation_period_ms: u64,

    #[clap(long, default_value = "5000")]
    patch_timeout_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            cluster_domain,
            controller_name,
            reconciliation_period_ms,
            patch_timeout_ms,
        } = self;

        let snapshot = Snapshot::shared(ClusterInfo {
            dns_domain: cluster_domain,
        });

        let mut prom = <Registry>::default();
        let resource_status = prom.sub_registry_with_prefix("resource_status");
        let status_metrics = status::ControllerMetrics::register(resource_status);
        let status_index_metrics = status::IndexMetrics::register(resource_status);
        let sink = PolicySink::new(prom.sub_registry_with_prefix("policy_sink"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        // Build the status index which will suppress patches for statuses
        // that have not changed.
        let (updates_tx, updates_rx) = mpsc::channel(STATUS_UPDATE_QUEUE_SIZE);
        let status_index =
            status::Index::shared(controller_name.clone(), updates_tx, status_index_metrics);

        // Spawn resource watches.

        let gateways = runtime.watch_all::<k8s::Gateway>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(snapshot.clone(), gateways)
                .instrument(info_span!("gateways")),
        );

        let http_routes = runtime.watch_all::<k8s::HttpRoute>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(snapshot.clone(), http_routes)
                .instrument(info_span!("httproutes")),
        );

        let backends = runtime.watch_all::<k8s::AgentgatewayBackend>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(snapshot.clone(), backends)
                .instrument(info_span!("agentgatewaybackends")),
        );

        let services = runtime.watch_all::<k8s::Service>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(snapshot.clone(), services)
                .instrument(info_span!("services")),
        );

        let secrets = runtime.watch_all::<k8s::Secret>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(snapshot.clone(), secrets).instrument(info_span!("secrets")),
        );

        let config_maps = runtime.watch_all::<k8s::ConfigMap>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(snapshot.clone(), config_maps)
                .instrument(info_span!("configmaps")),
        );

        let policies = runtime.watch_all::<k8s::AgentgatewayPolicy>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(snapshot.clone(), policies)
                .instrument(info_span!("agentgatewaypolicies")),
        );

        if api_resource_exists::<k8s::BackendTlsPolicy>(&runtime.client()).await {
            let backend_tls_policies =
                runtime.watch_all::<k8s::BackendTlsPolicy>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(snapshot.clone(), backend_tls_policies)
                    .instrument(info_span!("backendtlspolicies")),
            );
        } else {
            tracing::warn!(
                "backendtlspolicies.gateway.networking.k8s.io resource kind not found, skipping watches"
            );
        }

        // Spawn the periodic reconciliation that drives translation.
        let reconciler = Reconciler::new(snapshot, status_index.clone(), sink);
        tokio::spawn(
            reconciler
                .run(Duration::from_millis(reconciliation_period_ms))
                .instrument(info_span!("reconciler")),
        );

        let status_controller = status::Controller::new(
            runtime.client(),
            controller_name,
            updates_rx,
            status_index,
            Duration::from_millis(patch_timeout_ms),
            status_metrics,
        );
        tokio::spawn(
            status_controller
                .run()
                .instrument(info_span!("status_controller")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

async fn api_resource_exists<T>(client: &Client) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    client
        .list_api_group_resources(&T::api_version(&dt))
        .await
        .ok()
        .iter()
        .flat_map(|r| r.resources.iter())
        .any(|r| r.kind == T::kind(&dt))
}
