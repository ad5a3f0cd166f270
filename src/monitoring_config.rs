//! Maintains the remote-write targets of the cluster monitoring stack.
//!
//! The cluster monitoring operator reads its settings from `config.yaml`
//! in the `openshift-monitoring/cluster-monitoring-config` config map.

use crate::{
    builder::Builder,
    config,
    crds::{ClusterMonitoringConfig, RelabelConfig, RemoteWriteSpec},
    errors, ObjectApi, WriteOutcome,
};
use anyhow::Context as _;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};

/// Remote-write entry pointing at `url`, normalized to the observatorium write endpoint.
pub fn create_remote_write_spec(url: &str, relabel_configs: &[RelabelConfig]) -> RemoteWriteSpec {
    let mut url = url.to_string();
    if !url.starts_with("http") {
        url = format!("{}{}", config::REMOTE_WRITE_PROTOCOL, url);
    }
    if !url.ends_with(config::REMOTE_WRITE_SUB_PATH) {
        url.push_str(config::REMOTE_WRITE_SUB_PATH);
    }
    RemoteWriteSpec {
        url,
        write_relabel_configs: relabel_configs.to_vec(),
        ..Default::default()
    }
}

/// Replaces the first remote-write entry whose URL contains `url`, or appends a new one.
pub fn upsert_remote_write(
    config: &mut ClusterMonitoringConfig,
    url: &str,
    relabel_configs: &[RelabelConfig],
) {
    let spec = create_remote_write_spec(url, relabel_configs);
    let remote_write = &mut config
        .prometheus_k8s
        .get_or_insert_with(Default::default)
        .remote_write;
    match remote_write.iter_mut().find(|rw| rw.url.contains(url)) {
        Some(existing) => *existing = spec,
        None => remote_write.push(spec),
    }
}

fn decode(raw: &str) -> anyhow::Result<ClusterMonitoringConfig> {
    if raw.trim().is_empty() {
        return Ok(ClusterMonitoringConfig::default());
    }
    serde_yaml::from_str(raw).context("failed to decode cluster monitoring config")
}

/// Points the cluster monitoring stack at `url`, creating the config map if needed.
#[tracing::instrument(skip(configmaps, relabel_configs))]
pub async fn update_cluster_monitoring_config(
    configmaps: &impl ObjectApi<ConfigMap>,
    url: &str,
    relabel_configs: &[RelabelConfig],
) -> anyhow::Result<WriteOutcome> {
    let name = config::CLUSTER_MONITORING_CONFIG_NAME;
    let mut configmap = match configmaps.get(name).await {
        Ok(cm) => cm,
        Err(err) if errors::is_not_found(&err) => {
            let mut monitoring_config = ClusterMonitoringConfig::default();
            upsert_remote_write(&mut monitoring_config, url, relabel_configs);
            let encoded = serde_yaml::to_string(&monitoring_config)?;

            let mut cm = Builder::<ConfigMap>::new();
            cm.name(name)
                .namespace(config::CLUSTER_MONITORING_CONFIG_NAMESPACE);
            cm.inner().add(config::CLUSTER_MONITORING_CONFIG_KEY, &encoded);
            configmaps
                .create(&cm.build())
                .await
                .context("failed to create cluster monitoring config")?;
            tracing::info!("Configmap created");
            return Ok(WriteOutcome::Created);
        }
        Err(err) => return Err(err).context("failed to get cluster monitoring config"),
    };

    let data = configmap.data.get_or_insert_with(Default::default);
    let raw = data
        .get(config::CLUSTER_MONITORING_CONFIG_KEY)
        .map(String::as_str)
        .unwrap_or_default();
    let mut monitoring_config = decode(raw)?;
    upsert_remote_write(&mut monitoring_config, url, relabel_configs);
    let encoded = serde_yaml::to_string(&monitoring_config)?;
    if encoded == raw {
        tracing::debug!("Configmap is up to date");
        return Ok(WriteOutcome::Unchanged);
    }
    data.insert(config::CLUSTER_MONITORING_CONFIG_KEY.to_string(), encoded);

    configmaps
        .replace(name, &configmap)
        .await
        .context("failed to update cluster monitoring config")?;
    tracing::info!("Configmap updated");
    Ok(WriteOutcome::Updated)
}

/// `ApiResource` of openshift routes, which have no typed bindings.
pub fn route_api_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("route.openshift.io", "v1", "Route"),
        "routes",
    )
}

/// Host under which the observatorium API is exposed.
pub async fn get_obs_api_url(routes: &impl ObjectApi<DynamicObject>) -> anyhow::Result<String> {
    let route = routes
        .get(config::OBSERVATORIUM_API_ROUTE)
        .await
        .context("failed to get observatorium api route")?;
    let host = route.data["spec"]["host"]
        .as_str()
        .filter(|h| !h.is_empty())
        .context("observatorium api route has no .spec.host")?;
    Ok(host.to_string())
}

/// Makes the hub's own prometheus write to observatorium, labeling its series as the hub.
pub async fn update_hub_cluster_monitoring_config(
    routes: &impl ObjectApi<DynamicObject>,
    configmaps: &impl ObjectApi<ConfigMap>,
) -> anyhow::Result<WriteOutcome> {
    let url = get_obs_api_url(routes).await?;
    let relabel_configs = [RelabelConfig {
        source_labels: vec!["__name__".to_string()],
        target_label: Some(config::CLUSTER_LABEL_KEY.to_string()),
        replacement: Some(config::HUB_CLUSTER_LABEL_VALUE.to_string()),
        ..Default::default()
    }];
    update_cluster_monitoring_config(configmaps, &url, &relabel_configs).await
}
