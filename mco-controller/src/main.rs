mod cli;

use anyhow::Context as _;
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::{
    core::v1::{ConfigMap, Secret},
    storage::v1::StorageClass,
};
use kube::{
    api::{Api, DynamicObject},
    Resource, ResourceExt,
};
use kube_runtime::{controller::Action, watcher, Controller};
use mco_utils::{
    applier::Applier,
    config,
    crds::{MultiClusterObservability, Observatorium},
    manifest::Manifest,
    monitoring_config, observatorium, patching,
};
use std::{path::Path, sync::Arc, time::Duration};

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)]
    Reconcile(#[from] anyhow::Error),
}

struct ContextData {
    client: kube::Client,
    args: cli::Args,
    applier: Applier,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_filter)),
        )
        .init();
    tracing::info!(args = ?args, "parsed command-line arguments");

    let client = kube::Client::try_default()
        .await
        .context("failed to create kubernetes client")?;
    let applier = Applier::new(client.clone(), &args.namespace, &args.field_manager);
    let cx = Arc::new(ContextData {
        client: client.clone(),
        args,
        applier,
    });

    let mcos = Api::<MultiClusterObservability>::all(client);
    Controller::new(mcos, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, cx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => tracing::debug!(name = %obj.name, "Reconciled successfully"),
                Err(err) => tracing::warn!("Reconcilation failed: {:#}", err),
            }
        })
        .await;
    tracing::info!("controller stopped");
    Ok(())
}

#[tracing::instrument(skip(mco, cx), fields(name = %mco.name_any()))]
async fn reconcile(mco: Arc<MultiClusterObservability>, cx: Arc<ContextData>) -> Result<Action, Error> {
    let client = &cx.client;
    let ns = cx.args.namespace.as_str();

    let observatoriums = Api::<Observatorium>::namespaced(client.clone(), ns);
    let secrets = Api::<Secret>::namespaced(client.clone(), ns);
    let storage_classes = Api::<StorageClass>::all(client.clone());
    let outcome =
        observatorium::generate_observatorium_cr(&observatoriums, &secrets, &storage_classes, &mco, ns)
            .await?;
    tracing::info!(%outcome, "observatorium CR reconciled");

    if !cx.args.skip_hub_monitoring_config {
        let routes =
            Api::<DynamicObject>::namespaced_with(client.clone(), ns, &monitoring_config::route_api_resource());
        let configmaps =
            Api::<ConfigMap>::namespaced(client.clone(), config::CLUSTER_MONITORING_CONFIG_NAMESPACE);
        let outcome = monitoring_config::update_hub_cluster_monitoring_config(&routes, &configmaps).await?;
        tracing::info!(%outcome, "hub monitoring config reconciled");
    }

    if let Some(dir) = &cx.args.manifests_dir {
        let manifests = load_manifests(dir).await?;
        let owner = mco
            .controller_owner_ref(&())
            .context("MultiClusterObservability has no uid")?;
        let owner = serde_json::to_value(owner).context("failed to serialize owner reference")?;
        for mut manifest in manifests {
            patching::apply_global_patches(&mut manifest, &mco)?;
            manifest.patch(&serde_json::json!({ "metadata": { "ownerReferences": [owner] } }));
            cx.applier.apply(manifest).await?;
        }
    }

    Ok(Action::requeue(cx.args.resync.0))
}

fn error_policy(_mco: Arc<MultiClusterObservability>, _err: &Error, _cx: Arc<ContextData>) -> Action {
    Action::requeue(Duration::from_secs(30))
}

/// Reads every `*.yaml`/`*.yml` file of `dir`, in file name order.
async fn load_manifests(dir: &Path) -> anyhow::Result<Vec<Manifest>> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut manifests = Vec::new();
    for path in paths {
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let docs = Manifest::from_yaml_documents(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        manifests.extend(docs);
    }
    Ok(manifests)
}
