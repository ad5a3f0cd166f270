//! Derives the `Observatorium` resource from a `MultiClusterObservability`.

use crate::{
    config::{self, Component},
    crds::{
        ApiSpec, CompactSpec, Hashring, MultiClusterObservability, ObjectStorageConfig,
        Observatorium, ObservatoriumSpec, PreConfiguredStorage, QueryFrontendSpec, QuerySpec,
        RbacSpec, ReceiveControllerSpec, ReceiversSpec, RoleBinding, RoleSpec, RuleSpec,
        StoreSpec, Subject, TenantSpec, ThanosObjectStorage, ThanosSpec, VolumeClaimTemplate,
    },
    errors, ObjectApi, WriteOutcome,
};
use anyhow::Context as _;
use k8s_openapi::{
    api::{
        core::v1::{PersistentVolumeClaimSpec, Secret, VolumeResourceRequirements},
        storage::v1::StorageClass,
    },
    apimachinery::pkg::api::resource::Quantity,
};
use kube::{api::ObjectMeta, Resource, ResourceExt};
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path};

const STORAGE_REQUEST: &str = "storage";

/// Claim template with a single ReadWriteOnce volume of given size.
pub fn new_volume_claim_template(size: &str, storage_class: &str) -> VolumeClaimTemplate {
    let mut requests = BTreeMap::new();
    requests.insert(STORAGE_REQUEST.to_string(), Quantity(size.to_string()));
    VolumeClaimTemplate {
        spec: PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            storage_class_name: Some(storage_class.to_string()),
            ..Default::default()
        },
    }
}

fn storage_request(vct: &VolumeClaimTemplate) -> Option<&Quantity> {
    vct.spec
        .resources
        .as_ref()
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get(STORAGE_REQUEST))
}

/// Copies the storage request of `new` into `old`, leaving other fields of `old` intact.
pub fn merge_volume_claim_template(old: &mut VolumeClaimTemplate, new: &VolumeClaimTemplate) {
    let requested = match storage_request(new) {
        Some(q) => q.clone(),
        None => return,
    };
    if storage_request(old) == Some(&requested) {
        return;
    }
    old.spec
        .resources
        .get_or_insert_with(Default::default)
        .requests
        .get_or_insert_with(BTreeMap::new)
        .insert(STORAGE_REQUEST.to_string(), requested);
}

fn tenant_id(tenant: &str) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, tenant.as_bytes()).to_string()
}

/// Desired observatorium spec. Pure function of its inputs.
pub fn new_default_observatorium_spec(
    mco: &MultiClusterObservability,
    storage_class: &str,
    tls_secret_mount_path: &str,
) -> ObservatoriumSpec {
    let spec = &mco.spec;
    let storage = &spec.storage_config;
    let retention = spec.retention_config.clone().unwrap_or_default();
    let or_default = |v: &Option<String>, default: &str| v.clone().unwrap_or_else(|| default.to_string());
    let retention_in_local = or_default(&retention.retention_in_local, config::DEFAULT_RETENTION_IN_LOCAL);

    let tenant = TenantSpec {
        name: config::DEFAULT_TENANT.to_string(),
        id: tenant_id(config::DEFAULT_TENANT),
    };
    let rbac = RbacSpec {
        roles: vec![RoleSpec {
            name: "read-write".to_string(),
            resources: vec!["metrics".to_string()],
            tenants: vec![tenant.name.clone()],
            permissions: vec!["read".to_string(), "write".to_string()],
        }],
        role_bindings: vec![RoleBinding {
            name: "read-write".to_string(),
            roles: vec!["read-write".to_string()],
            subjects: vec![Subject {
                name: "admin@example.com".to_string(),
                kind: "user".to_string(),
            }],
        }],
    };

    ObservatoriumSpec {
        hashrings: vec![Hashring {
            hashring: config::DEFAULT_HASHRING.to_string(),
            tenants: Vec::new(),
        }],
        object_storage_config: ObjectStorageConfig {
            thanos: ThanosObjectStorage {
                name: storage.metric_object_storage.name.clone(),
                key: storage.metric_object_storage.key.clone(),
                tls_secret_name: storage.metric_object_storage.tls_secret_name.clone(),
                tls_secret_mount_path: tls_secret_mount_path.to_string(),
            },
        },
        api: ApiSpec {
            image: config::component_image(mco, Component::ObservatoriumApi),
            replicas: config::DEFAULT_API_REPLICAS,
            tenants: vec![tenant],
            rbac,
        },
        thanos: ThanosSpec {
            image: config::component_image(mco, Component::Thanos),
            compact: CompactSpec {
                enable_downsampling: spec.enable_downsampling,
                retention_resolution_raw: or_default(
                    &retention.retention_resolution_raw,
                    config::DEFAULT_RETENTION_RESOLUTION_RAW,
                ),
                retention_resolution5m: or_default(
                    &retention.retention_resolution5m,
                    config::DEFAULT_RETENTION_RESOLUTION_5M,
                ),
                retention_resolution1h: or_default(
                    &retention.retention_resolution1h,
                    config::DEFAULT_RETENTION_RESOLUTION_1H,
                ),
                delete_delay: or_default(&retention.delete_delay, config::DEFAULT_DELETE_DELAY),
                volume_claim_template: Some(new_volume_claim_template(
                    &storage.compact_storage_size,
                    storage_class,
                )),
            },
            receivers: ReceiversSpec {
                replicas: config::DEFAULT_RECEIVER_REPLICAS,
                replication_factor: config::DEFAULT_REPLICATION_FACTOR,
                retention: retention_in_local.clone(),
                volume_claim_template: Some(new_volume_claim_template(
                    &storage.receive_storage_size,
                    storage_class,
                )),
            },
            rule: RuleSpec {
                replicas: config::DEFAULT_RULE_REPLICAS,
                block_duration: or_default(&retention.block_duration, config::DEFAULT_BLOCK_DURATION),
                retention: retention_in_local,
                volume_claim_template: Some(new_volume_claim_template(
                    &storage.rule_storage_size,
                    storage_class,
                )),
            },
            store: StoreSpec {
                shards: config::DEFAULT_STORE_SHARDS,
                volume_claim_template: Some(new_volume_claim_template(
                    &storage.store_storage_size,
                    storage_class,
                )),
            },
            query: QuerySpec {
                replicas: config::DEFAULT_QUERY_REPLICAS,
                lookback_delta: format!("{}s", i64::from(spec.observability_addon_spec.interval) * 2),
            },
            query_frontend: QueryFrontendSpec {
                replicas: config::DEFAULT_QUERY_FRONTEND_REPLICAS,
            },
            receive_controller: ReceiveControllerSpec {
                image: config::component_image(mco, Component::ThanosReceiveController),
            },
        },
        node_selector: spec
            .node_selector
            .as_ref()
            .map(|n| n.selector_map())
            .unwrap_or_default(),
        tolerations: spec.tolerations.clone(),
    }
}

#[derive(Deserialize, Default)]
struct ObjectStorageConf {
    #[serde(default)]
    config: BucketConf,
}

#[derive(Deserialize, Default)]
struct BucketConf {
    #[serde(default)]
    http_config: HttpConf,
}

#[derive(Deserialize, Default)]
struct HttpConf {
    #[serde(default)]
    tls_config: TlsConf,
}

#[derive(Deserialize, Default)]
struct TlsConf {
    #[serde(default)]
    ca_file: String,
    #[serde(default)]
    cert_file: String,
    #[serde(default)]
    key_file: String,
}

/// Directory the object storage config expects its TLS files in.
/// Returns an empty string when the config references no TLS files.
pub async fn get_tls_secret_mount_path(
    secrets: &impl ObjectApi<Secret>,
    storage: &PreConfiguredStorage,
) -> anyhow::Result<String> {
    let secret = secrets
        .get(&storage.name)
        .await
        .with_context(|| format!("failed to get object storage secret {}", storage.name))?;
    let data = secret
        .data
        .as_ref()
        .and_then(|d| d.get(&storage.key))
        .with_context(|| format!("secret {} has no key {}", storage.name, storage.key))?;
    let conf: ObjectStorageConf =
        serde_yaml::from_slice(&data.0).context("failed to parse object storage config")?;
    let tls = conf.config.http_config.tls_config;
    let file = [tls.ca_file, tls.cert_file, tls.key_file]
        .into_iter()
        .find(|f| !f.is_empty());
    let path = file
        .as_deref()
        .and_then(|f| Path::new(f).parent())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(path)
}

/// Picks the storage class for the claim templates.
pub async fn get_storage_class(
    mco: &MultiClusterObservability,
    storage_classes: &impl ObjectApi<StorageClass>,
) -> anyhow::Result<String> {
    let configured = &mco.spec.storage_config.storage_class;
    let classes = storage_classes
        .list()
        .await
        .context("failed to list storage classes")?;
    if classes.iter().any(|sc| &sc.name_any() == configured) {
        return Ok(configured.clone());
    }
    let default = classes.iter().find(|sc| {
        sc.annotations()
            .get(config::DEFAULT_STORAGE_CLASS_ANNOTATION)
            .map_or(false, |v| v == "true")
    });
    Ok(match default {
        Some(sc) => sc.name_any(),
        None => configured.clone(),
    })
}

fn claim_templates(spec: &mut ObservatoriumSpec) -> [&mut Option<VolumeClaimTemplate>; 4] {
    let thanos = &mut spec.thanos;
    [
        &mut thanos.compact.volume_claim_template,
        &mut thanos.receivers.volume_claim_template,
        &mut thanos.rule.volume_claim_template,
        &mut thanos.store.volume_claim_template,
    ]
}

/// Keeps the claim templates of `existing` and only carries size changes over from `desired`.
fn merge_claim_templates(existing: &ObservatoriumSpec, desired: &mut ObservatoriumSpec) {
    let mut existing = existing.clone();
    for (old, new) in claim_templates(&mut existing)
        .into_iter()
        .zip(claim_templates(desired))
    {
        if let (Some(old), Some(new)) = (old.as_mut(), new.as_mut()) {
            merge_volume_claim_template(old, new);
            *new = old.clone();
        }
    }
}

/// Creates the observatorium CR or brings the existing one in line with `mco`.
#[tracing::instrument(skip_all, fields(mco = %mco.name_any(), namespace = namespace))]
pub async fn generate_observatorium_cr(
    observatoriums: &impl ObjectApi<Observatorium>,
    secrets: &impl ObjectApi<Secret>,
    storage_classes: &impl ObjectApi<StorageClass>,
    mco: &MultiClusterObservability,
    namespace: &str,
) -> anyhow::Result<WriteOutcome> {
    let name = config::DEFAULT_CR_NAME;
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), name.to_string());

    let storage_class = get_storage_class(mco, storage_classes).await?;
    let object_storage = &mco.spec.storage_config.metric_object_storage;
    let tls_secret_mount_path = if !object_storage.tls_secret_mount_path.is_empty() {
        object_storage.tls_secret_mount_path.clone()
    } else if !object_storage.tls_secret_name.is_empty() {
        get_tls_secret_mount_path(secrets, object_storage).await?
    } else {
        String::new()
    };
    let mut desired_spec = new_default_observatorium_spec(mco, &storage_class, &tls_secret_mount_path);

    let found = match observatoriums.get(name).await {
        Ok(found) => found,
        Err(err) if errors::is_not_found(&err) => {
            tracing::info!(name, "Creating observatorium CR");
            let mut obs = Observatorium::new(name, desired_spec);
            obs.metadata = ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels),
                owner_references: mco.controller_owner_ref(&()).map(|r| vec![r]),
                ..Default::default()
            };
            observatoriums
                .create(&obs)
                .await
                .context("failed to create observatorium CR")?;
            return Ok(WriteOutcome::Created);
        }
        Err(err) => return Err(err).context("failed to get observatorium CR"),
    };

    merge_claim_templates(&found.spec, &mut desired_spec);
    let old_bytes = serde_yaml::to_string(&found.spec)?;
    let new_bytes = serde_yaml::to_string(&desired_spec)?;
    let app_label = found.labels().get("app").map(String::as_str);
    if old_bytes == new_bytes && app_label == Some(name) {
        tracing::debug!(name, "Observatorium CR is up to date");
        return Ok(WriteOutcome::Unchanged);
    }

    tracing::info!(name, "Updating observatorium CR");
    let mut updated = found;
    updated.spec = desired_spec;
    updated.labels_mut().insert("app".to_string(), name.to_string());
    observatoriums
        .replace(name, &updated)
        .await
        .context("failed to update observatorium CR")?;
    Ok(WriteOutcome::Updated)
}
