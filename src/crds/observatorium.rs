use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics storage deployment, rendered by the observatorium operator.
#[derive(CustomResource, Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[kube(
    group = "core.observatorium.io",
    version = "v1alpha1",
    kind = "Observatorium",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ObservatoriumSpec {
    pub hashrings: Vec<Hashring>,
    pub object_storage_config: ObjectStorageConfig,
    pub api: ApiSpec,
    pub thanos: ThanosSpec,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hashring {
    pub hashring: String,
    #[serde(default)]
    pub tenants: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
pub struct ObjectStorageConfig {
    pub thanos: ThanosObjectStorage,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThanosObjectStorage {
    pub name: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_secret_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_secret_mount_path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiSpec {
    pub image: String,
    pub replicas: i32,
    pub tenants: Vec<TenantSpec>,
    pub rbac: RbacSpec,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
pub struct TenantSpec {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RbacSpec {
    pub roles: Vec<RoleSpec>,
    pub role_bindings: Vec<RoleBinding>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
pub struct RoleSpec {
    pub name: String,
    pub resources: Vec<String>,
    pub tenants: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
pub struct RoleBinding {
    pub name: String,
    pub roles: Vec<String>,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
pub struct Subject {
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThanosSpec {
    pub image: String,
    pub compact: CompactSpec,
    pub receivers: ReceiversSpec,
    pub rule: RuleSpec,
    pub store: StoreSpec,
    pub query: QuerySpec,
    pub query_frontend: QueryFrontendSpec,
    pub receive_controller: ReceiveControllerSpec,
}

/// Persistent volume claim stamped into a component's stateful set.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
pub struct VolumeClaimTemplate {
    pub spec: PersistentVolumeClaimSpec,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompactSpec {
    pub enable_downsampling: bool,
    pub retention_resolution_raw: String,
    #[serde(rename = "retentionResolution5m")]
    pub retention_resolution5m: String,
    #[serde(rename = "retentionResolution1h")]
    pub retention_resolution1h: String,
    pub delete_delay: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claim_template: Option<VolumeClaimTemplate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReceiversSpec {
    pub replicas: i32,
    pub replication_factor: i32,
    pub retention: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claim_template: Option<VolumeClaimTemplate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    pub replicas: i32,
    pub block_duration: String,
    pub retention: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claim_template: Option<VolumeClaimTemplate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreSpec {
    pub shards: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claim_template: Option<VolumeClaimTemplate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub replicas: i32,
    /// Maximum lookback duration for retrieving metrics during expression evaluation.
    pub lookback_delta: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
pub struct QueryFrontendSpec {
    pub replicas: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
pub struct ReceiveControllerSpec {
    pub image: String,
}
