use k8s_openapi::api::core::v1::Toleration;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level resource describing the observability stack of the hub.
#[derive(CustomResource, Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[kube(
    group = "observability.open-cluster-management.io",
    version = "v1beta2",
    kind = "MultiClusterObservability",
    shortname = "mco"
)]
#[serde(rename_all = "camelCase")]
pub struct MultiClusterObservabilitySpec {
    /// Object storage and persistent volume sizes.
    pub storage_config: StorageConfig,
    /// Settings pushed to the addon running on managed clusters.
    #[serde(default)]
    pub observability_addon_spec: ObservabilityAddonSpec,
    /// Enables thanos downsampling of historical data.
    #[serde(default = "default_true")]
    pub enable_downsampling: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_config: Option<RetentionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<NodeSelectorOptions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Secret holding the thanos object storage configuration.
    pub metric_object_storage: PreConfiguredStorage,
    /// Storage class for all persistent volumes. Empty means cluster default.
    #[serde(default)]
    pub storage_class: String,
    #[serde(default = "default_small_size")]
    pub alertmanager_storage_size: String,
    #[serde(default = "default_large_size")]
    pub compact_storage_size: String,
    #[serde(default = "default_small_size")]
    pub rule_storage_size: String,
    #[serde(default = "default_large_size")]
    pub receive_storage_size: String,
    #[serde(default = "default_small_size")]
    pub store_storage_size: String,
}

fn default_small_size() -> String {
    "10Gi".to_string()
}

fn default_large_size() -> String {
    "100Gi".to_string()
}

/// Reference to a key of a secret in the operator namespace.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreConfiguredStorage {
    pub key: String,
    pub name: String,
    /// Secret with the certificates referenced by the object storage config
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_secret_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_secret_mount_path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityAddonSpec {
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
    /// Metrics collection interval, in seconds.
    #[serde(default = "default_interval")]
    #[schemars(range(min = 15, max = 3600))]
    pub interval: i32,
}

fn default_interval() -> i32 {
    300
}

impl Default for ObservabilityAddonSpec {
    fn default() -> Self {
        ObservabilityAddonSpec {
            enable_metrics: true,
            interval: default_interval(),
        }
    }
}

/// Overrides for the thanos retention settings. Unset fields use defaults.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_resolution_raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_resolution5m: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_resolution1h: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_in_local: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_delay: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_duration: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelectorOptions {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_label_selector: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_label_value: String,
}

impl NodeSelectorOptions {
    /// Label selector these options describe. The custom label is only
    /// used when both its key and value are set.
    pub fn selector_map(&self) -> BTreeMap<String, String> {
        let mut selector = BTreeMap::new();
        if !self.os.is_empty() {
            selector.insert("beta.kubernetes.io/os".to_string(), self.os.clone());
        }
        if !self.custom_label_selector.is_empty() && !self.custom_label_value.is_empty() {
            selector.insert(
                self.custom_label_selector.clone(),
                self.custom_label_value.clone(),
            );
        }
        selector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_requires_both_custom_fields() {
        let opts = NodeSelectorOptions {
            os: "linux".to_string(),
            custom_label_selector: "zone".to_string(),
            custom_label_value: String::new(),
        };
        let selector = opts.selector_map();
        assert_eq!(selector.len(), 1);
        assert_eq!(selector["beta.kubernetes.io/os"], "linux");
    }

    #[test]
    fn spec_defaults_apply_when_fields_missing() {
        let spec: MultiClusterObservabilitySpec = serde_json::from_value(serde_json::json!({
            "storageConfig": {
                "metricObjectStorage": { "key": "thanos.yaml", "name": "thanos-object-storage" }
            }
        }))
        .unwrap();
        assert!(spec.enable_downsampling);
        assert_eq!(spec.observability_addon_spec.interval, 300);
        assert_eq!(spec.storage_config.receive_storage_size, "100Gi");
        assert_eq!(spec.storage_config.rule_storage_size, "10Gi");
    }
}
