//! Operator-wide names, defaults and annotation lookups.

use crate::crds::MultiClusterObservability;
use kube::ResourceExt;

/// Namespace holding the hub observability stack
pub const DEFAULT_NAMESPACE: &str = "open-cluster-management-observability";
/// Name of the singleton `MultiClusterObservability`
pub const DEFAULT_CR_NAME: &str = "observability";

pub const ANNOTATION_KEY_IMAGE_REPOSITORY: &str = "mco-imageRepository";
pub const ANNOTATION_KEY_IMAGE_TAG_SUFFIX: &str = "mco-imageTagSuffix";

pub const DEFAULT_IMAGE_REPOSITORY: &str = "quay.io/stolostron";
pub const DEFAULT_IMAGE_TAG: &str = "2.4.0";

pub const CLUSTER_MONITORING_CONFIG_NAME: &str = "cluster-monitoring-config";
pub const CLUSTER_MONITORING_CONFIG_NAMESPACE: &str = "openshift-monitoring";
pub const CLUSTER_MONITORING_CONFIG_KEY: &str = "config.yaml";

pub const REMOTE_WRITE_PROTOCOL: &str = "http://";
pub const REMOTE_WRITE_SUB_PATH: &str = "/api/metrics/v1/write";

/// Label injected into every series written from the hub itself
pub const CLUSTER_LABEL_KEY: &str = "cluster";
pub const HUB_CLUSTER_LABEL_VALUE: &str = "hub_cluster";

pub const OBSERVATORIUM_API_ROUTE: &str = "observatorium-api";

pub const DEFAULT_TENANT: &str = "default";
pub const DEFAULT_HASHRING: &str = "default";

pub const DEFAULT_RETENTION_RESOLUTION_RAW: &str = "30d";
pub const DEFAULT_RETENTION_RESOLUTION_5M: &str = "180d";
pub const DEFAULT_RETENTION_RESOLUTION_1H: &str = "0d";
pub const DEFAULT_RETENTION_IN_LOCAL: &str = "24h";
pub const DEFAULT_DELETE_DELAY: &str = "48h";
pub const DEFAULT_BLOCK_DURATION: &str = "2h";

pub const DEFAULT_API_REPLICAS: i32 = 2;
pub const DEFAULT_RECEIVER_REPLICAS: i32 = 3;
pub const DEFAULT_REPLICATION_FACTOR: i32 = 3;
pub const DEFAULT_RULE_REPLICAS: i32 = 3;
pub const DEFAULT_STORE_SHARDS: i32 = 3;
pub const DEFAULT_QUERY_REPLICAS: i32 = 2;
pub const DEFAULT_QUERY_FRONTEND_REPLICAS: i32 = 2;

pub const DEFAULT_STORAGE_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

/// Images rendered into the observatorium spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Component {
    ObservatoriumApi,
    Thanos,
    ThanosReceiveController,
}

fn annotation<'a>(mco: &'a MultiClusterObservability, key: &str) -> Option<&'a str> {
    mco.annotations()
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Image repository override, if the CR carries one.
pub fn image_repository(mco: &MultiClusterObservability) -> Option<&str> {
    annotation(mco, ANNOTATION_KEY_IMAGE_REPOSITORY)
}

pub fn image_tag_suffix(mco: &MultiClusterObservability) -> Option<&str> {
    annotation(mco, ANNOTATION_KEY_IMAGE_TAG_SUFFIX)
}

/// Full image reference of a component, honoring annotation overrides.
pub fn component_image(mco: &MultiClusterObservability, component: Component) -> String {
    let repo = image_repository(mco).unwrap_or(DEFAULT_IMAGE_REPOSITORY);
    let tag = image_tag_suffix(mco).unwrap_or(DEFAULT_IMAGE_TAG);
    format!("{}/{}:{}", repo, component, tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::MultiClusterObservabilitySpec;
    use std::collections::BTreeMap;

    fn mco_with(annotations: &[(&str, &str)]) -> MultiClusterObservability {
        let mut mco = MultiClusterObservability::new("test", MultiClusterObservabilitySpec::default());
        mco.metadata.annotations = Some(
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        mco
    }

    #[test]
    fn default_images() {
        let mco = mco_with(&[]);
        assert_eq!(
            component_image(&mco, Component::ThanosReceiveController),
            "quay.io/stolostron/thanos-receive-controller:2.4.0"
        );
    }

    #[test]
    fn annotations_override_images() {
        let mco = mco_with(&[
            (ANNOTATION_KEY_IMAGE_REPOSITORY, "quay.io:443/acm-d"),
            (ANNOTATION_KEY_IMAGE_TAG_SUFFIX, "tag"),
        ]);
        assert_eq!(component_image(&mco, Component::Thanos), "quay.io:443/acm-d/thanos:tag");
    }

    #[test]
    fn empty_annotation_is_ignored() {
        let mco = mco_with(&[(ANNOTATION_KEY_IMAGE_REPOSITORY, "")]);
        assert_eq!(image_repository(&mco), None);
    }
}
