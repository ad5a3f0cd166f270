//! Typed schemas of the resources this crate reads and writes.
mod mco;
mod monitoring;
mod observatorium;

pub use mco::{
    MultiClusterObservability, MultiClusterObservabilitySpec, NodeSelectorOptions,
    ObservabilityAddonSpec, PreConfiguredStorage, RetentionConfig, StorageConfig,
};
pub use monitoring::{ClusterMonitoringConfig, PrometheusK8sConfig, RelabelConfig, RemoteWriteSpec};
pub use observatorium::{
    ApiSpec, CompactSpec, Hashring, ObjectStorageConfig, Observatorium, ObservatoriumSpec,
    QueryFrontendSpec, QuerySpec, RbacSpec, ReceiveControllerSpec, ReceiversSpec, RoleBinding,
    RoleSpec, RuleSpec, StoreSpec, Subject, TenantSpec, ThanosObjectStorage, ThanosSpec,
    VolumeClaimTemplate,
};
