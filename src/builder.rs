mod configmap;

pub use configmap::ConfigMapBuilder;

use kube::api::{ObjectMeta, Resource};

/// Type that knows how to build certain resource.
/// This trait is consumed by Builder, not by library users.
pub trait ConcreteBuilder<K> {
    fn new() -> Self;

    fn into_inner(self) -> K;

    fn get_mut(&mut self) -> &mut K;
}

/// Each resource needs special builder
pub trait Build: Resource<DynamicType = ()> + Sized {
    type ConcreteBuilder: ConcreteBuilder<Self>;
}

/// Utility for resource creation
pub struct Builder<K: Build>(K::ConcreteBuilder);

impl<K: Build> Default for Builder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Build> Builder<K> {
    pub fn new() -> Self {
        Builder(K::ConcreteBuilder::new())
    }

    pub fn build(self) -> K {
        self.0.into_inner()
    }

    fn meta(&mut self) -> &mut ObjectMeta {
        self.0.get_mut().meta_mut()
    }

    pub fn name(&mut self, name: &str) -> &mut Self {
        self.meta().name = Some(name.to_string());
        self
    }

    pub fn namespace(&mut self, namespace: &str) -> &mut Self {
        self.meta().namespace = Some(namespace.to_string());
        self
    }

    pub fn inner(&mut self) -> &mut K::ConcreteBuilder {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;

    #[test]
    fn builds_configmap() {
        let mut b = Builder::<ConfigMap>::new();
        b.name("cluster-monitoring-config")
            .namespace("openshift-monitoring");
        b.inner().add("config.yaml", "{}\n");
        let cm = b.build();
        assert_eq!(cm.metadata.name.as_deref(), Some("cluster-monitoring-config"));
        assert_eq!(cm.metadata.namespace.as_deref(), Some("openshift-monitoring"));
        assert_eq!(cm.data.unwrap()["config.yaml"], "{}\n");
        assert!(cm.metadata.labels.is_none());
    }
}
