use k8s_openapi::api::core::v1::ConfigMap;
use std::collections::BTreeMap;
/// Utility for configmap creation
pub struct ConfigMapBuilder(ConfigMap);

impl crate::builder::ConcreteBuilder<ConfigMap> for ConfigMapBuilder {
    fn new() -> Self {
        ConfigMapBuilder(ConfigMap {
            data: Some(BTreeMap::new()),
            ..Default::default()
        })
    }

    fn into_inner(self) -> ConfigMap {
        self.0
    }

    fn get_mut(&mut self) -> &mut ConfigMap {
        &mut self.0
    }
}

impl ConfigMapBuilder {
    pub fn add(&mut self, key: &str, data: &str) -> &mut Self {
        self.0
            .data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), data.to_string());
        self
    }
}

impl crate::builder::Build for ConfigMap {
    type ConcreteBuilder = ConfigMapBuilder;
}
