use crate::manifest::Manifest;
use anyhow::Context;
use kube::{
    api::{DynamicObject, GroupVersionKind, Patch, PatchParams},
    discovery::{self, Scope},
    Api,
};

/// Utility for writing rendered manifests of arbitrary kinds to the cluster
/// as server-side apply patches
#[derive(Clone)]
pub struct Applier {
    client: kube::Client,
    default_namespace: String,
    field_manager: String,
}

/// Splits `group/version` (or a bare core `version`) into its parts.
pub fn parse_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

impl Applier {
    /// Creates a new applier, connected to cluster
    pub fn new(client: kube::Client, default_namespace: &str, field_manager: &str) -> Self {
        Applier {
            client,
            default_namespace: default_namespace.to_string(),
            field_manager: field_manager.to_string(),
        }
    }

    async fn api_for(&self, manifest: &mut Manifest) -> anyhow::Result<Api<DynamicObject>> {
        let (group, version) = parse_api_version(manifest.api_version());
        let gvk = GroupVersionKind::gvk(group, version, manifest.kind());
        let (resource, caps) = discovery::pinned_kind(&self.client, &gvk)
            .await
            .with_context(|| format!("failed to discover {:?}", gvk))?;
        let api = match caps.scope {
            Scope::Namespaced => {
                let ns = match manifest.namespace() {
                    Some(ns) => ns.to_string(),
                    None => {
                        manifest.set_namespace(&self.default_namespace);
                        self.default_namespace.clone()
                    }
                };
                Api::namespaced_with(self.client.clone(), &ns, &resource)
            }
            Scope::Cluster => Api::all_with(self.client.clone(), &resource),
        };
        Ok(api)
    }

    /// Applies a manifest. Namespaced objects without namespace land in the default one.
    #[tracing::instrument(skip(self, manifest), fields(kind = manifest.kind(), name = ?manifest.name()))]
    pub async fn apply(&self, mut manifest: Manifest) -> anyhow::Result<DynamicObject> {
        let api = self.api_for(&mut manifest).await?;
        let name = manifest.name().context("manifest has no name")?.to_string();
        let resource = manifest.to_dynamic()?;
        tracing::debug!(manifest = %serde_yaml::to_string(&resource)?, "applying");

        let applied = api
            .patch(
                &name,
                &PatchParams::apply(&self.field_manager),
                &Patch::Apply(&resource),
            )
            .await?;
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_version_parts() {
        assert_eq!(parse_api_version("apps/v1"), ("apps", "v1"));
        assert_eq!(parse_api_version("v1"), ("", "v1"));
        assert_eq!(
            parse_api_version("core.observatorium.io/v1alpha1"),
            ("core.observatorium.io", "v1alpha1")
        );
    }
}
