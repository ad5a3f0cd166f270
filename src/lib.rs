pub mod applier;
pub mod builder;
pub mod config;
pub mod crds;
pub mod errors;
pub mod manifest;
pub mod monitoring_config;
pub mod observatorium;
pub mod patching;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use kube::Api;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// What a create-or-update operation ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Minimal set of object operations used by the reconcilers.
///
/// Implemented by `kube::Api`; tests substitute an in-memory store.
#[async_trait]
pub trait ObjectApi<K>: Send + Sync {
    async fn get(&self, name: &str) -> kube::Result<K>;

    async fn create(&self, obj: &K) -> kube::Result<K>;

    async fn replace(&self, name: &str, obj: &K) -> kube::Result<K>;

    async fn list(&self) -> kube::Result<Vec<K>>;
}

#[async_trait]
impl<K> ObjectApi<K> for Api<K>
where
    K: Clone + Debug + DeserializeOwned + Serialize + Send + Sync + 'static,
{
    async fn get(&self, name: &str) -> kube::Result<K> {
        Api::<K>::get(self, name).await
    }

    async fn create(&self, obj: &K) -> kube::Result<K> {
        Api::<K>::create(self, &Default::default(), obj).await
    }

    async fn replace(&self, name: &str, obj: &K) -> kube::Result<K> {
        Api::<K>::replace(self, name, &Default::default(), obj).await
    }

    async fn list(&self) -> kube::Result<Vec<K>> {
        let list = Api::<K>::list(self, &Default::default()).await?;
        Ok(list.items)
    }
}
