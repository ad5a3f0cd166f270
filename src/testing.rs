//! In-memory stand-in for the API server.

use crate::{errors, ObjectApi};
use async_trait::async_trait;
use kube::Resource;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

pub(crate) struct MemoryApi<K> {
    kind: &'static str,
    objects: Mutex<BTreeMap<String, K>>,
    writes: AtomicUsize,
    get_failure: Mutex<Option<(u16, &'static str)>>,
}

impl<K: Resource + Clone> MemoryApi<K> {
    pub(crate) fn new(kind: &'static str) -> Self {
        MemoryApi {
            kind,
            objects: Mutex::new(BTreeMap::new()),
            writes: AtomicUsize::new(0),
            get_failure: Mutex::new(None),
        }
    }

    pub(crate) fn with(kind: &'static str, objects: Vec<K>) -> Self {
        let api = Self::new(kind);
        {
            let mut map = api.objects.lock().unwrap();
            for obj in objects {
                map.insert(obj.meta().name.clone().unwrap_or_default(), obj);
            }
        }
        api
    }

    /// Number of successful create and replace calls
    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every following `get` fail with the given status code and reason.
    pub(crate) fn fail_get(&self, code: u16, reason: &'static str) {
        *self.get_failure.lock().unwrap() = Some((code, reason));
    }

    pub(crate) fn stored(&self, name: &str) -> Option<K> {
        self.objects.lock().unwrap().get(name).cloned()
    }
}

fn already_exists(kind: &str, name: &str) -> kube::Error {
    kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} \"{}\" already exists", kind, name),
        reason: "AlreadyExists".to_string(),
        code: 409,
    })
}

#[async_trait]
impl<K> ObjectApi<K> for MemoryApi<K>
where
    K: Resource + Clone + Send + Sync,
{
    async fn get(&self, name: &str) -> kube::Result<K> {
        if let Some((code, reason)) = *self.get_failure.lock().unwrap() {
            return Err(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("{} \"{}\" is unavailable", self.kind, name),
                reason: reason.to_string(),
                code,
            }));
        }
        self.stored(name)
            .ok_or_else(|| errors::not_found(self.kind, name))
    }

    async fn create(&self, obj: &K) -> kube::Result<K> {
        let name = obj.meta().name.clone().unwrap_or_default();
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&name) {
            return Err(already_exists(self.kind, &name));
        }
        objects.insert(name, obj.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(obj.clone())
    }

    async fn replace(&self, name: &str, obj: &K) -> kube::Result<K> {
        let mut objects = self.objects.lock().unwrap();
        if !objects.contains_key(name) {
            return Err(errors::not_found(self.kind, name));
        }
        objects.insert(name.to_string(), obj.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(obj.clone())
    }

    async fn list(&self) -> kube::Result<Vec<K>> {
        Ok(self.objects.lock().unwrap().values().cloned().collect())
    }
}
