//! Rendered Kubernetes manifests as schemaless JSON documents.

use anyhow::Context as _;
use kube::api::DynamicObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single Kubernetes object of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(Value);

enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Splits `a.b[0].c` into keys and indices. Returns None on malformed input.
fn parse_path(path: &str) -> Option<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(i) => part.split_at(i),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(key));
        }
        while !rest.is_empty() {
            let close = rest.find(']')?;
            let idx = rest.get(1..close)?.parse().ok()?;
            segments.push(Segment::Index(idx));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return None;
            }
        }
    }
    Some(segments)
}

impl Manifest {
    pub fn new(value: Value) -> anyhow::Result<Self> {
        if !value.is_object() {
            anyhow::bail!("manifest must be an object");
        }
        Ok(Manifest(value))
    }

    /// Parses a multi-document YAML stream. Empty documents are skipped.
    pub fn from_yaml_documents(input: &str) -> anyhow::Result<Vec<Manifest>> {
        let mut manifests = Vec::new();
        for (i, doc) in serde_yaml::Deserializer::from_str(input).enumerate() {
            let value = Value::deserialize(doc)
                .with_context(|| format!("failed to parse document {}", i))?;
            if value.is_null() {
                continue;
            }
            manifests.push(Manifest::new(value).with_context(|| format!("document {}", i))?);
        }
        Ok(manifests)
    }

    pub fn kind(&self) -> &str {
        self.0["kind"].as_str().unwrap_or_default()
    }

    pub fn api_version(&self) -> &str {
        self.0["apiVersion"].as_str().unwrap_or_default()
    }

    pub fn name(&self) -> Option<&str> {
        self.0["metadata"]["name"].as_str()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0["metadata"]["namespace"].as_str()
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.patch(&serde_json::json!({ "metadata": { "namespace": namespace } }));
    }

    /// Looks up a value by path such as `spec.template.spec.containers[0].image`.
    pub fn find(&self, path: &str) -> Option<&Value> {
        let mut current = &self.0;
        for segment in parse_path(path)? {
            current = match segment {
                Segment::Key(key) => current.as_object()?.get(key)?,
                Segment::Index(idx) => current.as_array()?.get(idx)?,
            };
        }
        Some(current)
    }

    pub fn get_field(&self, path: &str) -> anyhow::Result<&Value> {
        self.find(path)
            .with_context(|| format!("{} {}: no field {}", self.kind(), self.name().unwrap_or_default(), path))
    }

    pub fn get_string(&self, path: &str) -> anyhow::Result<&str> {
        self.get_field(path)?
            .as_str()
            .with_context(|| format!("field {} is not a string", path))
    }

    pub fn get_slice(&self, path: &str) -> anyhow::Result<&[Value]> {
        self.get_field(path)?
            .as_array()
            .map(Vec::as_slice)
            .with_context(|| format!("field {} is not a list", path))
    }

    pub fn get_string_slice(&self, path: &str) -> anyhow::Result<Vec<String>> {
        self.get_slice(path)?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(ToString::to_string)
                    .with_context(|| format!("field {} contains a non-string item", path))
            })
            .collect()
    }

    /// Applies an RFC 7386 merge patch.
    pub fn patch(&mut self, patch: &Value) {
        json_patch::merge(&mut self.0, patch);
    }

    pub fn to_dynamic(&self) -> anyhow::Result<DynamicObject> {
        serde_json::from_value(self.0.clone()).context("manifest is not a valid kubernetes object")
    }
}
