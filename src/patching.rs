//! Overrides injected into rendered workloads before they are applied.
//!
//! Every generator returns a JSON merge patch. Name-keyed lists (env,
//! volumes, volume mounts) are merged by `name` and emitted sorted, so the
//! same inputs always produce the same patch.

use crate::{config, crds::MultiClusterObservability, manifest::Manifest};
use anyhow::Context as _;
use k8s_openapi::api::core::v1::{EnvVar, Volume, VolumeMount};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const CONTAINERS: &str = "spec.template.spec.containers";
const FIRST_CONTAINER: &str = "spec.template.spec.containers[0]";
const VOLUMES: &str = "spec.template.spec.volumes";

/// Kinds carrying a pod template at `spec.template`
const WORKLOAD_KINDS: &[&str] = &["Deployment", "StatefulSet", "DaemonSet", "ReplicaSet", "Job"];

type PatchGenerateFn = fn(&Manifest, &MultiClusterObservability) -> anyhow::Result<Option<Value>>;

/// Applies image, pull secret and node selector overrides of `mco` to a workload.
/// Other kinds are left untouched.
pub fn apply_global_patches(res: &mut Manifest, mco: &MultiClusterObservability) -> anyhow::Result<()> {
    if !WORKLOAD_KINDS.contains(&res.kind()) {
        return Ok(());
    }
    let generators: [PatchGenerateFn; 3] = [
        generate_image_patch,
        generate_image_pull_secrets_patch,
        generate_node_selector_patch,
    ];
    for generate in generators {
        if let Some(patch) = generate(res, mco)? {
            tracing::trace!(kind = res.kind(), name = ?res.name(), patch = %patch, "patching");
            res.patch(&patch);
        }
    }
    Ok(())
}

fn pod_spec_patch(pod_spec: Value) -> Value {
    json!({ "spec": { "template": { "spec": pod_spec } } })
}

/// Patch with the whole container list, where the first container is modified by `update`.
fn first_container_patch(
    res: &Manifest,
    update: impl FnOnce(&mut Map<String, Value>),
) -> anyhow::Result<Value> {
    let mut containers = res.get_slice(CONTAINERS)?.to_vec();
    let first = containers
        .first_mut()
        .and_then(Value::as_object_mut)
        .with_context(|| format!("{} {:?} has no containers", res.kind(), res.name()))?;
    update(first);
    Ok(pod_spec_patch(json!({ "containers": containers })))
}

/// Prefixes the first container's image with the repository from the CR annotations.
pub fn generate_image_patch(
    res: &Manifest,
    mco: &MultiClusterObservability,
) -> anyhow::Result<Option<Value>> {
    let repo = match config::image_repository(mco) {
        Some(repo) => repo,
        None => return Ok(None),
    };
    let image = res.get_string(&format!("{}.image", FIRST_CONTAINER))?;
    let suffix = config::image_tag_suffix(mco)
        .map(|s| format!("-{}", s))
        .unwrap_or_default();
    let generated = format!("{}/{}{}", repo, image, suffix);
    let pull_policy = mco.spec.image_pull_policy.clone();

    let patch = first_container_patch(res, |container| {
        container.insert("image".to_string(), Value::String(generated));
        if let Some(policy) = pull_policy {
            container.insert("imagePullPolicy".to_string(), Value::String(policy));
        }
    })?;
    Ok(Some(patch))
}

pub fn generate_image_pull_secrets_patch(
    _res: &Manifest,
    mco: &MultiClusterObservability,
) -> anyhow::Result<Option<Value>> {
    Ok(mco
        .spec
        .image_pull_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|secret| pod_spec_patch(json!({ "imagePullSecrets": [{ "name": secret }] }))))
}

pub fn generate_node_selector_patch(
    _res: &Manifest,
    mco: &MultiClusterObservability,
) -> anyhow::Result<Option<Value>> {
    let selector = match &mco.spec.node_selector {
        Some(options) => options.selector_map(),
        None => return Ok(None),
    };
    if selector.is_empty() {
        return Ok(None);
    }
    Ok(Some(pod_spec_patch(json!({ "nodeSelector": selector }))))
}

pub fn generate_replicas_patch(replicas: i32) -> Value {
    json!({ "spec": { "replicas": replicas } })
}

/// Leading argument not starting with `--` is the command.
fn split_args(args: &[String]) -> (Option<&str>, &[String]) {
    match args.split_first() {
        Some((cmd, rest)) if !cmd.starts_with("--") => (Some(cmd.as_str()), rest),
        _ => (None, args),
    }
}

/// `--flag=value` becomes `--flag -> value`, a bare `--flag` maps to an empty value.
fn to_args_map(args: &[String]) -> BTreeMap<String, String> {
    args.iter()
        .map(|arg| match arg.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (arg.clone(), String::new()),
        })
        .collect()
}

/// Sets `--<key>=<value>` flags on the first container.
pub fn generate_container_args_patch(
    res: &Manifest,
    new_args: &BTreeMap<String, String>,
) -> anyhow::Result<Value> {
    let path = format!("{}.args", FIRST_CONTAINER);
    let original = match res.find(&path) {
        Some(_) => res.get_string_slice(&path)?,
        None => Vec::new(),
    };
    let (cmd, original) = split_args(&original);

    let mut args_map = to_args_map(original);
    for (key, value) in new_args {
        args_map.insert(format!("--{}", key), value.clone());
    }

    let mut args = args_map
        .into_iter()
        .map(|(k, v)| if v.is_empty() { k } else { format!("{}={}", k, v) })
        .collect::<Vec<_>>();
    args.sort();
    if let Some(cmd) = cmd {
        args.insert(0, cmd.to_string());
    }

    first_container_patch(res, |container| {
        container.insert("args".to_string(), json!(args));
    })
}

fn named_objects(objs: &[Value]) -> BTreeMap<String, Value> {
    objs.iter()
        .filter_map(|obj| {
            let name = obj.as_object()?.get("name")?.as_str()?;
            Some((name.to_string(), obj.clone()))
        })
        .collect()
}

/// Merges `new` into `original` by name, newer entries winning. Sorted by name.
fn merge_named<T: Serialize>(
    original: &[Value],
    new: &[T],
    name: impl Fn(&T) -> &str,
) -> anyhow::Result<Vec<Value>> {
    let mut merged = named_objects(original);
    for item in new {
        let value = serde_json::to_value(item).context("failed to serialize override")?;
        merged.insert(name(item).to_string(), value);
    }
    Ok(merged.into_values().collect())
}

fn slice_or_empty<'a>(res: &'a Manifest, path: &str) -> anyhow::Result<&'a [Value]> {
    match res.find(path) {
        Some(_) => res.get_slice(path),
        None => Ok(&[]),
    }
}

pub fn generate_env_vars_patch(res: &Manifest, new_envs: &[EnvVar]) -> anyhow::Result<Value> {
    let original = slice_or_empty(res, &format!("{}.env", FIRST_CONTAINER))?;
    let envs = merge_named(original, new_envs, |e| e.name.as_str())?;
    first_container_patch(res, |container| {
        container.insert("env".to_string(), Value::Array(envs));
    })
}

pub fn generate_volumes_patch(res: &Manifest, new_volumes: &[Volume]) -> anyhow::Result<Value> {
    let original = slice_or_empty(res, VOLUMES)?;
    let volumes = merge_named(original, new_volumes, |v| v.name.as_str())?;
    Ok(pod_spec_patch(json!({ "volumes": volumes })))
}

pub fn generate_volume_mount_patch(
    res: &Manifest,
    new_volume_mounts: &[VolumeMount],
) -> anyhow::Result<Value> {
    let original = slice_or_empty(res, &format!("{}.volumeMounts", FIRST_CONTAINER))?;
    let mounts = merge_named(original, new_volume_mounts, |m| m.name.as_str())?;
    first_container_patch(res, |container| {
        container.insert("volumeMounts".to_string(), Value::Array(mounts));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::{MultiClusterObservabilitySpec, NodeSelectorOptions};
    use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, SecretVolumeSource};

    fn deployment() -> Manifest {
        Manifest::new(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "observatorium-api" },
            "spec": {
                "replicas": 1,
                "template": { "spec": {
                    "containers": [
                        {
                            "name": "api",
                            "image": "observatorium",
                            "args": ["/bin/api", "--web.listen=0.0.0.0:8080", "--debug", "--log.level=info"],
                            "env": [
                                { "name": "B", "value": "b" },
                                { "name": "A", "value": "a" }
                            ],
                            "volumeMounts": [{ "name": "tls", "mountPath": "/etc/tls" }]
                        },
                        { "name": "sidecar", "image": "proxy" }
                    ],
                    "volumes": [{ "name": "tls", "secret": { "secretName": "tls" } }]
                }}
            }
        }))
        .unwrap()
    }

    fn mco() -> MultiClusterObservability {
        MultiClusterObservability::new("observability", MultiClusterObservabilitySpec::default())
    }

    fn patched(patch: &Value) -> Manifest {
        let mut res = deployment();
        res.patch(patch);
        res
    }

    #[test]
    fn node_selector() {
        let mut mco = mco();
        assert!(generate_node_selector_patch(&deployment(), &mco).unwrap().is_none());

        mco.spec.node_selector = Some(NodeSelectorOptions {
            os: "linux".to_string(),
            custom_label_selector: "node-role".to_string(),
            custom_label_value: "infra".to_string(),
        });
        let patch = generate_node_selector_patch(&deployment(), &mco).unwrap().unwrap();
        assert_eq!(
            patch,
            json!({ "spec": { "template": { "spec": { "nodeSelector": {
                "beta.kubernetes.io/os": "linux",
                "node-role": "infra"
            }}}}})
        );
    }

    #[test]
    fn image_keeps_sibling_containers() {
        let mut mco = mco();
        assert!(generate_image_patch(&deployment(), &mco).unwrap().is_none());

        let annotations = mco.metadata.annotations.get_or_insert_with(Default::default);
        annotations.insert(config::ANNOTATION_KEY_IMAGE_REPOSITORY.to_string(), "quay.io/acm-d".to_string());
        annotations.insert(config::ANNOTATION_KEY_IMAGE_TAG_SUFFIX.to_string(), "abc".to_string());
        mco.spec.image_pull_policy = Some("Always".to_string());

        let res = patched(&generate_image_patch(&deployment(), &mco).unwrap().unwrap());
        assert_eq!(
            res.get_string("spec.template.spec.containers[0].image").unwrap(),
            "quay.io/acm-d/observatorium-abc"
        );
        assert_eq!(
            res.get_string("spec.template.spec.containers[0].imagePullPolicy").unwrap(),
            "Always"
        );
        assert_eq!(res.get_string("spec.template.spec.containers[1].image").unwrap(), "proxy");
    }

    #[test]
    fn global_patches_skip_non_workloads() {
        let mut mco = mco();
        mco.spec.image_pull_secret = Some("pull-secret".to_string());

        let mut service = Manifest::new(json!({ "kind": "Service", "metadata": { "name": "api" } })).unwrap();
        let before = service.clone();
        apply_global_patches(&mut service, &mco).unwrap();
        assert_eq!(service, before);

        let mut res = deployment();
        apply_global_patches(&mut res, &mco).unwrap();
        assert_eq!(
            res.get_field("spec.template.spec.imagePullSecrets").unwrap(),
            &json!([{ "name": "pull-secret" }])
        );
        assert_eq!(res.get_field("spec.replicas").unwrap(), &json!(1));
    }

    #[test]
    fn replicas() {
        let res = patched(&generate_replicas_patch(3));
        assert_eq!(res.get_field("spec.replicas").unwrap(), &json!(3));
    }

    #[test]
    fn container_args_are_merged_and_sorted() {
        let mut new_args = BTreeMap::new();
        new_args.insert("log.level".to_string(), "debug".to_string());
        new_args.insert("a-flag".to_string(), "1".to_string());

        let res = patched(&generate_container_args_patch(&deployment(), &new_args).unwrap());
        assert_eq!(
            res.get_string_slice("spec.template.spec.containers[0].args").unwrap(),
            vec![
                "/bin/api",
                "--a-flag=1",
                "--debug",
                "--log.level=debug",
                "--web.listen=0.0.0.0:8080",
            ]
        );
    }

    #[test]
    fn container_args_without_command() {
        let mut res = deployment();
        res.patch(&first_container_patch(&deployment(), |c| {
            c.remove("args");
        })
        .unwrap());
        let mut new_args = BTreeMap::new();
        new_args.insert("debug".to_string(), String::new());
        let res = patched(&generate_container_args_patch(&res, &new_args).unwrap());
        assert_eq!(
            res.get_string_slice("spec.template.spec.containers[0].args").unwrap(),
            vec!["--debug"]
        );
    }

    #[test]
    fn env_vars_merged_by_name() {
        let new_envs = vec![
            EnvVar {
                name: "B".to_string(),
                value: Some("override".to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "C".to_string(),
                value: Some("c".to_string()),
                ..Default::default()
            },
        ];
        let res = patched(&generate_env_vars_patch(&deployment(), &new_envs).unwrap());
        assert_eq!(
            res.get_field("spec.template.spec.containers[0].env").unwrap(),
            &json!([
                { "name": "A", "value": "a" },
                { "name": "B", "value": "override" },
                { "name": "C", "value": "c" }
            ])
        );
    }

    #[test]
    fn volumes_and_mounts() {
        let volumes = vec![
            Volume {
                name: "cache".to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
            Volume {
                name: "tls".to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some("ca-bundle".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];
        let res = patched(&generate_volumes_patch(&deployment(), &volumes).unwrap());
        let names = res
            .get_slice("spec.template.spec.volumes")
            .unwrap()
            .iter()
            .map(|v| v["name"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["cache", "tls"]);
        assert_eq!(
            res.get_string("spec.template.spec.volumes[1].secret.secretName").unwrap(),
            "ca-bundle"
        );

        let mounts = vec![VolumeMount {
            name: "cache".to_string(),
            mount_path: "/var/cache".to_string(),
            ..Default::default()
        }];
        let res = patched(&generate_volume_mount_patch(&deployment(), &mounts).unwrap());
        assert_eq!(
            res.get_field("spec.template.spec.containers[0].volumeMounts").unwrap(),
            &json!([
                { "name": "cache", "mountPath": "/var/cache" },
                { "name": "tls", "mountPath": "/etc/tls" }
            ])
        );
    }

    #[test]
    fn missing_containers_is_an_error() {
        let res = Manifest::new(json!({ "kind": "Deployment", "spec": {} })).unwrap();
        assert!(generate_env_vars_patch(&res, &[]).is_err());
    }
}
