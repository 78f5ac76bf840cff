// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Pod template extraction.
//!
//! Controllers embed their pod template at a kind-dependent path:
//!
//! | Shape         | Kinds                                              | Path                                   |
//! |---------------|----------------------------------------------------|----------------------------------------|
//! | `Pod`         | Pod                                                | `spec`                                 |
//! | `Template`    | Deployment, ReplicaSet, StatefulSet, DaemonSet, Job, ReplicationController | `spec.template.spec` |
//! | `JobTemplate` | CronJob                                            | `spec.jobTemplate.spec.template.spec`  |
//!
//! Kinds outside this table (CRDs wrapping a pod template) fall back to a
//! generic descent through `jobTemplate`, `spec` and `template`.

use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::record::{Record, json_type_name};

/// Field names descended through by the generic search, in priority order
const NESTING_FIELDS: &[&str] = &["jobTemplate", "spec", "template"];

/// Where a kind keeps its pod spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PodTemplateShape {
    Pod,
    Template,
    JobTemplate,
}

impl PodTemplateShape {
    pub fn for_kind(kind: &str) -> Option<Self> {
        match kind {
            "Pod" => Some(Self::Pod),
            "Deployment" | "ReplicaSet" | "StatefulSet" | "DaemonSet" | "Job"
            | "ReplicationController" => Some(Self::Template),
            "CronJob" => Some(Self::JobTemplate),
            _ => None,
        }
    }

    pub fn path(self) -> &'static [&'static str] {
        match self {
            Self::Pod => &["spec"],
            Self::Template => &["spec", "template", "spec"],
            Self::JobTemplate => &["spec", "jobTemplate", "spec", "template", "spec"],
        }
    }

    fn from_path(path: &[&str]) -> Option<Self> {
        [Self::Pod, Self::Template, Self::JobTemplate]
            .into_iter()
            .find(|shape| shape.path() == path)
    }
}

/// Borrowed view of a located pod spec
#[derive(Debug, Clone, Copy)]
pub struct LocatedPodSpec<'a> {
    pub spec: &'a Map<String, Value>,
    /// `metadata` of the mapping that holds the pod spec
    pub metadata: Option<&'a Value>,
    pub shape: Option<PodTemplateShape>,
}

impl<'a> LocatedPodSpec<'a> {
    /// The `containers` list; a non-list value is malformed
    pub fn containers(&self) -> Result<&'a [Value]> {
        match self.spec.get("containers") {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(Error::malformed(
                "containers",
                format!("expected a list, got {}", json_type_name(other)),
            )),
            None => Ok(&[]),
        }
    }
}

/// Extracted pod template: its metadata and the typed pod spec
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodTemplate {
    pub metadata: Option<ObjectMeta>,
    pub spec: PodSpec,
    pub shape: Option<PodTemplateShape>,
}

/// Find the pod template inside a controller or pod record.
///
/// Returns `Ok(None)` when the record is not pod-shaped (a Secret, a
/// ConfigMap, a Deployment whose template was stripped).
pub fn extract_pod_template(record: &Record) -> Result<Option<PodTemplate>> {
    let Some(located) = locate_pod_spec(record)? else {
        return Ok(None);
    };

    let spec: PodSpec = serde_json::from_value(Value::Object(located.spec.clone()))
        .map_err(|e| Error::malformed("spec", e))?;
    let metadata = located
        .metadata
        .map(|meta| {
            serde_json::from_value::<ObjectMeta>(meta.clone())
                .map_err(|e| Error::malformed("metadata", e))
        })
        .transpose()?;

    Ok(Some(PodTemplate {
        metadata,
        spec,
        shape: located.shape,
    }))
}

/// Locate the raw pod spec mapping without deserializing it
pub fn locate_pod_spec(record: &Record) -> Result<Option<LocatedPodSpec<'_>>> {
    match PodTemplateShape::for_kind(record.kind()) {
        Some(shape) => follow_shape(record.fields(), shape),
        None => descend(record.fields()),
    }
}

fn follow_shape(root: &Map<String, Value>, shape: PodTemplateShape) -> Result<Option<LocatedPodSpec<'_>>> {
    let mut parent: Option<&Map<String, Value>> = None;
    let mut current = root;
    let mut walked: Vec<&str> = Vec::with_capacity(shape.path().len());

    for &field in shape.path() {
        walked.push(field);
        match current.get(field) {
            None => return Ok(None),
            Some(Value::Object(child)) => {
                parent = Some(current);
                current = child;
            }
            Some(other) => return Err(not_a_mapping(&walked, other)),
        }
    }

    Ok(found(parent, current, Some(shape)))
}

fn descend(root: &Map<String, Value>) -> Result<Option<LocatedPodSpec<'_>>> {
    let mut parent: Option<&Map<String, Value>> = None;
    let mut current = root;
    let mut walked: Vec<&str> = Vec::new();

    while let Some((field, child)) = NESTING_FIELDS
        .iter()
        .find_map(|field| current.get(*field).map(|child| (*field, child)))
    {
        walked.push(field);
        let Value::Object(child) = child else {
            return Err(not_a_mapping(&walked, child));
        };
        parent = Some(current);
        current = child;
    }

    Ok(found(parent, current, PodTemplateShape::from_path(&walked)))
}

fn found<'a>(
    parent: Option<&'a Map<String, Value>>,
    spec: &'a Map<String, Value>,
    shape: Option<PodTemplateShape>,
) -> Option<LocatedPodSpec<'a>> {
    if !spec.contains_key("containers") {
        return None;
    }
    Some(LocatedPodSpec {
        spec,
        metadata: parent.and_then(|p| p.get("metadata")),
        shape,
    })
}

fn not_a_mapping(walked: &[&str], value: &Value) -> Error {
    Error::malformed(
        walked.join("."),
        format!("expected a mapping, got {}", json_type_name(value)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::json;

    fn containers() -> Value {
        json!([{"name": "app", "image": "nginx:1.27"}])
    }

    #[test]
    fn test_deployment_template() {
        let dep = testing::deployment("dep", "test", containers());
        let template = extract_pod_template(&dep).unwrap().unwrap();

        assert_eq!(template.shape, Some(PodTemplateShape::Template));
        assert_eq!(template.spec.containers.len(), 1);
        assert_eq!(template.spec.containers[0].name, "app");
        let labels = template.metadata.unwrap().labels.unwrap();
        assert_eq!(labels.get("app").map(String::as_str), Some("dep"));
    }

    #[test]
    fn test_secret_has_no_template() {
        let secret = Record::try_from(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": "creds", "namespace": "test"},
            "type": "Opaque",
            "data": {"password": "aHVudGVyMg=="}
        }))
        .unwrap();

        assert!(extract_pod_template(&secret).unwrap().is_none());
        assert!(locate_pod_spec(&secret).unwrap().is_none());
    }

    #[test]
    fn test_cronjob_matches_deployment() {
        let dep = testing::deployment("dep", "test", containers());
        let cron = testing::cronjob("nightly", "test", containers());

        let from_dep = extract_pod_template(&dep).unwrap().unwrap();
        let from_cron = extract_pod_template(&cron).unwrap().unwrap();

        assert_eq!(from_cron.shape, Some(PodTemplateShape::JobTemplate));
        assert_eq!(from_dep.spec.containers, from_cron.spec.containers);
    }

    #[test]
    fn test_pod_uses_own_metadata() {
        let pod = testing::pod("poddy", "test", "Running", None, containers());
        let template = extract_pod_template(&pod).unwrap().unwrap();

        assert_eq!(template.shape, Some(PodTemplateShape::Pod));
        assert_eq!(template.metadata.unwrap().name.as_deref(), Some("poddy"));
    }

    #[test]
    fn test_pod_without_containers_is_absent() {
        let pod = Record::try_from(json!({
            "kind": "Pod",
            "metadata": {"name": "p", "namespace": "test"},
            "spec": {}
        }))
        .unwrap();
        assert!(extract_pod_template(&pod).unwrap().is_none());
    }

    #[test]
    fn test_unknown_kind_generic_descent() {
        let rollout = Record::try_from(json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Rollout",
            "metadata": {"name": "ro", "namespace": "test"},
            "spec": {
                "template": {
                    "metadata": {"labels": {"app": "ro"}},
                    "spec": {"containers": containers()}
                }
            }
        }))
        .unwrap();

        let template = extract_pod_template(&rollout).unwrap().unwrap();
        assert_eq!(template.shape, Some(PodTemplateShape::Template));
        assert_eq!(template.spec.containers[0].image.as_deref(), Some("nginx:1.27"));
        assert!(template.metadata.is_some());
    }

    #[test]
    fn test_unknown_kind_without_parent_metadata() {
        let bare = Record::try_from(json!({
            "kind": "PodSpecHolder",
            "containers": containers()
        }))
        .unwrap();

        let template = extract_pod_template(&bare).unwrap().unwrap();
        assert!(template.metadata.is_none());
        assert_eq!(template.shape, None);
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let broken = Record::try_from(json!({
            "kind": "Deployment",
            "metadata": {"name": "d", "namespace": "test"},
            "spec": {"template": "oops"}
        }))
        .unwrap();

        match extract_pod_template(&broken) {
            Err(Error::MalformedRecord { path, .. }) => assert_eq!(path, "spec.template"),
            other => panic!("expected MalformedRecord, got {:?}", other),
        }

        let generic = Record::try_from(json!({"kind": "Thing", "spec": 3})).unwrap();
        assert!(matches!(
            extract_pod_template(&generic),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_containers_accessor() {
        let dep = testing::deployment("dep", "test", containers());
        let located = locate_pod_spec(&dep).unwrap().unwrap();
        assert_eq!(located.containers().unwrap().len(), 1);

        let odd = Record::try_from(json!({
            "kind": "Pod",
            "spec": {"containers": "nginx"}
        }))
        .unwrap();
        let located = locate_pod_spec(&odd).unwrap().unwrap();
        assert!(located.containers().is_err());
    }
}
