// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Ownership consistency checks between a child and its claimed controller.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, MismatchCheck, Result};
use crate::podspec::locate_pod_spec;
use crate::record::Record;

/// Kinds accepted as the controller side of a relationship
const CONTROLLER_KINDS: &[&str] = &[
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "ReplicaSet",
    "CronJob",
    "Job",
];

/// Check that `controller` is really the controller of `child`.
///
/// The first owner reference of the child is compared against the
/// controller's identity, then the containers of both pod specs are compared
/// by `name/image/tag` key and `securityContext`. The first failing check is
/// returned.
pub fn validate_ownership(child: &Record, controller: &Record) -> Result<()> {
    let owners = child.owner_references()?;
    let Some(owner) = owners.first() else {
        return Err(Error::mismatch(
            MismatchCheck::OwnerUid,
            format!("{} has no owner references", child.key()),
        ));
    };

    if owner.uid.as_deref() != controller.uid() {
        return Err(Error::mismatch(
            MismatchCheck::OwnerUid,
            format!(
                "owner uid {} does not match controller uid {}",
                owner.uid.as_deref().unwrap_or("<none>"),
                controller.uid().unwrap_or("<none>")
            ),
        ));
    }
    if child.namespace() != controller.namespace() {
        return Err(Error::mismatch(
            MismatchCheck::Namespace,
            format!(
                "child namespace {} does not match controller namespace {}",
                child.namespace(),
                controller.namespace()
            ),
        ));
    }
    if owner.name != controller.name() {
        return Err(Error::mismatch(
            MismatchCheck::Name,
            format!(
                "owner name {} does not match controller name {}",
                owner.name,
                controller.name()
            ),
        ));
    }
    if !CONTROLLER_KINDS.contains(&controller.kind()) {
        return Err(Error::mismatch(
            MismatchCheck::Kind,
            format!("{} is not a controller kind", controller.kind()),
        ));
    }

    let child_containers = containers_of(child)?;
    let controller_containers = containers_of(controller)?;

    if child_containers.len() != controller_containers.len() {
        return Err(Error::mismatch(
            MismatchCheck::ContainerCount,
            format!(
                "child has {} containers, controller has {}",
                child_containers.len(),
                controller_containers.len()
            ),
        ));
    }

    let controller_by_key: HashMap<String, Option<&Value>> = controller_containers
        .iter()
        .map(|c| (container_key(c), c.get("securityContext")))
        .collect();

    for container in child_containers {
        let key = container_key(container);
        let Some(expected) = controller_by_key.get(&key) else {
            return Err(Error::mismatch(
                MismatchCheck::ContainerIdentity,
                format!("container {} is not in the controller template", key),
            ));
        };
        if container.get("securityContext") != *expected {
            return Err(Error::mismatch(
                MismatchCheck::SecurityContext,
                format!("securityContext of container {} differs from the controller", key),
            ));
        }
    }

    debug!(child = %child.key(), controller = %controller.key(), "Ownership validated");
    Ok(())
}

fn containers_of(record: &Record) -> Result<&[Value]> {
    match locate_pod_spec(record)? {
        Some(located) => located.containers(),
        None => Err(Error::malformed(
            "containers",
            format!("no pod spec found in {}", record.key()),
        )),
    }
}

/// `name/image/tag`; missing or non-string parts render empty
fn container_key(container: &Value) -> String {
    let part = |field: &str| container.get(field).and_then(Value::as_str).unwrap_or_default();
    format!("{}/{}/{}", part("name"), part("image"), part("tag"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::json;

    fn app() -> Value {
        json!([{"name": "app", "image": "nginx:1.27"}])
    }

    fn pair() -> (Record, Record) {
        let rs = testing::replicaset("rs", "test", None);
        let pod = testing::pod("poddy", "test", "Running", Some(("apps/v1", "ReplicaSet", "rs")), app());
        (pod, rs)
    }

    fn failed_check(result: Result<()>) -> MismatchCheck {
        match result {
            Err(Error::OwnershipMismatch { check, .. }) => check,
            other => panic!("expected OwnershipMismatch, got {:?}", other),
        }
    }

    fn with(record: &Record, pointer: &str, value: Value) -> Record {
        let mut raw = record.clone().into_value();
        *raw.pointer_mut(pointer).unwrap() = value;
        Record::try_from(raw).unwrap()
    }

    #[test]
    fn test_matching_pair() {
        let (pod, rs) = pair();
        validate_ownership(&pod, &rs).unwrap();
    }

    #[test]
    fn test_uid_mismatch_with_matching_names() {
        let (pod, rs) = pair();
        let rs = with(&rs, "/metadata/uid", json!("some-other-uid"));
        assert_eq!(failed_check(validate_ownership(&pod, &rs)), MismatchCheck::OwnerUid);
    }

    #[test]
    fn test_child_without_owners() {
        let (_, rs) = pair();
        let bare = testing::pod("bare", "test", "Running", None, app());
        assert_eq!(failed_check(validate_ownership(&bare, &rs)), MismatchCheck::OwnerUid);
    }

    #[test]
    fn test_namespace_mismatch() {
        let (pod, rs) = pair();
        let pod = with(&pod, "/metadata/namespace", json!("prod"));
        assert_eq!(failed_check(validate_ownership(&pod, &rs)), MismatchCheck::Namespace);
    }

    #[test]
    fn test_name_mismatch() {
        let (pod, rs) = pair();
        let pod = with(&pod, "/metadata/ownerReferences/0/name", json!("rs-old"));
        assert_eq!(failed_check(validate_ownership(&pod, &rs)), MismatchCheck::Name);
    }

    #[test]
    fn test_non_controller_kind() {
        let (pod, rs) = pair();
        let rs = with(&rs, "/kind", json!("ReplicationController"));
        assert_eq!(failed_check(validate_ownership(&pod, &rs)), MismatchCheck::Kind);
    }

    #[test]
    fn test_container_count_mismatch() {
        let (pod, rs) = pair();
        let pod = with(
            &pod,
            "/spec/containers",
            json!([{"name": "app", "image": "nginx:1.27"}, {"name": "sidecar", "image": "envoy"}]),
        );
        assert_eq!(failed_check(validate_ownership(&pod, &rs)), MismatchCheck::ContainerCount);
    }

    #[test]
    fn test_container_identity_mismatch() {
        let (pod, rs) = pair();
        let pod = with(&pod, "/spec/containers/0/image", json!("nginx:1.28"));
        assert_eq!(failed_check(validate_ownership(&pod, &rs)), MismatchCheck::ContainerIdentity);
    }

    #[test]
    fn test_security_context_mismatch() {
        let (pod, rs) = pair();
        let pod = with(&pod, "/spec/containers/0", json!({
            "name": "app",
            "image": "nginx:1.27",
            "securityContext": {"runAsNonRoot": true}
        }));
        assert_eq!(failed_check(validate_ownership(&pod, &rs)), MismatchCheck::SecurityContext);

        let rs = with(&rs, "/spec/template/spec/containers/0", json!({
            "name": "app",
            "image": "nginx:1.27",
            "securityContext": {"runAsNonRoot": true}
        }));
        validate_ownership(&pod, &rs).unwrap();
    }

    #[test]
    fn test_cronjob_controller() {
        let cj = testing::cronjob("backup", "test", app());
        let pod = testing::pod("backup-1", "test", "Succeeded", Some(("batch/v1", "CronJob", "backup")), app());
        validate_ownership(&pod, &cj).unwrap();
    }

    #[test]
    fn test_non_array_containers_is_malformed() {
        let (pod, rs) = pair();
        let pod = with(&pod, "/spec/containers", json!("app"));
        assert!(matches!(
            validate_ownership(&pod, &rs),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_container_key() {
        assert_eq!(container_key(&json!({"name": "a", "image": "b", "tag": "c"})), "a/b/c");
        assert_eq!(container_key(&json!({"name": "a"})), "a//");
    }
}
