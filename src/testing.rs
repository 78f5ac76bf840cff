// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Record builders shared by unit tests.

use serde_json::{Value, json};

use crate::record::Record;

fn record(value: Value) -> Record {
    Record::try_from(value).expect("fixture must be an object")
}

fn owner_refs(owner: Option<(&str, &str, &str)>) -> Value {
    match owner {
        Some((api_version, kind, name)) => json!([{
            "apiVersion": api_version,
            "kind": kind,
            "name": name,
            "uid": format!("uid-{}", name),
        }]),
        None => json!([]),
    }
}

pub fn pod(
    name: &str,
    namespace: &str,
    phase: &str,
    owner: Option<(&str, &str, &str)>,
    containers: Value,
) -> Record {
    record(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": format!("uid-{}", name),
            "ownerReferences": owner_refs(owner),
        },
        "spec": {"containers": containers},
        "status": {"phase": phase},
    }))
}

pub fn replicaset(name: &str, namespace: &str, deployment: Option<&str>) -> Record {
    record(json!({
        "apiVersion": "apps/v1",
        "kind": "ReplicaSet",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": format!("uid-{}", name),
            "ownerReferences": owner_refs(deployment.map(|d| ("apps/v1", "Deployment", d))),
        },
        "spec": {
            "template": {
                "metadata": {"labels": {"app": name}},
                "spec": {"containers": [{"name": "app", "image": "nginx:1.27"}]},
            }
        },
    }))
}

pub fn deployment(name: &str, namespace: &str, containers: Value) -> Record {
    record(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": name, "namespace": namespace, "uid": format!("uid-{}", name)},
        "spec": {
            "template": {
                "metadata": {"labels": {"app": name}},
                "spec": {"containers": containers},
            }
        },
    }))
}

pub fn cronjob(name: &str, namespace: &str, containers: Value) -> Record {
    record(json!({
        "apiVersion": "batch/v1",
        "kind": "CronJob",
        "metadata": {"name": name, "namespace": namespace, "uid": format!("uid-{}", name)},
        "spec": {
            "schedule": "0 3 * * *",
            "jobTemplate": {
                "spec": {
                    "template": {
                        "metadata": {"labels": {"app": name}},
                        "spec": {"containers": containers, "restartPolicy": "OnFailure"},
                    }
                }
            }
        },
    }))
}

/// The dep / rs / poddy chain in `test`, an empty `dep-no-pods`, and a pod in
/// `test2` whose owner kind does not exist.
pub fn cluster() -> Vec<Record> {
    let app = json!([{"name": "app", "image": "nginx:1.27"}]);
    vec![
        deployment("dep", "test", app.clone()),
        deployment("dep-no-pods", "test", app.clone()),
        replicaset("rs", "test", Some("dep")),
        pod("poddy", "test", "Running", Some(("apps/v1", "ReplicaSet", "rs")), app.clone()),
        pod("poddy-bad", "test2", "Running", Some(("core/v1", "ReplicaNotASet", "rs")), app),
    ]
}
