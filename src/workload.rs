// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Workload aggregation.
//!
//! Groups every pod in scope under its top controller and counts them.
//! Controllers of the known top-level kinds are listed up front, so a
//! Deployment scaled to zero still shows up with a pod count of zero.

use std::collections::{BTreeMap, HashMap};

use futures::future::try_join_all;
use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::podspec::{PodTemplate, extract_pod_template};
use crate::record::{ObjectKey, Record};
use crate::resolver::{FetchScope, NODE_KIND, ObjectCache, OwnerPolicy, OwnerResolver};
use crate::store::ObjectStore;

/// Pod phase counted as running
const RUNNING_PHASE: &str = "Running";

/// A kind identified by apiVersion and kind name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindRef {
    pub api_version: String,
    pub kind: String,
}

impl KindRef {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }
}

/// Kinds listed before pods are resolved
pub fn default_top_level_kinds() -> Vec<KindRef> {
    vec![
        KindRef::new("apps/v1", "Deployment"),
        KindRef::new("apps/v1", "ReplicaSet"),
        KindRef::new("batch/v1", "CronJob"),
        KindRef::new("batch/v1", "Job"),
        KindRef::new("apps/v1", "DaemonSet"),
        KindRef::new("apps/v1", "StatefulSet"),
    ]
}

/// A top controller and the pods it currently owns
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    pub top_controller: Record,
    pub pod_count: usize,
    pub running_pod_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pods: Vec<Record>,
    pub pod_spec: Option<PodSpec>,
    pub pod_template_metadata: Option<ObjectMeta>,
}

impl Workload {
    fn new(top_controller: Record, template: Option<PodTemplate>) -> Self {
        let (pod_spec, pod_template_metadata) = match template {
            Some(t) => (Some(t.spec), t.metadata),
            None => (None, None),
        };
        Self {
            top_controller,
            pod_count: 0,
            running_pod_count: 0,
            pods: Vec::new(),
            pod_spec,
            pod_template_metadata,
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.top_controller.key()
    }
}

/// Builds workload summaries for a namespace or the whole cluster
pub struct WorkloadAggregator<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    top_level_kinds: Vec<KindRef>,
    policy: OwnerPolicy,
}

impl<'s, S: ObjectStore + ?Sized> WorkloadAggregator<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            top_level_kinds: default_top_level_kinds(),
            policy: OwnerPolicy::default(),
        }
    }

    pub fn with_top_level_kinds(mut self, kinds: Vec<KindRef>) -> Self {
        self.top_level_kinds = kinds;
        self
    }

    pub fn with_policy(mut self, policy: OwnerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Summarize every workload in `namespace` (all namespaces if `None`).
    ///
    /// Pods whose owner chain cannot be resolved are logged and skipped; a
    /// failure listing one of the top-level kinds fails the whole call.
    pub async fn aggregate(&self, namespace: Option<&str>, include_pods: bool) -> Result<Vec<Workload>> {
        let mut cache = ObjectCache::new();
        let mut workloads: BTreeMap<ObjectKey, Workload> = self
            .seed(namespace, &mut cache)
            .await?
            .into_iter()
            .map(|controller| {
                let template = template_or_warn(&controller);
                (controller.key(), Workload::new(controller, template))
            })
            .collect();

        let pods = self.store.list_pods(namespace).await?;
        let resolver = self.resolver(namespace);
        let mut skipped = 0usize;

        for pod in pods {
            let controller = match resolver.resolve(&pod, &mut cache).await {
                Ok(resolution) => resolution.controller,
                Err(e) => {
                    log_skipped(&pod, &e);
                    skipped += 1;
                    continue;
                }
            };

            let workload = workloads.entry(controller.key()).or_insert_with(|| {
                let template = template_or_warn(&controller).or_else(|| template_or_warn(&pod));
                Workload::new(controller, template)
            });

            workload.pod_count += 1;
            if pod.phase() == Some(RUNNING_PHASE) {
                workload.running_pod_count += 1;
            }
            if include_pods {
                workload.pods.push(pod);
            }
        }

        info!(
            namespace = ?namespace,
            workloads = workloads.len(),
            skipped_pods = skipped,
            list_calls = cache.list_calls(),
            "Aggregated workloads"
        );

        Ok(workloads.into_values().collect())
    }

    /// Distinct top controllers in scope, without pod statistics.
    ///
    /// Pods sharing one direct owner are collapsed to a single representative
    /// before resolution, so a ReplicaSet with fifty replicas is walked once.
    pub async fn summarize_top_controllers(&self, namespace: Option<&str>) -> Result<Vec<Record>> {
        let mut cache = ObjectCache::new();
        let mut controllers: BTreeMap<ObjectKey, Record> = self
            .seed(namespace, &mut cache)
            .await?
            .into_iter()
            .map(|controller| (controller.key(), controller))
            .collect();

        let pods = self.store.list_pods(namespace).await?;
        let total = pods.len();
        let representatives = self.dedupe_pods(pods);
        debug!(pods = total, representatives = representatives.len(), "Deduplicated pods");

        let resolver = self.resolver(namespace);
        for pod in representatives {
            match resolver.resolve(&pod, &mut cache).await {
                Ok(resolution) => {
                    controllers
                        .entry(resolution.controller.key())
                        .or_insert(resolution.controller);
                }
                Err(e) => log_skipped(&pod, &e),
            }
        }

        Ok(controllers.into_values().collect())
    }

    fn resolver(&self, namespace: Option<&str>) -> OwnerResolver<'s, S> {
        let scope = match namespace {
            Some(_) => FetchScope::Namespaced,
            None => FetchScope::ClusterWide,
        };
        OwnerResolver::new(self.store)
            .with_scope(scope)
            .with_policy(self.policy)
    }

    /// List the top-level kinds concurrently, cache everything, and return
    /// the objects that have no owner themselves
    async fn seed(&self, namespace: Option<&str>, cache: &mut ObjectCache) -> Result<Vec<Record>> {
        let listings = try_join_all(self.top_level_kinds.iter().map(|kind| async move {
            let records = self
                .store
                .list_by_kind(&kind.api_version, &kind.kind, namespace)
                .await?;
            Ok::<_, Error>((kind, records))
        }))
        .await?;

        let mut top_level = Vec::new();
        for (kind, records) in listings {
            top_level.extend(
                records
                    .iter()
                    .filter(|r| !r.has_owner_references())
                    .cloned(),
            );
            debug!(kind = %kind.kind, namespace = ?namespace, objects = records.len(), "Seeded kind");
            cache.insert_listed(&kind.kind, namespace, records);
        }
        Ok(top_level)
    }

    /// Keep pods without owners and static pods; collapse the rest by
    /// (namespace, owner kind, owner name)
    fn dedupe_pods(&self, pods: Vec<Record>) -> Vec<Record> {
        let mut deduped = Vec::new();
        let mut by_owner: HashMap<(String, String, String), Record> = HashMap::new();

        for pod in pods {
            let owner = pod
                .owner_references()
                .ok()
                .and_then(|owners| self.policy.select(&owners).map(|(o, _)| (o.kind.clone(), o.name.clone())));
            match owner {
                Some((kind, name)) if kind != NODE_KIND => {
                    by_owner.insert((pod.namespace().to_string(), kind, name), pod);
                }
                _ => deduped.push(pod),
            }
        }

        deduped.extend(by_owner.into_values());
        deduped
    }
}

fn template_or_warn(record: &Record) -> Option<PodTemplate> {
    match extract_pod_template(record) {
        Ok(template) => template,
        Err(e) => {
            warn!(object = %record.key(), error = %e, "Could not extract pod template");
            None
        }
    }
}

fn log_skipped(pod: &Record, e: &Error) {
    if e.is_per_item() {
        warn!(pod = %pod.name(), namespace = %pod.namespace(), error = %e, "Could not resolve top controller for pod");
    } else {
        error!(pod = %pod.name(), namespace = %pod.namespace(), error = %e, "Could not resolve top controller for pod");
    }
}
