// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Kind to resource mapping.
//!
//! Owner references name a kind and an apiVersion; listing needs the plural
//! resource and its scope. Built-in workload kinds are known up front from
//! k8s-openapi type information, anything else (CRD owners such as Argo
//! Rollouts) is resolved through the discovery API on first use.

use kube::Client;
use kube::core::GroupVersionKind;
use kube::discovery::{ApiResource, Scope};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Error, Result};

/// Information about a listable Kubernetes resource
#[derive(Debug, Clone)]
pub struct ResourceInfo {
    pub api_resource: ApiResource,
    pub scope: Scope,
}

impl ResourceInfo {
    pub fn is_namespaced(&self) -> bool {
        self.scope == Scope::Namespaced
    }

    /// Plural resource name, qualified by group (e.g. "replicasets.apps")
    pub fn resource_name(&self) -> String {
        if self.api_resource.group.is_empty() {
            self.api_resource.plural.clone()
        } else {
            format!("{}.{}", self.api_resource.plural, self.api_resource.group)
        }
    }
}

/// Registry of known resources, indexed by (apiVersion, kind)
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    by_gvk: HashMap<(String, String), ResourceInfo>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, info: ResourceInfo) {
        let key = (
            info.api_resource.api_version.clone(),
            info.api_resource.kind.clone(),
        );
        self.by_gvk.insert(key, info);
    }

    pub fn get(&self, api_version: &str, kind: &str) -> Option<&ResourceInfo> {
        self.by_gvk
            .get(&(api_version.to_string(), kind.to_string()))
    }

    /// Whether any version of `kind` is registered
    pub fn contains_kind(&self, kind: &str) -> bool {
        self.by_gvk.keys().any(|(_, k)| k == kind)
    }

    /// apiVersion a registered kind is served under, if exactly one is known
    pub fn api_version_of(&self, kind: &str) -> Option<&str> {
        let mut versions = self.by_gvk.keys().filter(|(_, k)| k == kind);
        match (versions.next(), versions.next()) {
            (Some((api_version, _)), None) => Some(api_version),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.by_gvk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_gvk.is_empty()
    }
}

/// Split an apiVersion into (group, version); the core group is empty
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Build a registry of the kinds owner chains usually pass through, using
/// compile-time type info from k8s-openapi (no discovery round-trips)
pub fn build_core_registry() -> ResourceRegistry {
    use k8s_openapi::api::{
        apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
        batch::v1::{CronJob, Job},
        core::v1::{ConfigMap, Node, Pod, ReplicationController, Secret, Service},
    };
    use kube::Resource;

    let mut registry = ResourceRegistry::new();

    macro_rules! add_resource {
        ($type:ty, namespaced) => {
            add_resource!(@inner $type, Scope::Namespaced)
        };
        ($type:ty, cluster) => {
            add_resource!(@inner $type, Scope::Cluster)
        };
        (@inner $type:ty, $scope:expr) => {{
            let ar = ApiResource {
                group: <$type>::group(&()).to_string(),
                version: <$type>::version(&()).to_string(),
                api_version: <$type>::api_version(&()).to_string(),
                kind: <$type>::kind(&()).to_string(),
                plural: <$type>::plural(&()).to_string(),
            };
            registry.add(ResourceInfo {
                api_resource: ar,
                scope: $scope,
            });
        }};
    }

    // Core API (v1)
    add_resource!(Pod, namespaced);
    add_resource!(ReplicationController, namespaced);
    add_resource!(Service, namespaced);
    add_resource!(ConfigMap, namespaced);
    add_resource!(Secret, namespaced);
    add_resource!(Node, cluster);

    // Apps API (apps/v1)
    add_resource!(Deployment, namespaced);
    add_resource!(StatefulSet, namespaced);
    add_resource!(DaemonSet, namespaced);
    add_resource!(ReplicaSet, namespaced);

    // Batch API (batch/v1)
    add_resource!(Job, namespaced);
    add_resource!(CronJob, namespaced);

    registry
}

/// Resolve a kind the core registry does not know through the discovery API
pub async fn discover_kind(client: &Client, api_version: &str, kind: &str) -> Result<ResourceInfo> {
    let (group, version) = split_api_version(api_version);
    let gvk = GroupVersionKind::gvk(group, version, kind);

    let (api_resource, capabilities) = kube::discovery::pinned_kind(client, &gvk)
        .await
        .map_err(|e| {
            debug!(api_version = %api_version, kind = %kind, error = %e, "Discovery failed");
            discovery_error(api_version, kind, e)
        })?;

    debug!(
        api_version = %api_version,
        kind = %kind,
        plural = %api_resource.plural,
        "Discovered resource"
    );

    Ok(ResourceInfo {
        api_resource,
        scope: capabilities.scope,
    })
}

/// An unknown group/version (404) or a kind missing from it is a mapping
/// failure; anything else is a failed discovery call
fn discovery_error(api_version: &str, kind: &str, err: kube::Error) -> Error {
    match err {
        kube::Error::Discovery(_) => Error::mapping_not_found(api_version, kind),
        kube::Error::Api(ref response) if response.code == 404 => {
            Error::mapping_not_found(api_version, kind)
        }
        other => Error::discovery(api_version, kind, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_registry_workload_kinds() {
        let registry = build_core_registry();

        let rs = registry.get("apps/v1", "ReplicaSet").unwrap();
        assert_eq!(rs.api_resource.plural, "replicasets");
        assert!(rs.is_namespaced());
        assert_eq!(rs.resource_name(), "replicasets.apps");

        let cj = registry.get("batch/v1", "CronJob").unwrap();
        assert_eq!(cj.api_resource.plural, "cronjobs");

        let pod = registry.get("v1", "Pod").unwrap();
        assert_eq!(pod.resource_name(), "pods");
    }

    #[test]
    fn test_node_is_cluster_scoped() {
        let registry = build_core_registry();
        let node = registry.get("v1", "Node").unwrap();
        assert!(!node.is_namespaced());
    }

    #[test]
    fn test_lookup_requires_matching_version() {
        let registry = build_core_registry();
        assert!(registry.get("extensions/v1beta1", "ReplicaSet").is_none());
        assert!(registry.contains_kind("ReplicaSet"));
        assert!(!registry.contains_kind("ReplicaNotASet"));
    }

    #[test]
    fn test_api_version_of_kind() {
        let registry = build_core_registry();
        assert_eq!(registry.api_version_of("ReplicaSet"), Some("apps/v1"));
        assert_eq!(registry.api_version_of("CronJob"), Some("batch/v1"));
        assert_eq!(registry.api_version_of("Pod"), Some("v1"));
        assert_eq!(registry.api_version_of("Rollout"), None);
    }

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".into(),
            message: "boom".into(),
            reason: "Test".into(),
            code,
        })
    }

    #[test]
    fn test_discovery_error_classification() {
        let missing = discovery_error("argoproj.io/v1alpha1", "Rollout", api_error(404));
        assert!(matches!(missing, Error::MappingNotFound { .. }));

        for code in [401, 403, 500, 503] {
            match discovery_error("argoproj.io/v1alpha1", "Rollout", api_error(code)) {
                Error::Discovery { kind, source, .. } => {
                    assert_eq!(kind, "Rollout");
                    assert!(matches!(*source, kube::Error::Api(ref r) if r.code == code));
                }
                other => panic!("expected Discovery for {}, got {:?}", code, other),
            }
        }
    }

    #[test]
    fn test_split_api_version() {
        assert_eq!(split_api_version("apps/v1"), ("apps", "v1"));
        assert_eq!(split_api_version("v1"), ("", "v1"));
        assert_eq!(
            split_api_version("argoproj.io/v1alpha1"),
            ("argoproj.io", "v1alpha1")
        );
    }

    #[test]
    fn test_registry_add_replaces_same_gvk() {
        let mut registry = ResourceRegistry::new();
        assert!(registry.is_empty());
        let info = ResourceInfo {
            api_resource: ApiResource {
                group: "argoproj.io".into(),
                version: "v1alpha1".into(),
                api_version: "argoproj.io/v1alpha1".into(),
                kind: "Rollout".into(),
                plural: "rollouts".into(),
            },
            scope: Scope::Namespaced,
        };
        registry.add(info.clone());
        registry.add(info);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("argoproj.io/v1alpha1", "Rollout").is_some());
    }
}
