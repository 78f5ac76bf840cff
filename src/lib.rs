// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Top-controller resolution for Kubernetes objects.
//!
//! Walks owner references from pods up to the object that ultimately owns
//! them (usually a Deployment, CronJob, DaemonSet or StatefulSet), groups
//! pods into workloads, extracts embedded pod templates and checks claimed
//! ownership for consistency.

pub mod error;
pub mod kubernetes;
pub mod podspec;
pub mod record;
pub mod resolver;
pub mod store;
pub mod validate;
pub mod workload;

#[cfg(test)]
mod testing;

pub use error::{Error, MismatchCheck, Result};
pub use kubernetes::K8sStore;
pub use podspec::{PodTemplate, PodTemplateShape, extract_pod_template, locate_pod_spec};
pub use record::{ObjectKey, OwnerRef, Record};
pub use resolver::{FetchScope, ObjectCache, OwnerPolicy, OwnerResolver, Resolution, resolve_top_controller};
pub use store::{ObjectStore, SnapshotStore};
pub use validate::validate_ownership;
pub use workload::{KindRef, Workload, WorkloadAggregator};
