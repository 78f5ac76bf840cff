// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Object store gateways.
//!
//! Owner resolution only needs "list every object of a kind", optionally
//! within a namespace. The live cluster implementation lives in
//! [`crate::kubernetes::K8sStore`]; [`SnapshotStore`] serves the same calls
//! from objects loaded out of a file.

mod snapshot;

pub use snapshot::{SnapshotStore, parse_snapshot};

use async_trait::async_trait;

use crate::error::Result;
use crate::record::Record;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object of `kind`. `None` lists across all namespaces.
    ///
    /// Kinds that cannot be mapped to a resource fail with
    /// [`crate::Error::MappingNotFound`].
    async fn list_by_kind(
        &self,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<Record>>;

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Record>> {
        self.list_by_kind("v1", "Pod", namespace).await
    }
}
