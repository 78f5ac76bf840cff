// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Offline object store backed by a dump of cluster objects.
//!
//! Accepts the formats `kubectl get -o json|yaml` produces: a `List` with
//! `items`, a bare array of objects, or a multi-document YAML stream.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::ObjectStore;
use crate::error::{Error, Result};
use crate::kubernetes::discovery::{ResourceRegistry, build_core_registry};
use crate::record::Record;

pub struct SnapshotStore {
    records: Vec<Record>,
    registry: ResourceRegistry,
}

impl SnapshotStore {
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records,
            registry: build_core_registry(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
        let records = parse_snapshot(&content)?;
        debug!(path = %path.display(), objects = records.len(), "Loaded snapshot");
        Ok(Self::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A kind is listable if it is a known resource or appears in the dump
    fn knows_kind(&self, kind: &str) -> bool {
        self.registry.contains_kind(kind) || self.records.iter().any(|r| r.kind() == kind)
    }
}

#[async_trait]
impl ObjectStore for SnapshotStore {
    async fn list_by_kind(
        &self,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<Record>> {
        if !self.knows_kind(kind) {
            return Err(Error::mapping_not_found(api_version, kind));
        }

        let items: Vec<Record> = self
            .records
            .iter()
            .filter(|r| r.kind() == kind)
            .filter(|r| namespace.is_none_or(|ns| r.namespace() == ns))
            .cloned()
            .collect();

        debug!(
            kind = %kind,
            namespace = ?namespace,
            items = items.len(),
            "Listed snapshot objects"
        );
        Ok(items)
    }
}

/// Parse a snapshot document stream into records
pub fn parse_snapshot(content: &str) -> Result<Vec<Record>> {
    let trimmed = content.trim_start();
    let documents: Vec<Value> = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        vec![serde_json::from_str(trimmed).map_err(|e| Error::SnapshotFormat(e.to_string()))?]
    } else {
        serde_yaml::Deserializer::from_str(content)
            .map(|doc| Value::deserialize(doc).map_err(|e| Error::SnapshotFormat(e.to_string())))
            .collect::<Result<_>>()?
    };

    let mut records = Vec::new();
    for document in documents {
        flatten(document, &mut records)?;
    }
    Ok(records)
}

fn flatten(document: Value, out: &mut Vec<Record>) -> Result<()> {
    match document {
        Value::Null => Ok(()),
        Value::Array(items) => items.into_iter().try_for_each(|item| flatten(item, out)),
        Value::Object(mut map) if map.get("items").is_some_and(Value::is_array) => {
            let Some(Value::Array(items)) = map.remove("items") else {
                return Ok(());
            };
            items.into_iter().try_for_each(|item| flatten(item, out))
        }
        other => {
            out.push(Record::try_from(other)?);
            Ok(())
        }
    }
}
