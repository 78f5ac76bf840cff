// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Semi-structured Kubernetes objects.
//!
//! Objects come back from dynamic list calls (or snapshot files) as plain JSON
//! whose `spec` shape depends on the kind. [`Record`] keeps the JSON as-is and
//! exposes just the metadata accessors that owner resolution needs.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Identity of an object within one query: `(kind, namespace, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectKey {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Entry of `metadata.ownerReferences`
///
/// Parsed leniently: only `kind` and `name` are required, so hand-written
/// snapshots without uids still resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
}

impl OwnerRef {
    pub fn is_controller(&self) -> bool {
        self.controller == Some(true)
    }
}

/// A Kubernetes object as a JSON mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn kind(&self) -> &str {
        self.str_field("kind").unwrap_or_default()
    }

    pub fn api_version(&self) -> &str {
        self.str_field("apiVersion").unwrap_or_default()
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.0.get("metadata").and_then(Value::as_object)
    }

    pub fn name(&self) -> &str {
        self.meta_str("name").unwrap_or_default()
    }

    /// Namespace, empty for cluster-scoped objects
    pub fn namespace(&self) -> &str {
        self.meta_str("namespace").unwrap_or_default()
    }

    pub fn uid(&self) -> Option<&str> {
        self.meta_str("uid")
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind(), self.namespace(), self.name())
    }

    /// `status.phase`, for pods
    pub fn phase(&self) -> Option<&str> {
        self.0
            .get("status")
            .and_then(|s| s.get("phase"))
            .and_then(Value::as_str)
    }

    pub fn has_owner_references(&self) -> bool {
        self.metadata()
            .and_then(|m| m.get("ownerReferences"))
            .and_then(Value::as_array)
            .is_some_and(|refs| !refs.is_empty())
    }

    /// Parse `metadata.ownerReferences`; absent or null means no owners
    pub fn owner_references(&self) -> Result<Vec<OwnerRef>> {
        let Some(raw) = self.metadata().and_then(|m| m.get("ownerReferences")) else {
            return Ok(Vec::new());
        };
        if raw.is_null() {
            return Ok(Vec::new());
        }
        if !raw.is_array() {
            return Err(Error::malformed(
                "metadata.ownerReferences",
                "expected a list",
            ));
        }
        Vec::<OwnerRef>::deserialize(raw)
            .map_err(|e| Error::malformed("metadata.ownerReferences", e))
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    fn meta_str(&self, field: &str) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
    }
}

impl TryFrom<Value> for Record {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::malformed(
                "",
                format!("expected an object, got {}", json_type_name(&other)),
            )),
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
