// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for owner resolution, pod template extraction and validation.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::record::ObjectKey;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which ownership consistency check failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchCheck {
    OwnerUid,
    Namespace,
    Name,
    Kind,
    ContainerCount,
    ContainerIdentity,
    SecurityContext,
}

impl fmt::Display for MismatchCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OwnerUid => "owner uid",
            Self::Namespace => "namespace",
            Self::Name => "name",
            Self::Kind => "kind",
            Self::ContainerCount => "container count",
            Self::ContainerIdentity => "container identity",
            Self::SecurityContext => "security context",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The kind cannot be mapped to a listable resource
    #[error("no resource mapping for {api_version}/{kind}")]
    MappingNotFound { api_version: String, kind: String },

    /// An owner reference points at an object that does not exist
    #[error("owner {key} could not be found")]
    OwnerNotFound { key: ObjectKey },

    /// An owner chain revisits an object it already walked through
    #[error("owner chain revisits {key}")]
    CyclicOwnership { key: ObjectKey },

    /// A nested field exists but has the wrong shape
    #[error("malformed record at `{path}`: {reason}")]
    MalformedRecord { path: String, reason: String },

    /// A claimed child/controller relationship is inconsistent
    #[error("ownership mismatch ({check}): {detail}")]
    OwnershipMismatch { check: MismatchCheck, detail: String },

    /// Discovery could not be completed (auth, timeout, server error)
    #[error("discovery of {api_version}/{kind} failed: {source}")]
    Discovery {
        api_version: String,
        kind: String,
        #[source]
        source: Box<kube::Error>,
    },

    /// Listing objects from the cluster failed
    #[error("failed to list {resource}: {source}")]
    List {
        resource: String,
        #[source]
        source: Box<kube::Error>,
    },

    /// Reading a snapshot file failed
    #[error("failed to read snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A snapshot file could not be parsed
    #[error("invalid snapshot: {0}")]
    SnapshotFormat(String),
}

impl Error {
    pub fn malformed(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn mismatch(check: MismatchCheck, detail: impl Into<String>) -> Self {
        Self::OwnershipMismatch {
            check,
            detail: detail.into(),
        }
    }

    pub fn mapping_not_found(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::MappingNotFound {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    pub fn discovery(api_version: impl Into<String>, kind: impl Into<String>, source: kube::Error) -> Self {
        Self::Discovery {
            api_version: api_version.into(),
            kind: kind.into(),
            source: Box::new(source),
        }
    }

    pub fn list(resource: impl Into<String>, source: kube::Error) -> Self {
        Self::List {
            resource: resource.into(),
            source: Box::new(source),
        }
    }

    /// Errors scoped to a single lookup; aggregation skips the item and goes on
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::MappingNotFound { .. }
                | Self::OwnerNotFound { .. }
                | Self::CyclicOwnership { .. }
                | Self::MalformedRecord { .. }
        )
    }
}
