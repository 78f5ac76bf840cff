// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Top controller resolution.
//!
//! Walks `metadata.ownerReferences` upward until an object without owners is
//! reached. Owners are looked up in an [`ObjectCache`] that is filled one
//! whole kind at a time: the first miss for a ReplicaSet lists every
//! ReplicaSet in scope, so resolving thousands of pods costs one list call
//! per owner kind instead of one get per pod.
//!
//! The cache belongs to the caller and lives for one query. Nothing is kept
//! between queries.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::record::{ObjectKey, OwnerRef, Record};
use crate::store::ObjectStore;

/// Kind name kubelet uses as owner of static (mirror) pods
pub(crate) const NODE_KIND: &str = "Node";

/// Which owner reference is followed when an object has several
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerPolicy {
    /// The first reference is authoritative
    #[default]
    #[serde(alias = "firstreference")]
    First,
    /// The reference marked `controller: true`, else the first
    #[serde(alias = "controllerflag")]
    Controller,
}

impl OwnerPolicy {
    /// Pick the followed owner; the rest are returned for diagnostics
    pub fn select(self, owners: &[OwnerRef]) -> Option<(&OwnerRef, Vec<OwnerRef>)> {
        let index = match self {
            Self::First => 0,
            Self::Controller => owners.iter().position(OwnerRef::is_controller).unwrap_or(0),
        };
        let selected = owners.get(index)?;
        let rest = owners
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, owner)| owner.clone())
            .collect();
        Some((selected, rest))
    }
}

/// How far a cache fill reaches when an owner kind is missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchScope {
    /// List the owner kind in the child's namespace
    #[default]
    Namespaced,
    /// List the owner kind across all namespaces in one call
    ClusterWide,
}

/// Objects fetched during one query, keyed by identity
#[derive(Debug, Default)]
pub struct ObjectCache {
    objects: HashMap<ObjectKey, Record>,
    /// (kind, namespace) pairs already listed; `None` is cluster-wide
    fetched: HashSet<(String, Option<String>)>,
    /// (apiVersion, kind) pairs the store could not map
    unmapped: HashSet<(String, String)>,
    list_calls: usize,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&Record> {
        self.objects.get(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of list calls issued through this cache
    pub fn list_calls(&self) -> usize {
        self.list_calls
    }

    /// Whether `kind` was already listed for `namespace` (or cluster-wide)
    pub fn is_fetched(&self, kind: &str, namespace: Option<&str>) -> bool {
        self.fetched.contains(&(kind.to_string(), None))
            || namespace.is_some_and(|ns| {
                self.fetched
                    .contains(&(kind.to_string(), Some(ns.to_string())))
            })
    }

    /// Store the result of one list call.
    ///
    /// Within the batch the last record for a key wins; keys stored by an
    /// earlier list call are left untouched.
    pub fn insert_fetched(&mut self, kind: &str, namespace: Option<&str>, records: Vec<Record>) {
        let batch: HashMap<ObjectKey, Record> = records.into_iter().map(|r| (r.key(), r)).collect();
        for (key, record) in batch {
            self.objects.entry(key).or_insert(record);
        }
        self.fetched
            .insert((kind.to_string(), namespace.map(String::from)));
    }

    /// Store records listed by the caller; counts as one list call
    pub(crate) fn insert_listed(&mut self, kind: &str, namespace: Option<&str>, records: Vec<Record>) {
        self.list_calls += 1;
        self.insert_fetched(kind, namespace, records);
    }

    /// List every object of a kind into the cache, at most once per scope
    pub async fn cache_all_objects_of_kind<S>(
        &mut self,
        store: &S,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<()>
    where
        S: ObjectStore + ?Sized,
    {
        if self.is_fetched(kind, namespace) {
            return Ok(());
        }
        let gvk = (api_version.to_string(), kind.to_string());
        if self.unmapped.contains(&gvk) {
            return Err(Error::mapping_not_found(api_version, kind));
        }

        self.list_calls += 1;
        match store.list_by_kind(api_version, kind, namespace).await {
            Ok(records) => {
                debug!(
                    kind = %kind,
                    namespace = ?namespace,
                    objects = records.len(),
                    "Cached objects of kind"
                );
                self.insert_fetched(kind, namespace, records);
                Ok(())
            }
            Err(e @ Error::MappingNotFound { .. }) => {
                self.unmapped.insert(gvk);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// Outcome of walking an owner chain
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The top controller (the input itself if it has no followable owner)
    pub controller: Record,
    /// Keys walked, starting with the input object
    pub chain: Vec<ObjectKey>,
    /// Owner references seen along the way but not followed
    pub ignored_owners: Vec<OwnerRef>,
}

/// Resolves objects to their top controller through an [`ObjectStore`]
pub struct OwnerResolver<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    scope: FetchScope,
    policy: OwnerPolicy,
}

impl<'s, S: ObjectStore + ?Sized> OwnerResolver<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            scope: FetchScope::default(),
            policy: OwnerPolicy::default(),
        }
    }

    pub fn with_scope(mut self, scope: FetchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_policy(mut self, policy: OwnerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Follow owner references from `record` to the top controller.
    ///
    /// A pod owned by a Node is a static pod and is its own top controller.
    pub async fn resolve(&self, record: &Record, cache: &mut ObjectCache) -> Result<Resolution> {
        let mut current = record.clone();
        let mut chain = vec![current.key()];
        let mut visited: HashSet<ObjectKey> = chain.iter().cloned().collect();
        let mut ignored_owners = Vec::new();

        loop {
            let owners = current.owner_references()?;
            let Some((owner, rest)) = self.policy.select(&owners) else {
                break;
            };
            if !rest.is_empty() {
                debug!(
                    object = %current.key(),
                    owners = owners.len(),
                    followed = %owner.name,
                    "Found more than one owner"
                );
                ignored_owners.extend(rest);
            }
            if owner.kind == NODE_KIND {
                trace!(object = %current.key(), node = %owner.name, "Static pod, not escalating to node");
                break;
            }

            let key = ObjectKey::new(&owner.kind, current.namespace(), &owner.name);
            if !visited.insert(key.clone()) {
                return Err(Error::CyclicOwnership { key });
            }

            if cache.get(&key).is_none() {
                let namespace = match self.scope {
                    FetchScope::Namespaced => Some(current.namespace()).filter(|ns| !ns.is_empty()),
                    FetchScope::ClusterWide => None,
                };
                cache
                    .cache_all_objects_of_kind(self.store, &owner.api_version, &owner.kind, namespace)
                    .await?;
            }
            let Some(next) = cache.get(&key) else {
                return Err(Error::OwnerNotFound { key });
            };

            trace!(from = %current.key(), to = %key, "Followed owner reference");
            current = next.clone();
            chain.push(key);
        }

        Ok(Resolution {
            controller: current,
            chain,
            ignored_owners,
        })
    }
}

/// Resolve one object with a fresh cache scoped to its namespace
pub async fn resolve_top_controller<S>(store: &S, record: &Record) -> Result<Resolution>
where
    S: ObjectStore + ?Sized,
{
    let mut cache = ObjectCache::new();
    OwnerResolver::new(store).resolve(record, &mut cache).await
}
