// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use kube::api::{DynamicObject, ListParams, ObjectList};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::discovery::{ResourceInfo, ResourceRegistry, build_core_registry, discover_kind};
use crate::error::{Error, Result};
use crate::record::Record;
use crate::store::ObjectStore;

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (doubles each retry)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Page size for paginated list requests
const PAGE_SIZE: u32 = 500;

/// Object store gateway backed by a live cluster
pub struct K8sStore {
    client: Client,
    context: String,
    /// Core kinds plus anything discovered so far
    registry: RwLock<ResourceRegistry>,
}

impl K8sStore {
    /// Connect using a kubeconfig context, or the current context if `None`
    pub async fn connect(context: Option<&str>) -> anyhow::Result<Self> {
        let kubeconfig = Kubeconfig::read().context("Failed to read kubeconfig")?;

        let context_name = context
            .map(String::from)
            .or_else(|| kubeconfig.current_context.clone())
            .ok_or_else(|| anyhow!("No context specified and no current context in kubeconfig"))?;

        if !kubeconfig.contexts.iter().any(|c| c.name == context_name) {
            return Err(anyhow!("Context '{}' not found in kubeconfig", context_name));
        }

        let mut config = Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: Some(context_name.clone()),
                ..Default::default()
            },
        )
        .await
        .with_context(|| format!("Failed to load kubeconfig for context '{}'", context_name))?;

        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config)
            .with_context(|| format!("Failed to create client for context '{}'", context_name))?;

        info!(context = %context_name, "Connected to cluster");

        Ok(Self {
            client,
            context: context_name,
            registry: RwLock::new(build_core_registry()),
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Map (apiVersion, kind) to a resource, discovering unknown kinds once
    async fn resource_info(&self, api_version: &str, kind: &str) -> Result<ResourceInfo> {
        {
            let registry = self.registry.read().await;
            if let Some(info) = registry.get(api_version, kind) {
                return Ok(info.clone());
            }
        }

        let info = discover_kind(&self.client, api_version, kind).await?;
        self.registry.write().await.add(info.clone());
        Ok(info)
    }

    /// List resources with pagination, following continue tokens
    async fn list_all(&self, api: &Api<DynamicObject>, resource: &str) -> Result<Vec<DynamicObject>> {
        let mut all_items: Vec<DynamicObject> = Vec::new();
        let mut continue_token: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            let mut params = ListParams::default().limit(PAGE_SIZE);
            if let Some(ref token) = continue_token {
                params = params.continue_token(token);
            }

            let list = self.list_page_with_retry(api, &params, resource).await?;

            let items_count = list.items.len();
            all_items.extend(list.items);
            page_count += 1;

            match list.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    debug!(
                        resource = %resource,
                        context = %self.context,
                        page = page_count,
                        items_this_page = items_count,
                        total_so_far = all_items.len(),
                        "Fetched page, continuing"
                    );
                    continue_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(all_items)
    }

    /// Fetch a single page with retry logic
    async fn list_page_with_retry(
        &self,
        api: &Api<DynamicObject>,
        params: &ListParams,
        resource: &str,
    ) -> Result<ObjectList<DynamicObject>> {
        let mut attempt = 0;
        loop {
            match api.list(params).await {
                Ok(list) => return Ok(list),
                Err(e) if is_retryable_error(&e) && attempt + 1 < MAX_RETRIES => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(
                        resource = %resource,
                        context = %self.context,
                        attempt = attempt + 1,
                        max_attempts = MAX_RETRIES,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Retryable error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(resource = %resource, context = %self.context, error = %e, "List failed");
                    return Err(Error::list(resource, e));
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for K8sStore {
    async fn list_by_kind(
        &self,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<Record>> {
        let info = self.resource_info(api_version, kind).await?;
        let ar = &info.api_resource;
        let resource = info.resource_name();

        let api: Api<DynamicObject> = match namespace {
            Some(ns) if info.is_namespaced() => Api::namespaced_with(self.client.clone(), ns, ar),
            _ => Api::all_with(self.client.clone(), ar),
        };

        debug!(
            resource = %resource,
            context = %self.context,
            namespace = ?namespace,
            "Listing objects"
        );

        let items = self.list_all(&api, &resource).await?;
        Ok(items
            .into_iter()
            .filter_map(|item| to_record(item, &ar.api_version, &ar.kind))
            .collect())
    }
}

/// Convert a listed object to a record; list responses omit per-item
/// apiVersion and kind, so they are injected here
fn to_record(item: DynamicObject, api_version: &str, kind: &str) -> Option<Record> {
    let mut value = match serde_json::to_value(item) {
        Ok(value) => value,
        Err(e) => {
            warn!(kind = %kind, error = %e, "Skipping object that failed to serialize");
            return None;
        }
    };
    if let serde_json::Value::Object(ref mut map) = value {
        map.insert("apiVersion".to_string(), api_version.into());
        map.insert("kind".to_string(), kind.into());
    }
    Record::try_from(value).ok()
}

/// Transient failures worth retrying: transport errors and 429/503/504
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::HyperError(_) => true,
        kube::Error::Api(api_err) => matches!(api_err.code, 429 | 503 | 504),
        _ => false,
    }
}
