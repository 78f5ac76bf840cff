// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod json;
mod table;
mod yaml;

pub use json::JsonFormatter;
pub use table::TableFormatter;
pub use yaml::YamlFormatter;

use anyhow::Result;
use serde::Serialize;

use crate::cli::OutputFormat;
use topctl::podspec::PodTemplate;
use topctl::record::{ObjectKey, OwnerRef, Record};
use topctl::resolver::Resolution;
use topctl::workload::Workload;

/// Tabular rendering of a command result
#[derive(Debug, Clone)]
pub struct TableResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableResult {
    fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

/// Render `value` as JSON/YAML, or as the table built by `table`
pub fn render<T, F>(value: &T, table: F, format: OutputFormat, no_headers: bool) -> Result<String>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> TableResult,
{
    match format {
        OutputFormat::Table => Ok(TableFormatter::format(&table(value), no_headers)),
        OutputFormat::Json => JsonFormatter::format(value),
        OutputFormat::Yaml => YamlFormatter::format(value),
    }
}

pub fn workloads_table(workloads: &[Workload]) -> TableResult {
    let mut table = TableResult::new(&["kind", "namespace", "name", "pods", "running", "images"]);
    for w in workloads {
        let images = w
            .pod_spec
            .as_ref()
            .map(|spec| {
                spec.containers
                    .iter()
                    .filter_map(|c| c.image.as_deref())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();
        table.push(vec![
            w.top_controller.kind().to_string(),
            w.top_controller.namespace().to_string(),
            w.top_controller.name().to_string(),
            w.pod_count.to_string(),
            w.running_pod_count.to_string(),
            images,
        ]);
    }
    table
}

pub fn controllers_table(controllers: &[Record]) -> TableResult {
    let mut table = TableResult::new(&["kind", "namespace", "name", "api_version"]);
    for c in controllers {
        table.push(vec![
            c.kind().to_string(),
            c.namespace().to_string(),
            c.name().to_string(),
            c.api_version().to_string(),
        ]);
    }
    table
}

/// Owner output: one row per hop, then any owners that were not followed
pub fn owner_table(report: &OwnerReport) -> TableResult {
    let mut table = TableResult::new(&["step", "kind", "namespace", "name"]);
    for (step, key) in report.chain.iter().enumerate() {
        table.push(vec![
            step.to_string(),
            key.kind.clone(),
            key.namespace.clone(),
            key.name.clone(),
        ]);
    }
    for owner in &report.ignored_owners {
        table.push(vec![
            "ignored".to_string(),
            owner.kind.clone(),
            String::new(),
            owner.name.clone(),
        ]);
    }
    table
}

pub fn pod_template_table(template: &PodTemplate) -> TableResult {
    let mut table = TableResult::new(&["container", "image", "security_context"]);
    for c in &template.spec.containers {
        let security_context = c
            .security_context
            .as_ref()
            .and_then(|sc| serde_json::to_string(sc).ok())
            .unwrap_or_default();
        table.push(vec![
            c.name.clone(),
            c.image.clone().unwrap_or_default(),
            security_context,
        ]);
    }
    table
}

/// Serializable view of a [`Resolution`]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReport {
    pub top_controller: Record,
    pub chain: Vec<ObjectKey>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_owners: Vec<OwnerRef>,
}

impl From<Resolution> for OwnerReport {
    fn from(resolution: Resolution) -> Self {
        Self {
            top_controller: resolution.controller,
            chain: resolution.chain,
            ignored_owners: resolution.ignored_owners,
        }
    }
}
