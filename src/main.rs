// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
mod config;
mod output;
mod progress;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::io::IsTerminal;
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::prelude::*;

use cli::{Args, Command};
use config::Config;
use topctl::kubernetes::discovery::build_core_registry;
use topctl::{
    K8sStore, ObjectStore, OwnerResolver, Record, SnapshotStore, WorkloadAggregator,
    extract_pod_template, validate_ownership,
};

/// Namespace used by `owner` when neither -n nor config set one
const DEFAULT_NAMESPACE: &str = "default";

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // Rotate at 10MB or daily, keep 5 files
    let log_path = log_dir.join("topctl.log");
    let condition = RollingConditionBase::new().daily().max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let (non_blocking, guard) = file_appender.get_non_blocking_appender();
    // The writer thread must outlive main
    std::mem::forget(guard);

    let filter = if verbose { "topctl=debug" } else { "topctl=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    if verbose {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs); an already installed one is fine
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::load()?;

    tokio::select! {
        result = run(&args, &config) => result,
        _ = tokio::signal::ctrl_c() => Err(anyhow!("Interrupted")),
    }
}

async fn run(args: &Args, config: &Config) -> Result<()> {
    let rendered = match &args.command {
        Command::PodTemplate { file } => {
            let record = read_manifest(file)?;
            let template = extract_pod_template(&record)?
                .with_context(|| format!("{} has no pod template", record.key()))?;
            output::render(&template, output::pod_template_table, args.output, args.no_headers)?
        }
        Command::Validate { child, controller } => {
            let child = read_manifest(child)?;
            let controller = read_manifest(controller)?;
            validate_ownership(&child, &controller)
                .with_context(|| format!("{} is not controlled by {}", child.key(), controller.key()))?;
            format!("{} is controlled by {}", child.key(), controller.key())
        }
        command => {
            let store = open_store(args, config).await?;
            let spinner = if args.snapshot.is_none() && !args.verbose && std::io::stderr().is_terminal() {
                progress::create_spinner("Querying cluster...")
            } else {
                progress::hidden_spinner()
            };
            let result = query(command, store.as_ref(), args, config).await;
            spinner.finish_and_clear();
            result?
        }
    };

    println!("{}", rendered);
    Ok(())
}

/// Commands that read from an object store
async fn query(command: &Command, store: &dyn ObjectStore, args: &Args, config: &Config) -> Result<String> {
    let namespace = config.namespace_for(command.namespace(), command.all_namespaces());

    match command {
        Command::Workloads { include_pods, .. } => {
            let workloads = WorkloadAggregator::new(store)
                .with_top_level_kinds(config.top_level_kinds.clone())
                .with_policy(config.owner_policy)
                .aggregate(namespace, *include_pods)
                .await?;
            output::render(workloads.as_slice(), output::workloads_table, args.output, args.no_headers)
        }
        Command::Controllers { .. } => {
            let controllers = WorkloadAggregator::new(store)
                .with_top_level_kinds(config.top_level_kinds.clone())
                .with_policy(config.owner_policy)
                .summarize_top_controllers(namespace)
                .await?;
            output::render(controllers.as_slice(), output::controllers_table, args.output, args.no_headers)
        }
        Command::Owner { kind, name, api_version, .. } => {
            let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
            let api_version = match api_version {
                Some(v) => v.clone(),
                None => build_core_registry()
                    .api_version_of(kind)
                    .map(String::from)
                    .with_context(|| format!("--api-version is required for kind {}", kind))?,
            };
            let object = store
                .list_by_kind(&api_version, kind, Some(namespace))
                .await?
                .into_iter()
                .find(|r| r.name() == name)
                .ok_or_else(|| anyhow!("{} {}/{} not found", kind, namespace, name))?;

            let mut cache = topctl::ObjectCache::new();
            let resolution = OwnerResolver::new(store)
                .with_policy(config.owner_policy)
                .resolve(&object, &mut cache)
                .await?;
            debug!(list_calls = cache.list_calls(), "Resolved owner chain");

            let report = output::OwnerReport::from(resolution);
            output::render(&report, output::owner_table, args.output, args.no_headers)
        }
        Command::PodTemplate { .. } | Command::Validate { .. } => {
            bail!("command does not query the cluster")
        }
    }
}

/// Snapshot store if --snapshot was given, otherwise the live cluster
async fn open_store(args: &Args, config: &Config) -> Result<Box<dyn ObjectStore>> {
    if let Some(path) = &args.snapshot {
        let store = SnapshotStore::load(path)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
        info!(path = %path.display(), objects = store.len(), "Using snapshot");
        return Ok(Box::new(store));
    }

    let context = args.context.as_deref().or(config.context.as_deref());
    let store = K8sStore::connect(context).await?;
    debug!(context = %store.context(), "Using live cluster");
    Ok(Box::new(store))
}

/// Read a single object from a JSON or YAML manifest
fn read_manifest(path: &Path) -> Result<Record> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut records = topctl::store::parse_snapshot(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    match records.len() {
        1 => Ok(records.remove(0)),
        0 => bail!("{} contains no objects", path.display()),
        n => bail!("{} contains {} objects, expected one", path.display(), n),
    }
}
