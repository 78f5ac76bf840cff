// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "topctl")]
#[command(author, version, about = "Resolve Kubernetes pods to their top-level controllers")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Kubernetes context to use (defaults to config, then kubeconfig current context)
    #[arg(short, long, global = true, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Read objects from a JSON/YAML dump instead of a live cluster
    #[arg(long, global = true, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Omit column headers in output
    #[arg(long, global = true)]
    pub no_headers: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Group pods under their top controllers with pod counts
    Workloads {
        /// Namespace to inspect (config default, else all namespaces)
        #[arg(short, long)]
        namespace: Option<String>,

        /// Inspect all namespaces, ignoring the configured default
        #[arg(short = 'A', long, conflicts_with = "namespace")]
        all_namespaces: bool,

        /// Include the pod records in the output
        #[arg(long)]
        include_pods: bool,
    },

    /// List distinct top controllers without pod statistics
    Controllers {
        #[arg(short, long)]
        namespace: Option<String>,

        #[arg(short = 'A', long, conflicts_with = "namespace")]
        all_namespaces: bool,
    },

    /// Show the top controller of one object and the chain walked to reach it
    Owner {
        /// Object kind, e.g. Pod or ReplicaSet
        kind: String,

        /// Object name
        name: String,

        #[arg(short, long)]
        namespace: Option<String>,

        /// apiVersion of the kind (inferred for built-in kinds)
        #[arg(long)]
        api_version: Option<String>,
    },

    /// Print the pod template extracted from a manifest
    PodTemplate {
        /// Manifest file (JSON or YAML)
        file: PathBuf,
    },

    /// Check that a controller really owns a child object
    Validate {
        /// Child manifest (usually a Pod)
        child: PathBuf,

        /// Claimed controller manifest
        controller: PathBuf,
    },
}

impl Command {
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Workloads { namespace, .. }
            | Self::Controllers { namespace, .. }
            | Self::Owner { namespace, .. } => namespace.as_deref(),
            Self::PodTemplate { .. } | Self::Validate { .. } => None,
        }
    }

    pub fn all_namespaces(&self) -> bool {
        match self {
            Self::Workloads { all_namespaces, .. } | Self::Controllers { all_namespaces, .. } => {
                *all_namespaces
            }
            _ => false,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workloads() {
        let args = Args::parse_from(["topctl", "workloads", "-n", "test", "--include-pods", "-o", "json"]);
        assert_eq!(args.output, OutputFormat::Json);
        match args.command {
            Command::Workloads { namespace, include_pods, all_namespaces } => {
                assert!(!all_namespaces);
                assert_eq!(namespace.as_deref(), Some("test"));
                assert!(include_pods);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_owner_defaults() {
        let args = Args::parse_from(["topctl", "--snapshot", "dump.yaml", "owner", "Pod", "poddy"]);
        assert_eq!(args.snapshot, Some(PathBuf::from("dump.yaml")));
        match args.command {
            Command::Owner { kind, name, api_version, namespace } => {
                assert_eq!(kind, "Pod");
                assert_eq!(name, "poddy");
                assert!(api_version.is_none());
                assert!(namespace.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_all_namespaces() {
        let args = Args::parse_from(["topctl", "controllers", "-A"]);
        assert!(args.command.all_namespaces());
        assert_eq!(args.command.namespace(), None);

        let args = Args::parse_from(["topctl", "workloads", "--all-namespaces"]);
        assert!(args.command.all_namespaces());

        assert!(Args::try_parse_from(["topctl", "workloads", "-A", "-n", "test"]).is_err());
    }

    #[test]
    fn test_parse_validate() {
        let args = Args::parse_from(["topctl", "validate", "pod.yaml", "rs.yaml"]);
        assert_eq!(args.command.namespace(), None);
        assert!(!args.command.all_namespaces());
    }
}
