// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! User configuration for topctl
//!
//! Everything topctl writes lives under ~/.topctl/:
//! - ~/.topctl/config.json - defaults for context, namespace and aggregation
//! - ~/.topctl/log/ - rolling log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use topctl::resolver::OwnerPolicy;
use topctl::workload::{KindRef, default_top_level_kinds};

/// Get the base topctl directory (~/.topctl/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".topctl"))
        .context("Could not determine home directory")
}

/// topctl configuration; every field is optional in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Kube context used when --context is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Namespace used when -n is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Controller kinds listed up front by aggregation
    #[serde(default = "default_top_level_kinds")]
    pub top_level_kinds: Vec<KindRef>,

    #[serde(default)]
    pub owner_policy: OwnerPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context: None,
            namespace: None,
            top_level_kinds: default_top_level_kinds(),
            owner_policy: OwnerPolicy::default(),
        }
    }
}

impl Config {
    /// Load config from ~/.topctl/config.json, or defaults if it does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the config file path (~/.topctl/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    /// Namespace for a command: all namespaces if asked for, else the flag,
    /// else the configured default
    pub fn namespace_for<'a>(&'a self, flag: Option<&'a str>, all_namespaces: bool) -> Option<&'a str> {
        if all_namespaces {
            return None;
        }
        flag.or(self.namespace.as_deref())
    }
}
