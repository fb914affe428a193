// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Chain Configuration
//
// The host consumes an ordered list of middleware names at startup. This
// module defines that configuration, its YAML form, and its validation
// rules. Plugin specs themselves live in the plugin directory and are read
// by the discovery layer, not here.

use crate::domain::middleware::plugin_name_of;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

fn default_plugin_dir() -> PathBuf {
    PathBuf::from("/run/stevedore/plugins")
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

/// Startup configuration for a mount-point middleware chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Ordered middleware names; plugin-backed names carry the `plugin:`
    /// prefix.
    #[serde(default)]
    pub middleware: Vec<String>,

    /// Directory holding plugin spec files.
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: PathBuf,

    /// Per-RPC timeout applied by the HTTP client.
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            middleware: Vec::new(),
            plugin_dir: default_plugin_dir(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
        }
    }
}

impl ChainConfig {
    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Loads configuration from the given path, falling back to defaults
    /// (an empty chain) when no path is supplied.
    pub fn load_or_default(path: Option<PathBuf>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                tracing::info!("Loading chain configuration from {}", path.display());
                Self::from_yaml_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in &self.middleware {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyMiddlewareName);
            }
            if let Some(plugin) = plugin_name_of(name) {
                if plugin.is_empty() {
                    return Err(ConfigError::EmptyPluginName(name.clone()));
                }
            }
        }
        if self.rpc_timeout_secs == 0 {
            return Err(ConfigError::ZeroRpcTimeout);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("middleware names cannot be empty")]
    EmptyMiddlewareName,

    #[error("middleware name {0:?} is missing a plugin name after 'plugin:'")]
    EmptyPluginName(String),

    #[error("rpc_timeout_secs must be greater than zero")]
    ZeroRpcTimeout,
}
