// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Plugin Discovery
//
// File-backed plugin lookup: each plugin registers by dropping a spec file
// in the host's plugin directory. `<name>.spec` holds the bare endpoint
// URL; `<name>.json` holds `{"Name": ..., "Addr": ...}`.

use crate::domain::middleware::{DiscoveryError, PluginEndpoint, PluginGetter};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JsonSpec {
    #[serde(default)]
    name: Option<String>,
    addr: String,
}

/// Plugin getter reading spec files from a directory.
#[derive(Debug, Clone)]
pub struct SpecDirectoryPlugins {
    dir: PathBuf,
}

impl SpecDirectoryPlugins {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn validated(&self, name: &str, url: String) -> Result<PluginEndpoint, DiscoveryError> {
        if url.is_empty() {
            return Err(DiscoveryError::InvalidSpec {
                name: name.to_string(),
                reason: "spec file is empty".to_string(),
            });
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(DiscoveryError::InvalidSpec {
                name: name.to_string(),
                reason: format!("endpoint {:?} must start with http:// or https://", url),
            });
        }
        Ok(PluginEndpoint {
            name: name.to_string(),
            url,
        })
    }
}

#[async_trait]
impl PluginGetter for SpecDirectoryPlugins {
    async fn get(&self, plugin_name: &str) -> Result<PluginEndpoint, DiscoveryError> {
        let spec_path = self.dir.join(format!("{}.spec", plugin_name));
        match tokio::fs::read_to_string(&spec_path).await {
            Ok(content) => return self.validated(plugin_name, content.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(DiscoveryError::Io {
                    name: plugin_name.to_string(),
                    source,
                })
            }
        }

        let json_path = self.dir.join(format!("{}.json", plugin_name));
        match tokio::fs::read_to_string(&json_path).await {
            Ok(content) => {
                let spec: JsonSpec =
                    serde_json::from_str(&content).map_err(|e| DiscoveryError::InvalidSpec {
                        name: plugin_name.to_string(),
                        reason: e.to_string(),
                    })?;
                if let Some(name) = &spec.name {
                    if name != plugin_name {
                        return Err(DiscoveryError::InvalidSpec {
                            name: plugin_name.to_string(),
                            reason: format!("spec names a different plugin: {:?}", name),
                        });
                    }
                }
                self.validated(plugin_name, spec.addr.trim().to_string())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(DiscoveryError::NotFound(plugin_name.to_string()))
            }
            Err(source) => Err(DiscoveryError::Io {
                name: plugin_name.to_string(),
                source,
            }),
        }
    }
}
