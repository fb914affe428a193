// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Middleware Registry
//
// Resolves middleware names to live handles. Plugin-backed names are
// looked up through the host's plugin discovery, probed with the
// activation handshake, and their properties fetched and cached. Entries
// outlive chain membership so that detachments outstanding after a
// disable, or after a host restart, can still resolve their middleware.

use crate::domain::api::{
    AttachRequest, AttachResponse, DetachRequest, DetachResponse, Pattern, PropertiesRequest,
    API_IMPLEMENTS,
};
use crate::domain::middleware::{
    plugin_name_of, DiscoveryError, Middleware, MiddlewareError, PluginEndpoint, PluginGetter,
    PLUGIN_PREFIX,
};
use crate::infrastructure::client::PluginClient;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// In-process middleware must be registered before it can resolve.
    #[error("non-plugin middleware {0} not found")]
    NotRegistered(String),

    #[error("in-process middleware name {0:?} must not carry the 'plugin:' prefix")]
    ReservedName(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("plugin {name} activation failed: {message}")]
    Activation { name: String, message: String },

    #[error("plugin {name} does not implement mountpoint")]
    NotImplemented { name: String },

    #[error("plugin {name} properties query failed: {message}")]
    Properties { name: String, message: String },
}

/// A plugin-backed middleware: an RPC client plus the pattern set cached
/// from its properties response.
pub struct PluginMiddleware {
    name: String,
    client: PluginClient,
    patterns: Vec<Pattern>,
}

impl PluginMiddleware {
    /// Connects to a plugin endpoint: activation probe, then a properties
    /// fetch whose patterns are cached for the life of the handle.
    pub async fn connect(
        endpoint: &PluginEndpoint,
        http: reqwest::Client,
    ) -> Result<Self, RegistryError> {
        let client = PluginClient::new(&endpoint.name, &endpoint.url, http);

        let activation = client
            .activate()
            .await
            .map_err(|e| RegistryError::Activation {
                name: endpoint.name.clone(),
                message: e.to_string(),
            })?;
        if !activation.implements.iter().any(|i| i == API_IMPLEMENTS) {
            return Err(RegistryError::NotImplemented {
                name: endpoint.name.clone(),
            });
        }

        let properties = client.properties(&PropertiesRequest {}).await.map_err(|e| {
            RegistryError::Properties {
                name: endpoint.name.clone(),
                message: e.to_string(),
            }
        })?;
        if !properties.success {
            return Err(RegistryError::Properties {
                name: endpoint.name.clone(),
                message: properties.err,
            });
        }

        Ok(Self {
            name: format!("{}{}", PLUGIN_PREFIX, endpoint.name),
            client,
            patterns: properties.patterns,
        })
    }
}

#[async_trait]
impl Middleware for PluginMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    fn plugin_name(&self) -> &str {
        self.client.plugin_name()
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    async fn attach(&self, request: &AttachRequest) -> Result<AttachResponse, MiddlewareError> {
        self.client.attach(request).await.map_err(Into::into)
    }

    async fn detach(&self, request: &DetachRequest) -> Result<DetachResponse, MiddlewareError> {
        self.client.detach(request).await.map_err(Into::into)
    }
}

/// Owner of middleware handles, keyed by middleware name.
pub struct MiddlewareRegistry {
    getter: Arc<dyn PluginGetter>,
    http: reqwest::Client,
    entries: RwLock<HashMap<String, Arc<dyn Middleware>>>,
}

impl MiddlewareRegistry {
    pub fn new(getter: Arc<dyn PluginGetter>) -> Self {
        Self::with_http_client(getter, reqwest::Client::new())
    }

    /// Uses a caller-configured HTTP client, e.g. with an RPC timeout.
    pub fn with_http_client(getter: Arc<dyn PluginGetter>, http: reqwest::Client) -> Self {
        Self {
            getter,
            http,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registers in-process middleware under its (unprefixed) name.
    pub async fn register_in_process(
        &self,
        middleware: Arc<dyn Middleware>,
    ) -> Result<(), RegistryError> {
        let name = middleware.name().to_string();
        if plugin_name_of(&name).is_some() {
            return Err(RegistryError::ReservedName(name));
        }
        info!(%name, "registered in-process mount-point middleware");
        self.entries.write().await.insert(name, middleware);
        Ok(())
    }

    /// Resolves a middleware name to a live handle, constructing and
    /// caching a plugin client when the name is not yet known. Used both
    /// at chain construction and when re-hydrating applied middleware
    /// after a host restart.
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn Middleware>, RegistryError> {
        if let Some(found) = self.entries.read().await.get(name) {
            return Ok(found.clone());
        }

        let Some(plugin_name) = plugin_name_of(name) else {
            return Err(RegistryError::NotRegistered(name.to_string()));
        };

        let endpoint = self.getter.get(plugin_name).await?;
        let middleware: Arc<dyn Middleware> =
            Arc::new(PluginMiddleware::connect(&endpoint, self.http.clone()).await?);
        info!(%name, url = %endpoint.url, "registered mount-point middleware plugin");

        let mut entries = self.entries.write().await;
        // Re-check after acquiring the write lock; keep the entry that won
        // the race so handles stay stable.
        let entry = entries
            .entry(name.to_string())
            .or_insert(middleware)
            .clone();
        Ok(entry)
    }
}
