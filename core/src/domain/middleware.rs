// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Middleware Seam
//
// The trait every chain participant implements, the naming convention that
// separates plugin-backed middleware from in-process middleware, and the
// collaborator interface through which plugins are discovered.

use crate::domain::api::{AttachRequest, AttachResponse, DetachRequest, DetachResponse, Pattern};
use async_trait::async_trait;
use thiserror::Error;

/// Name prefix reserved for plugin-backed middleware.
pub const PLUGIN_PREFIX: &str = "plugin:";

/// Returns the plugin name underlying a middleware name, or `None` when the
/// name refers to in-process middleware.
pub fn plugin_name_of(middleware_name: &str) -> Option<&str> {
    middleware_name.strip_prefix(PLUGIN_PREFIX)
}

/// Failure of a single middleware call. Displays as `<call>: <message>` so
/// callers can wrap it without losing the phase that failed.
#[derive(Debug, Clone, Error)]
#[error("{call}: {message}")]
pub struct MiddlewareError {
    /// The RPC that failed, e.g. `MountPointPlugin.MountPointAttach`.
    pub call: &'static str,
    pub message: String,
}

impl MiddlewareError {
    pub fn new(call: &'static str, message: impl Into<String>) -> Self {
        Self {
            call,
            message: message.into(),
        }
    }
}

/// A participant in the mount-point chain: observes and optionally
/// transforms the mounts selected by its advertised patterns.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Registered middleware name. Plugin-backed middleware carry the
    /// `plugin:` prefix.
    fn name(&self) -> &str;

    /// Name of the plugin implementing this middleware, or the empty
    /// string for in-process middleware.
    fn plugin_name(&self) -> &str;

    /// The advertised pattern set, cached from the properties query.
    fn patterns(&self) -> &[Pattern];

    /// Prepares one or more mount points for a container.
    async fn attach(&self, request: &AttachRequest) -> Result<AttachResponse, MiddlewareError>;

    /// Terminates one clock tick of attachment for a container.
    async fn detach(&self, request: &DetachRequest) -> Result<DetachResponse, MiddlewareError>;
}

/// Where a plugin's HTTP endpoint lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEndpoint {
    pub name: String,
    pub url: String,
}

/// Failure to locate a plugin's endpoint.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("plugin {0} not found")]
    NotFound(String),

    #[error("plugin {name} spec is invalid: {reason}")]
    InvalidSpec { name: String, reason: String },

    #[error("plugin {name} spec unreadable: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Collaborator interface to the host's plugin discovery mechanism.
#[async_trait]
pub trait PluginGetter: Send + Sync {
    /// Resolves a plugin name (without the `plugin:` prefix) to its
    /// endpoint.
    async fn get(&self, plugin_name: &str) -> Result<PluginEndpoint, DiscoveryError>;
}
