// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Chain Executor
//
// Runs a container's mounts through the ordered middleware chain at start
// and unwinds the applied stacks in reverse clock order at stop, kill,
// OOM, exit, or mid-attach failure. One mutex serializes attach and detach
// passes; within a pass middleware run strictly sequentially.

use crate::application::adapter::wire_mount_point;
use crate::domain::api::{AttachRequest, DetachRequest, API_ATTACH};
use crate::domain::config::{ChainConfig, ConfigError};
use crate::domain::middleware::{Middleware, MiddlewareError, PluginGetter};
use crate::domain::mount::ContainerMount;
use crate::domain::pattern::pattern_matches;
use crate::infrastructure::discovery::SpecDirectoryPlugins;
use crate::infrastructure::registry::{MiddlewareRegistry, RegistryError};
use anyhow::Context;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ChainError {
    /// A middleware rejected an attach pass, or its attach RPC failed.
    /// Surfaced after unwind of the container's prior attachments.
    #[error("middleware {name} failed with error: {message}")]
    MiddlewareFailed { name: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Detach(#[from] DetachError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Accumulated failure of a detach pass. Each round that fails stacks its
/// message onto whatever came before, newest first. The whole error is
/// recoverable only if every stacked failure was: the runtime reports a
/// recoverable failure against the container rather than the host.
#[derive(Debug)]
pub struct DetachError {
    message: String,
    recoverable: bool,
    source: Option<Box<DetachError>>,
}

impl DetachError {
    fn new(message: String, recoverable: bool) -> Self {
        Self {
            message,
            recoverable,
            source: None,
        }
    }

    /// Wraps `previous` (if any) in a new failure message.
    fn stack(previous: Option<DetachError>, message: String, recoverable: bool) -> Self {
        let recoverable = recoverable && previous.as_ref().is_none_or(|p| p.recoverable);
        Self {
            message,
            recoverable,
            source: previous.map(Box::new),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }
}

impl fmt::Display for DetachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for DetachError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// The ordered, mutable list of middleware applied to every container's
/// mounts. Holds references into the registry, never ownership, so a
/// disable followed by a re-enable is safe and outstanding detachments
/// keep resolving.
pub struct MountPointChain {
    registry: Arc<MiddlewareRegistry>,
    middleware: Mutex<Vec<Arc<dyn Middleware>>>,
}

impl MountPointChain {
    /// Creates a chain from an ordered list of middleware names, resolving
    /// each through a fresh registry backed by `getter`.
    pub async fn new(names: &[String], getter: Arc<dyn PluginGetter>) -> Result<Self, ChainError> {
        Self::with_registry(names, Arc::new(MiddlewareRegistry::new(getter))).await
    }

    /// Creates a chain against an existing registry, e.g. one that already
    /// holds in-process middleware.
    pub async fn with_registry(
        names: &[String],
        registry: Arc<MiddlewareRegistry>,
    ) -> Result<Self, ChainError> {
        let middleware = resolve_names(&registry, names).await?;
        Ok(Self {
            registry,
            middleware: Mutex::new(middleware),
        })
    }

    /// Creates a chain from startup configuration: spec-file discovery in
    /// the configured plugin directory and a timeout-bounded HTTP client.
    pub async fn from_config(config: &ChainConfig) -> anyhow::Result<Self> {
        config.validate().context("Invalid chain configuration")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_secs))
            .build()
            .context("Failed to build middleware HTTP client")?;
        let getter = Arc::new(SpecDirectoryPlugins::new(config.plugin_dir.clone()));
        let registry = Arc::new(MiddlewareRegistry::with_http_client(getter, http));
        let chain = Self::with_registry(&config.middleware, registry)
            .await
            .context("Failed to resolve configured middleware")?;
        Ok(chain)
    }

    /// The registry backing this chain.
    pub fn registry(&self) -> &Arc<MiddlewareRegistry> {
        &self.registry
    }

    /// Names of the middleware currently in the chain, in order.
    pub async fn middleware_names(&self) -> Vec<String> {
        self.middleware
            .lock()
            .await
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    /// Runs a container's mounts through the chain. On failure at any
    /// position, already-applied middleware are unwound before the error
    /// is surfaced.
    pub async fn attach_mounts(
        &self,
        id: &str,
        mounts: &mut [ContainerMount],
    ) -> Result<(), ChainError> {
        let chain = self.middleware.lock().await;

        // Every chain position burns a clock value, selected or not, so
        // clock assignments are stable across runs.
        let mut clock: u32 = 0;

        for middleware in chain.iter() {
            clock += 1;

            let patterns = middleware.patterns();
            let wires: Vec<_> = mounts.iter().map(wire_mount_point).collect();
            let selected: Vec<usize> = (0..mounts.len())
                .filter(|&k| patterns.iter().any(|p| pattern_matches(p, &wires[k])))
                .collect();

            if selected.is_empty() {
                debug!(
                    middleware = middleware.name(),
                    container = id,
                    "no mounts selected, skipping"
                );
                continue;
            }

            let request = AttachRequest {
                id: id.to_string(),
                mounts: selected.iter().map(|&k| wires[k].clone()).collect(),
            };
            let response = match middleware.attach(&request).await {
                Ok(response) => response,
                Err(e) => {
                    return Err(self
                        .unwind_attach_on_err(middleware.name(), id, mounts, e.to_string())
                        .await)
                }
            };
            if !response.success {
                let e = MiddlewareError::new(API_ATTACH, response.err);
                return Err(self
                    .unwind_attach_on_err(middleware.name(), id, mounts, e.to_string())
                    .await);
            }

            // Annotate the accepted mounts with the applied middleware.
            // Excess attachments are discarded; missing ones mean no
            // attach.
            for (k, attachment) in response.attachments.iter().enumerate() {
                if k >= selected.len() {
                    break;
                }
                if attachment.attach {
                    mounts[selected[k]].push_middleware(
                        middleware.clone(),
                        attachment.changes.clone(),
                        clock,
                    );
                }
            }
        }

        Ok(())
    }

    /// Detaches a container's mounts from every applied middleware, in
    /// reverse clock order. Invoked by the runtime once per terminated
    /// container, whatever the cause of termination.
    pub async fn detach_mounts(
        &self,
        id: &str,
        mounts: &mut HashMap<String, ContainerMount>,
    ) -> Result<(), ChainError> {
        let _chain = self.middleware.lock().await;
        self.unwind(id, mounts.values_mut().collect())
            .await
            .map_err(ChainError::Detach)
    }

    /// Appends a middleware to the chain's tail.
    pub async fn enable(&self, name: &str) -> Result<(), ChainError> {
        let middleware = self.registry.resolve(name).await?;
        let mut chain = self.middleware.lock().await;
        if chain.iter().any(|m| m.name() == name) {
            debug!(%name, "middleware already enabled");
            return Ok(());
        }
        chain.push(middleware);
        Ok(())
    }

    /// Removes a middleware from the chain. The registry entry stays
    /// reachable: mounts attached earlier still detach through it.
    pub async fn disable(&self, name: &str) {
        let mut chain = self.middleware.lock().await;
        chain.retain(|m| m.name() != name);
    }

    /// Replaces the chain wholesale.
    pub async fn set(&self, names: &[String]) -> Result<(), ChainError> {
        let middleware = resolve_names(&self.registry, names).await?;
        *self.middleware.lock().await = middleware;
        Ok(())
    }

    /// Cleans up previous attachments when an attach pass fails, then
    /// wraps the original error with the failing middleware's name. If
    /// the unwind itself fails, its error wraps the original.
    async fn unwind_attach_on_err(
        &self,
        middleware_name: &str,
        id: &str,
        mounts: &mut [ContainerMount],
        attach_error: String,
    ) -> ChainError {
        warn!(
            middleware = middleware_name,
            container = id,
            error = %attach_error,
            "attach failed, unwinding applied middleware"
        );
        let message = match self.unwind(id, mounts.iter_mut().collect()).await {
            Ok(()) => attach_error,
            Err(unwind_error) => format!("{}: {}", unwind_error, attach_error),
        };
        ChainError::MiddlewareFailed {
            name: middleware_name.to_string(),
            message,
        }
    }

    /// Detaches all middleware participating in a container's mounts. Runs
    /// in rounds: each round pops every mount whose top clock equals the
    /// current maximum (those entries name the same middleware by
    /// construction) and issues one detach RPC.
    async fn unwind(
        &self,
        id: &str,
        mut mounts: Vec<&mut ContainerMount>,
    ) -> Result<(), DetachError> {
        let mut accumulated: Option<DetachError> = None;

        loop {
            let max_clock = mounts.iter().map(|m| m.top_clock()).max().unwrap_or(0);
            if max_clock == 0 {
                break;
            }

            let mut middleware: Option<Arc<dyn Middleware>> = None;
            for mount in mounts.iter_mut() {
                if mount.top_clock() < max_clock {
                    continue;
                }

                let Some(applied) = mount.pop_middleware() else {
                    continue;
                };
                match &middleware {
                    None => {
                        let handle = match applied.handle() {
                            Some(handle) => handle,
                            // Absent after a host restart: re-resolve
                            // through the registry, which re-fetches the
                            // middleware's properties first.
                            None => match self.registry.resolve(&applied.name).await {
                                Ok(handle) => handle,
                                Err(e) => {
                                    return Err(DetachError::stack(
                                        accumulated,
                                        format!("unwind middleware retrieval error: \"{}\"", e),
                                        false,
                                    ))
                                }
                            },
                        };
                        middleware = Some(handle);
                    }
                    Some(current) => {
                        if current.name() != applied.name {
                            return Err(DetachError::new(
                                format!(
                                    "middleware inconsistency {} != {}",
                                    current.name(),
                                    applied.name
                                ),
                                false,
                            ));
                        }
                    }
                }
            }

            let Some(middleware) = middleware else {
                break;
            };

            let request = DetachRequest { id: id.to_string() };
            match middleware.detach(&request).await {
                Err(e) => {
                    return Err(DetachError::stack(
                        accumulated,
                        format!("unwind detach API error for {}: \"{}\"", middleware.name(), e),
                        false,
                    ))
                }
                Ok(response) => {
                    if !response.success {
                        let failure = DetachError::stack(
                            accumulated.take(),
                            format!(
                                "unwind detach middleware {} error: \"{}\"",
                                middleware.name(),
                                response.err
                            ),
                            response.recoverable,
                        );
                        if !response.recoverable {
                            return Err(failure);
                        }
                        warn!(
                            middleware = middleware.name(),
                            container = id,
                            error = %response.err,
                            "recoverable detach failure, continuing unwind"
                        );
                        accumulated = Some(failure);
                    }
                }
            }
        }

        match accumulated {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn resolve_names(
    registry: &MiddlewareRegistry,
    names: &[String],
) -> Result<Vec<Arc<dyn Middleware>>, RegistryError> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            debug!(%name, "skipping duplicate middleware registration");
            continue;
        }
        resolved.push(registry.resolve(name).await?);
    }
    Ok(resolved)
}
