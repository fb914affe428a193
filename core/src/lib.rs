// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mount-point middleware chain
//!
//! A pluggable interposition layer between a container runtime and the
//! file-system mount points it assembles for each container. An ordered
//! chain of middleware, each reachable over JSON HTTP-RPC, observes and
//! optionally transforms the set of mounts at container start and is torn
//! down symmetrically at container stop.
//!
//! # Architecture
//!
//! - **domain**: wire model, pattern evaluator, runtime mount model,
//!   middleware seam, configuration
//! - **application**: chain executor and host adapter
//! - **infrastructure**: reqwest RPC client, middleware registry,
//!   file-backed plugin discovery

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::adapter::{mount_operation, wire_mount_point, MountOperation};
pub use application::chain::{ChainError, DetachError, MountPointChain};
pub use domain::api;
pub use domain::config::{ChainConfig, ConfigError};
pub use domain::middleware::{
    plugin_name_of, Middleware, MiddlewareError, PluginEndpoint, PluginGetter, PLUGIN_PREFIX,
};
pub use domain::mount::{AppliedMountMiddleware, ContainerMount, MountSpec, Volume};
pub use domain::pattern::pattern_matches;
pub use infrastructure::client::{PluginClient, RpcError};
pub use infrastructure::discovery::SpecDirectoryPlugins;
pub use infrastructure::registry::{MiddlewareRegistry, PluginMiddleware, RegistryError};
