// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Container Mount Model
//
// The runtime-side shape of a mount point: what the host tracks between
// container start and stop, including the ordered stack of middleware
// applied to the mount. The flat wire descriptor handed to middleware is
// derived from this by the host adapter.

use crate::domain::api::{Changes, Consistency, MountType, Propagation, Scope};
use crate::domain::middleware::Middleware;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Collaborator interface to a live volume backing a mount.
pub trait Volume: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    fn driver_name(&self) -> &str;

    /// Driver options, when the volume exposes them.
    fn options(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    fn scope(&self) -> Option<Scope> {
        None
    }
}

/// Options carried on the mount specification for volume mounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VolumeOptions {
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub driver_options: HashMap<String, String>,
}

/// Options carried on the mount specification for tmpfs mounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TmpfsOptions {
    pub size_bytes: i64,
    /// File mode bits.
    pub mode: u32,
}

/// The user-requested mount specification, as the runtime records it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MountSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<Consistency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_options: Option<VolumeOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmpfs_options: Option<TmpfsOptions>,
}

/// A middleware's application to a specific mount point. Tracks which
/// middleware was applied (by name for persistence and by handle for live
/// use), what it changed, and the clock ordering detachments.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppliedMountMiddleware {
    pub name: String,
    pub changes: Changes,
    /// Positive integer ensuring detachments occur in the correct order.
    pub clock: u32,
    #[serde(skip)]
    handle: Option<Arc<dyn Middleware>>,
}

impl AppliedMountMiddleware {
    pub fn new(
        name: impl Into<String>,
        changes: Changes,
        clock: u32,
        handle: Option<Arc<dyn Middleware>>,
    ) -> Self {
        Self {
            name: name.into(),
            changes,
            clock,
            handle,
        }
    }

    /// The live middleware handle, absent after a host restart until the
    /// registry re-resolves it.
    pub fn handle(&self) -> Option<Arc<dyn Middleware>> {
        self.handle.clone()
    }
}

impl fmt::Debug for AppliedMountMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppliedMountMiddleware")
            .field("name", &self.name)
            .field("changes", &self.changes)
            .field("clock", &self.clock)
            .field("resolved", &self.handle.is_some())
            .finish()
    }
}

/// The intersection point between a mount and a container: which volume or
/// host path is used and where inside the container it lands, plus the
/// stack of middleware participating in the mount. Identity within one
/// container is the destination path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerMount {
    pub source: String,
    pub destination: String,
    #[serde(rename = "RW")]
    pub rw: bool,
    pub name: String,
    pub driver: String,
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub mount_type: Option<MountType>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<Propagation>,
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub spec: MountSpec,

    /// Live volume reference; never persisted.
    #[serde(skip)]
    pub volume: Option<Arc<dyn Volume>>,

    /// Middleware applied to this mount, bottom of the stack first.
    pub applied_middleware: Vec<AppliedMountMiddleware>,
}

impl ContainerMount {
    /// The directory to use for this mount even after middleware may have
    /// changed the original source directory: the topmost non-empty
    /// rewrite, or the original source.
    pub fn effective_source(&self) -> &str {
        for applied in self.applied_middleware.iter().rev() {
            if !applied.changes.effective_source.is_empty() {
                return &applied.changes.effective_source;
            }
        }
        &self.source
    }

    /// Pushes a new applied middleware onto the mount's stack.
    pub fn push_middleware(&mut self, handle: Arc<dyn Middleware>, changes: Changes, clock: u32) {
        let applied =
            AppliedMountMiddleware::new(handle.name().to_string(), changes, clock, Some(handle));
        self.applied_middleware.push(applied);
    }

    /// Removes and returns the middleware on top of the mount's stack.
    pub fn pop_middleware(&mut self) -> Option<AppliedMountMiddleware> {
        self.applied_middleware.pop()
    }

    /// The clock of the middleware on top of the mount's stack, or 0 if
    /// the stack is empty.
    pub fn top_clock(&self) -> u32 {
        self.applied_middleware
            .last()
            .map_or(0, |applied| applied.clock)
    }
}
