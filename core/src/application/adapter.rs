// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Host Adapter
//
// Translates between the runtime's internal mount representation and the
// flat wire descriptor delivered to middleware, and produces the mount
// operation handed to the container start path once the chain has run.

use crate::domain::api::{self, AppliedMiddleware, Propagation};
use crate::domain::mount::ContainerMount;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Flattens a runtime mount into the wire shape middleware sees. The
/// effective source reflects every rewrite currently on the applied stack,
/// so later chain positions observe earlier changes.
pub fn wire_mount_point(mount: &ContainerMount) -> api::MountPoint {
    let mut labels = HashMap::new();
    let mut driver_options = HashMap::new();
    if let Some(volume_options) = &mount.spec.volume_options {
        labels = volume_options.labels.clone();
        driver_options = volume_options.driver_options.clone();
    }

    let (size_bytes, mount_mode) = mount
        .spec
        .tmpfs_options
        .map_or((0, 0), |tmpfs| (tmpfs.size_bytes, tmpfs.mode));

    let (options, scope) = match &mount.volume {
        Some(volume) => (volume.options(), volume.scope()),
        None => (HashMap::new(), None),
    };

    api::MountPoint {
        effective_source: mount.effective_source().to_string(),
        source: mount.source.clone(),
        destination: mount.destination.clone(),
        read_only: !mount.rw,
        name: mount.name.clone(),
        driver: mount.driver.clone(),
        mount_type: mount.mount_type,
        mode: mount.mode.clone(),
        propagation: mount.propagation,
        id: mount.id.clone(),
        applied_middleware: mount
            .applied_middleware
            .iter()
            .map(|applied| AppliedMiddleware {
                name: applied.name.clone(),
                changes: applied.changes.clone(),
            })
            .collect(),
        consistency: mount.spec.consistency,
        labels,
        driver_options,
        scope,
        size_bytes,
        mount_mode,
        options,
    }
}

/// Information for one mount operation, as consumed by the container start
/// path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MountOperation {
    pub source: String,
    pub destination: String,
    pub writable: bool,
    #[serde(default)]
    pub data: String,
    #[serde(rename = "mountpropagation", skip_serializing_if = "Option::is_none")]
    pub propagation: Option<Propagation>,
}

/// The operation for a mount after the chain has run: the source is the
/// middleware-resolved effective source, not the original request.
pub fn mount_operation(mount: &ContainerMount) -> MountOperation {
    MountOperation {
        source: mount.effective_source().to_string(),
        destination: mount.destination.clone(),
        writable: mount.rw,
        data: String::new(),
        propagation: mount.propagation,
    }
}
