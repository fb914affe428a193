// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Wire Model - Mount-Point Middleware Protocol
//
// Everything a middleware sees on the wire: the flattened mount-point
// descriptor, the pattern language it advertises, and the bodies of the
// three RPCs (properties / attach / detach) plus the activation handshake.
// Field names are part of the protocol and must stay stable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// RPC name for the plugin activation handshake.
pub const API_ACTIVATE: &str = "Plugin.Activate";

/// RPC name for middleware properties queries.
pub const API_PROPERTIES: &str = "MountPointPlugin.MountPointProperties";

/// RPC name for mount-point attachment interposition.
pub const API_ATTACH: &str = "MountPointPlugin.MountPointAttach";

/// RPC name for mount-point detachment interposition.
pub const API_DETACH: &str = "MountPointPlugin.MountPointDetach";

/// Interface name every mount-point middleware plugin implements.
pub const API_IMPLEMENTS: &str = "mountpoint";

/// The type of a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    /// Host directory bind mount
    Bind,
    /// Named or anonymous volume
    Volume,
    /// In-memory tmpfs mount
    Tmpfs,
}

/// Accessibility of a volume: node-local or cluster-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Local,
    Global,
}

/// Mount propagation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Propagation {
    #[serde(rename = "rprivate")]
    RPrivate,
    #[serde(rename = "private")]
    Private,
    #[serde(rename = "rshared")]
    RShared,
    #[serde(rename = "shared")]
    Shared,
    #[serde(rename = "rslave")]
    RSlave,
    #[serde(rename = "slave")]
    Slave,
}

/// Host/container file-system consistency requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    Default,
    Consistent,
    Cached,
    Delegated,
}

/// The representation of a container mount point exposed to mount-point
/// middleware. [`Pattern`] and [`Changes`] are the same shape as this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MountPoint {
    /// Host path after earlier middleware rewrites; equals `Source` until a
    /// middleware changes it.
    pub effective_source: String,
    /// Original host path.
    pub source: String,
    /// Path inside the container.
    pub destination: String,
    pub read_only: bool,
    pub name: String,
    pub driver: String,
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub mount_type: Option<MountType>,
    /// Raw mount option string.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<Propagation>,
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Middleware already applied to this mount, bottom first.
    pub applied_middleware: Vec<AppliedMiddleware>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<Consistency>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub driver_options: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,

    #[serde(skip_serializing_if = "is_zero_i64")]
    pub size_bytes: i64,
    /// File mode bits for tmpfs mounts.
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub mount_mode: u32,

    /// Volume driver options, when the backing volume exposes them.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, String>,
}

/// A middleware application already present on a mount, as exposed to later
/// middleware in the chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppliedMiddleware {
    pub name: String,
    pub changes: Changes,
}

/// The changes a middleware made to a mount, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Changes {
    pub effective_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<Consistency>,
}

impl Changes {
    /// True when the middleware changed nothing.
    pub fn is_empty(&self) -> bool {
        self.effective_source.is_empty() && self.consistency.is_none()
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// A description of a class of mount points. A pattern is a conjunction of
/// its populated sub-patterns; disjunction is expressed by advertising a
/// list of patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Pattern {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub effective_source: Vec<StringPattern>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<StringPattern>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destination: Vec<StringPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<StringPattern>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub driver: Vec<StringPattern>,
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub mount_type: Option<MountType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mode: Vec<StringPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<Propagation>,
    #[serde(rename = "ID", skip_serializing_if = "Vec::is_empty")]
    pub id: Vec<StringPattern>,

    pub applied_middleware: AppliedMiddlewareStackPattern,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<Consistency>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<StringMapPattern>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub driver_options: Vec<StringMapPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<StringMapPattern>,
}

/// A description of a class of applied-middleware stacks. Six quantifiers,
/// each with a negated form that flips the decision for that quantifier
/// alone. Empty lists are vacuously true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppliedMiddlewareStackPattern {
    /// At least one stack element matches each listed pattern.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exists: Vec<AppliedMiddlewarePattern>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_exists: Vec<AppliedMiddlewarePattern>,
    /// Every stack element matches each listed pattern.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<AppliedMiddlewarePattern>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_all: Vec<AppliedMiddlewarePattern>,
    /// The patterns match a contiguous run somewhere in the stack.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub any_sequence: Vec<AppliedMiddlewarePattern>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_any_sequence: Vec<AppliedMiddlewarePattern>,
    /// The patterns match the leading entries of the applied list exactly.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_sequence: Vec<AppliedMiddlewarePattern>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_top_sequence: Vec<AppliedMiddlewarePattern>,
    /// The patterns match the trailing entries of the applied list exactly.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bottom_sequence: Vec<AppliedMiddlewarePattern>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_bottom_sequence: Vec<AppliedMiddlewarePattern>,
    /// The patterns appear in order as a not-necessarily-contiguous
    /// subsequence of the stack.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relative_order: Vec<AppliedMiddlewarePattern>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_relative_order: Vec<AppliedMiddlewarePattern>,
}

/// A description of a class of applied middleware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppliedMiddlewarePattern {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<StringPattern>,
    pub changes: ChangesPattern,
}

/// A description of a class of mount-point changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ChangesPattern {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub effective_source: Vec<StringPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<Consistency>,
}

/// A description of a class of string -> string maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StringMapPattern {
    /// Inverts the decision of the whole map pattern.
    #[serde(skip_serializing_if = "is_false")]
    pub not: bool,

    /// Each listed pair must match at least one map entry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exists: Vec<StringMapKeyValuePattern>,
    /// Each listed pair must be satisfied by every map entry whose key
    /// matches the pair's key pattern.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<StringMapKeyValuePattern>,
}

/// A description of a class of string -> string map key-value pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StringMapKeyValuePattern {
    pub key: StringPattern,
    pub value: StringPattern,
}

/// A description of a class of strings. Populated fields are conjoined;
/// `not` inverts the decision of the populated fields only, so an empty
/// pattern matches everything regardless of `not`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StringPattern {
    #[serde(skip_serializing_if = "is_false")]
    pub not: bool,

    /// Matches the empty string.
    #[serde(skip_serializing_if = "is_false")]
    pub empty: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    /// Prefix match on cleaned POSIX paths, respecting segment boundaries.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub suffix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub exactly: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub contains: String,
}

// ============================================================================
// RPC bodies
// ============================================================================

/// Response to the `Plugin.Activate` handshake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ActivateResponse {
    pub implements: Vec<String>,
}

/// A middleware properties query. Carries no data today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertiesRequest {}

/// Static properties of a middleware: the pattern set for which it
/// receives interposition requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PropertiesResponse {
    pub success: bool,
    pub patterns: Vec<Pattern>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub err: String,
}

/// Attachment interposition request for one container's selected mounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AttachRequest {
    #[serde(rename = "ID")]
    pub id: String,
    pub mounts: Vec<MountPoint>,
}

/// Per-mount attachment decision. `Attachments[i]` pairs with `Mounts[i]`
/// of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Attachment {
    pub attach: bool,
    #[serde(skip_serializing_if = "Changes::is_empty")]
    pub changes: Changes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AttachResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub err: String,
}

/// Detachment request: terminates one clock tick of attachment for the
/// container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetachRequest {
    #[serde(rename = "ID")]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetachResponse {
    pub success: bool,
    /// Whether a failure is merely a container failure (true) or fatal to
    /// detach unwinding (false, the default).
    #[serde(skip_serializing_if = "is_false")]
    pub recoverable: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub err: String,
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
