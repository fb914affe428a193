// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Pattern Evaluator
//
// Pure predicate engine over the wire mount-point descriptor. A pattern is
// a conjunction of its populated sub-patterns; a middleware expresses
// disjunction by advertising several patterns. Nothing in here performs IO
// or logging.

use crate::domain::api::{
    AppliedMiddleware, AppliedMiddlewarePattern, AppliedMiddlewareStackPattern, Changes,
    ChangesPattern, MountPoint, Pattern, StringMapPattern, StringPattern,
};
use std::collections::HashMap;

/// Determines if a pattern matches a mount-point description. Patterns are
/// conjunctions; a higher-level routine must implement disjunction.
pub fn pattern_matches(pattern: &Pattern, mount: &MountPoint) -> bool {
    for p in &pattern.effective_source {
        if !string_pattern_matches(p, &mount.effective_source) {
            return false;
        }
    }

    for p in &pattern.source {
        if !string_pattern_matches(p, &mount.source) {
            return false;
        }
    }

    for p in &pattern.destination {
        if !string_pattern_matches(p, &mount.destination) {
            return false;
        }
    }

    if let Some(read_only) = pattern.read_only {
        if read_only != mount.read_only {
            return false;
        }
    }

    for p in &pattern.name {
        if !string_pattern_matches(p, &mount.name) {
            return false;
        }
    }

    for p in &pattern.driver {
        if !string_pattern_matches(p, &mount.driver) {
            return false;
        }
    }

    if let Some(mount_type) = pattern.mount_type {
        if mount.mount_type != Some(mount_type) {
            return false;
        }
    }

    for p in &pattern.mode {
        if !string_pattern_matches(p, &mount.mode) {
            return false;
        }
    }

    if let Some(propagation) = pattern.propagation {
        if mount.propagation != Some(propagation) {
            return false;
        }
    }

    for p in &pattern.id {
        if !string_pattern_matches(p, &mount.id) {
            return false;
        }
    }

    if !stack_pattern_matches(&pattern.applied_middleware, &mount.applied_middleware) {
        return false;
    }

    if let Some(consistency) = pattern.consistency {
        if mount.consistency != Some(consistency) {
            return false;
        }
    }

    for p in &pattern.labels {
        if !string_map_pattern_matches(p, &mount.labels) {
            return false;
        }
    }

    for p in &pattern.driver_options {
        if !string_map_pattern_matches(p, &mount.driver_options) {
            return false;
        }
    }

    if let Some(scope) = pattern.scope {
        if mount.scope != Some(scope) {
            return false;
        }
    }

    for p in &pattern.options {
        if !string_map_pattern_matches(p, &mount.options) {
            return false;
        }
    }

    true
}

fn stack_pattern_matches(
    pattern: &AppliedMiddlewareStackPattern,
    applied: &[AppliedMiddleware],
) -> bool {
    if !middleware_exist(&pattern.exists, applied, false) {
        return false;
    }
    if !middleware_exist(&pattern.not_exists, applied, true) {
        return false;
    }

    if !middleware_all(&pattern.all, applied, false) {
        return false;
    }
    if !middleware_all(&pattern.not_all, applied, true) {
        return false;
    }

    if !middleware_any_sequence(&pattern.any_sequence, applied, false) {
        return false;
    }
    if !middleware_any_sequence(&pattern.not_any_sequence, applied, true) {
        return false;
    }

    if !middleware_top_sequence(&pattern.top_sequence, applied, false) {
        return false;
    }
    if !middleware_top_sequence(&pattern.not_top_sequence, applied, true) {
        return false;
    }

    if !middleware_bottom_sequence(&pattern.bottom_sequence, applied, false) {
        return false;
    }
    if !middleware_bottom_sequence(&pattern.not_bottom_sequence, applied, true) {
        return false;
    }

    if !middleware_relative_order(&pattern.relative_order, applied, false) {
        return false;
    }
    if !middleware_relative_order(&pattern.not_relative_order, applied, true) {
        return false;
    }

    true
}

fn middleware_exist(
    patterns: &[AppliedMiddlewarePattern],
    applied: &[AppliedMiddleware],
    not: bool,
) -> bool {
    for pattern in patterns {
        let mut matched = false;
        for middleware in applied {
            if applied_middleware_pattern_matches(pattern, middleware) {
                matched = true;
                break;
            }
        }

        if matched == not {
            return false;
        }
    }

    true
}

fn middleware_all(
    patterns: &[AppliedMiddlewarePattern],
    applied: &[AppliedMiddleware],
    not: bool,
) -> bool {
    for pattern in patterns {
        let mut matched = true;
        for middleware in applied {
            if !applied_middleware_pattern_matches(pattern, middleware) {
                matched = false;
                break;
            }
        }

        if matched == not {
            return false;
        }
    }

    true
}

fn middleware_any_sequence(
    patterns: &[AppliedMiddlewarePattern],
    applied: &[AppliedMiddleware],
    not: bool,
) -> bool {
    let sequence_len = patterns.len();
    let applied_len = applied.len();
    if sequence_len > 0 {
        if sequence_len <= applied_len {
            let mut found = false;
            for i in 0..=(applied_len - sequence_len) {
                let mut matched = true;
                for (j, pattern) in patterns.iter().enumerate() {
                    if !applied_middleware_pattern_matches(pattern, &applied[i + j]) {
                        matched = false;
                        break;
                    }
                }
                if matched {
                    found = true;
                    break;
                }
            }
            if found == not {
                return false;
            }
        } else if !not {
            // A sequence longer than the stack cannot match.
            return false;
        }
    }

    true
}

fn middleware_top_sequence(
    patterns: &[AppliedMiddlewarePattern],
    applied: &[AppliedMiddleware],
    not: bool,
) -> bool {
    let sequence_len = patterns.len();
    let applied_len = applied.len();
    if sequence_len > 0 {
        if sequence_len <= applied_len {
            let mut matched = true;
            for (i, pattern) in patterns.iter().enumerate() {
                if !applied_middleware_pattern_matches(pattern, &applied[i]) {
                    matched = false;
                    break;
                }
            }
            if matched == not {
                return false;
            }
        } else if !not {
            return false;
        }
    }

    true
}

fn middleware_bottom_sequence(
    patterns: &[AppliedMiddlewarePattern],
    applied: &[AppliedMiddleware],
    not: bool,
) -> bool {
    let sequence_len = patterns.len();
    let applied_len = applied.len();
    if sequence_len > 0 {
        if sequence_len <= applied_len {
            let mut matched = true;
            let start = applied_len - sequence_len;
            for (i, pattern) in patterns.iter().enumerate() {
                if !applied_middleware_pattern_matches(pattern, &applied[start + i]) {
                    matched = false;
                    break;
                }
            }
            if matched == not {
                return false;
            }
        } else if !not {
            return false;
        }
    }

    true
}

fn middleware_relative_order(
    patterns: &[AppliedMiddlewarePattern],
    applied: &[AppliedMiddleware],
    not: bool,
) -> bool {
    let sequence_len = patterns.len();
    let applied_len = applied.len();
    if sequence_len > 0 {
        if sequence_len <= applied_len {
            let mut remaining = patterns;
            for middleware in applied {
                if remaining.is_empty() {
                    break;
                }

                if applied_middleware_pattern_matches(&remaining[0], middleware) {
                    remaining = &remaining[1..];
                }
            }
            if remaining.is_empty() == not {
                return false;
            }
        } else if !not {
            return false;
        }
    }

    true
}

fn applied_middleware_pattern_matches(
    pattern: &AppliedMiddlewarePattern,
    middleware: &AppliedMiddleware,
) -> bool {
    for p in &pattern.name {
        if !string_pattern_matches(p, &middleware.name) {
            return false;
        }
    }

    if !changes_pattern_matches(&pattern.changes, &middleware.changes) {
        return false;
    }

    true
}

fn changes_pattern_matches(pattern: &ChangesPattern, changes: &Changes) -> bool {
    for p in &pattern.effective_source {
        if !string_pattern_matches(p, &changes.effective_source) {
            return false;
        }
    }

    if let Some(consistency) = pattern.consistency {
        if changes.consistency != Some(consistency) {
            return false;
        }
    }

    true
}

fn string_map_pattern_matches(pattern: &StringMapPattern, map: &HashMap<String, String>) -> bool {
    // These loops could almost certainly be fused, but reasoning about
    // correctness would suffer and patterns or maps are rarely big enough
    // for the constant factor to matter.

    for key_value_pattern in &pattern.exists {
        let mut matched = false;
        for (key, value) in map {
            if string_pattern_matches(&key_value_pattern.key, key)
                && string_pattern_matches(&key_value_pattern.value, value)
            {
                matched = true;
                break;
            }
        }

        if matched == pattern.not {
            return false;
        }
    }

    for key_value_pattern in &pattern.all {
        let mut matched = true;
        for (key, value) in map {
            if string_pattern_matches(&key_value_pattern.key, key) {
                if !string_pattern_matches(&key_value_pattern.value, value) {
                    matched = false;
                    break;
                }
            } else if string_pattern_is_empty(&key_value_pattern.value) {
                // A wildcard value degenerates the pair to "every key must
                // match", so a non-matching key fails it.
                matched = false;
                break;
            }
        }

        if matched == pattern.not {
            return false;
        }
    }

    true
}

fn string_pattern_matches(pattern: &StringPattern, subject: &str) -> bool {
    if pattern.empty && (subject.is_empty() == pattern.not) {
        return false;
    }

    if !pattern.prefix.is_empty() && subject.starts_with(&pattern.prefix) == pattern.not {
        return false;
    }

    if !pattern.path_prefix.is_empty() {
        let clean_subject = clean_path(subject);
        let clean_prefix = clean_path(&pattern.path_prefix);
        let prefix_len = clean_prefix.len();

        let mut matched = clean_subject.starts_with(&clean_prefix);
        if matched && !clean_prefix.ends_with('/') {
            // Require a segment boundary after the prefix.
            if clean_subject.len() > prefix_len && clean_subject.as_bytes()[prefix_len] != b'/' {
                matched = false;
            }
        }

        if matched == pattern.not {
            return false;
        }
    }

    if !pattern.suffix.is_empty() && subject.ends_with(&pattern.suffix) == pattern.not {
        return false;
    }

    if !pattern.exactly.is_empty() && (pattern.exactly == subject) == pattern.not {
        return false;
    }

    if !pattern.contains.is_empty() && subject.contains(&pattern.contains) == pattern.not {
        return false;
    }

    true
}

fn string_pattern_is_empty(pattern: &StringPattern) -> bool {
    !pattern.empty
        && pattern.prefix.is_empty()
        && pattern.path_prefix.is_empty()
        && pattern.suffix.is_empty()
        && pattern.exactly.is_empty()
        && pattern.contains.is_empty()
}

/// Lexical POSIX path cleanup: collapses repeated separators, resolves `.`
/// and `..` segments, and strips any trailing separator. The empty path
/// cleans to `.`.
fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
