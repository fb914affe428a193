// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures for the chain suites: recording middleware (in-process
//! and HTTP-served), the advertised pattern sets exercised by the
//! scenarios, and mount constructors.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use stevedore_core::api::{
    AttachRequest, AttachResponse, DetachRequest, DetachResponse, MountType, Pattern,
    PropertiesResponse, Scope, StringMapKeyValuePattern, StringMapPattern, StringPattern,
    API_IMPLEMENTS,
};
use stevedore_core::domain::mount::{MountSpec, VolumeOptions};
use stevedore_core::{ContainerMount, Middleware, MiddlewareError, Volume};

/// Shared, ordered record of plugin events (`<name>:properties`,
/// `<name>:attach`, `<name>:detach`).
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

// ============================================================================
// Advertised pattern sets
// ============================================================================

fn exactly(s: &str) -> StringPattern {
    StringPattern {
        exactly: s.to_string(),
        ..Default::default()
    }
}

/// Matches every bind mount.
pub fn bind_pattern() -> Pattern {
    Pattern {
        mount_type: Some(MountType::Bind),
        ..Default::default()
    }
}

/// Matches every local-driver volume mount.
pub fn local_volume_pattern() -> Pattern {
    Pattern {
        mount_type: Some(MountType::Volume),
        driver: vec![exactly("local")],
        ..Default::default()
    }
}

/// Matches local volumes created with `o=...bind...`.
pub fn local_bind_options_pattern() -> Pattern {
    Pattern {
        mount_type: Some(MountType::Volume),
        driver: vec![exactly("local")],
        options: vec![StringMapPattern {
            exists: vec![StringMapKeyValuePattern {
                key: exactly("o"),
                value: StringPattern {
                    contains: "bind".to_string(),
                    ..Default::default()
                },
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Matches anonymous local volumes: no o/device/type options.
pub fn anonymous_local_volume_pattern() -> Pattern {
    Pattern {
        mount_type: Some(MountType::Volume),
        driver: vec![exactly("local")],
        options: vec![StringMapPattern {
            not: true,
            exists: vec![
                StringMapKeyValuePattern {
                    key: exactly("o"),
                    ..Default::default()
                },
                StringMapKeyValuePattern {
                    key: exactly("device"),
                    ..Default::default()
                },
                StringMapKeyValuePattern {
                    key: exactly("type"),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn m0_patterns() -> Vec<Pattern> {
    vec![bind_pattern()]
}

pub fn m1_patterns() -> Vec<Pattern> {
    vec![bind_pattern(), local_volume_pattern()]
}

pub fn m2_patterns() -> Vec<Pattern> {
    vec![local_bind_options_pattern()]
}

pub fn m3_patterns() -> Vec<Pattern> {
    vec![anonymous_local_volume_pattern()]
}

pub fn m4_patterns() -> Vec<Pattern> {
    vec![bind_pattern(), local_bind_options_pattern()]
}

// ============================================================================
// Mounts
// ============================================================================

#[derive(Debug)]
pub struct TestVolume {
    name: String,
    driver: String,
    options: HashMap<String, String>,
}

impl Volume for TestVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn driver_name(&self) -> &str {
        &self.driver
    }

    fn options(&self) -> HashMap<String, String> {
        self.options.clone()
    }

    fn scope(&self) -> Option<Scope> {
        Some(Scope::Local)
    }
}

pub fn bind_mount(source: &str, destination: &str) -> ContainerMount {
    ContainerMount {
        source: source.to_string(),
        destination: destination.to_string(),
        rw: true,
        mount_type: Some(MountType::Bind),
        ..Default::default()
    }
}

fn local_volume_mount(destination: &str, options: &[(&str, &str)]) -> ContainerMount {
    let name = format!("vol-{}", uuid::Uuid::new_v4());
    ContainerMount {
        source: format!("/var/lib/volumes/{}/_data", name),
        destination: destination.to_string(),
        rw: true,
        driver: "local".to_string(),
        mount_type: Some(MountType::Volume),
        spec: MountSpec {
            volume_options: Some(VolumeOptions::default()),
            ..Default::default()
        },
        volume: Some(Arc::new(TestVolume {
            driver: "local".to_string(),
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            name,
        })),
        ..Default::default()
    }
}

/// `-v /anon`: an anonymous local volume with no driver options.
pub fn anonymous_volume_mount(destination: &str) -> ContainerMount {
    local_volume_mount(destination, &[])
}

/// A local volume created with `--opt device=/etc --opt o=ro,bind`.
pub fn local_bind_volume_mount(destination: &str) -> ContainerMount {
    local_volume_mount(destination, &[("device", "/etc"), ("o", "ro,bind")])
}

/// A local volume created with `--opt type=tmpfs --opt device=tmpfs`.
pub fn tmpfs_backed_volume_mount(destination: &str) -> ContainerMount {
    local_volume_mount(destination, &[("type", "tmpfs"), ("device", "tmpfs")])
}

pub fn container_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Attach response accepting `count` mounts without changes.
pub fn accept(count: usize) -> AttachResponse {
    AttachResponse {
        success: true,
        attachments: (0..count)
            .map(|_| stevedore_core::api::Attachment {
                attach: true,
                ..Default::default()
            })
            .collect(),
        err: String::new(),
    }
}

// ============================================================================
// In-process recording middleware
// ============================================================================

/// In-process middleware that records events and plays back scripted
/// responses, mirroring how plugin test servers behave on the wire.
pub struct RecordingMiddleware {
    name: String,
    patterns: Vec<Pattern>,
    log: EventLog,
    attach_response: Mutex<AttachResponse>,
    detach_response: Mutex<DetachResponse>,
    attach_requests: Mutex<Vec<AttachRequest>>,
}

impl RecordingMiddleware {
    pub fn new(name: &str, patterns: Vec<Pattern>, log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            patterns,
            log,
            attach_response: Mutex::new(AttachResponse {
                success: true,
                ..Default::default()
            }),
            detach_response: Mutex::new(DetachResponse {
                success: true,
                ..Default::default()
            }),
            attach_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_attach_response(&self, response: AttachResponse) {
        *self.attach_response.lock().unwrap() = response;
    }

    pub fn set_detach_response(&self, response: DetachResponse) {
        *self.detach_response.lock().unwrap() = response;
    }

    pub fn attach_requests(&self) -> Vec<AttachRequest> {
        self.attach_requests.lock().unwrap().clone()
    }

    pub fn attach_count(&self) -> usize {
        self.attach_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Middleware for RecordingMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    fn plugin_name(&self) -> &str {
        ""
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    async fn attach(&self, request: &AttachRequest) -> Result<AttachResponse, MiddlewareError> {
        self.attach_requests.lock().unwrap().push(request.clone());
        self.log.push(format!("{}:attach", self.name));
        Ok(self.attach_response.lock().unwrap().clone())
    }

    async fn detach(&self, _request: &DetachRequest) -> Result<DetachResponse, MiddlewareError> {
        self.log.push(format!("{}:detach", self.name));
        Ok(self.detach_response.lock().unwrap().clone())
    }
}

// ============================================================================
// HTTP plugin servers
// ============================================================================

pub struct PluginServerState {
    name: String,
    log: EventLog,
    implements: Vec<String>,
    properties: Mutex<PropertiesResponse>,
    attach: Mutex<AttachResponse>,
    detach: Mutex<DetachResponse>,
    attach_requests: Mutex<Vec<AttachRequest>>,
}

/// A middleware plugin served over HTTP, shaped like the wire test servers
/// the protocol was developed against.
pub struct PluginServer {
    pub url: String,
    state: Arc<PluginServerState>,
}

impl PluginServer {
    pub async fn start(name: &str, patterns: Vec<Pattern>, log: EventLog) -> Self {
        Self::start_with_implements(name, patterns, log, vec![API_IMPLEMENTS.to_string()]).await
    }

    pub async fn start_with_implements(
        name: &str,
        patterns: Vec<Pattern>,
        log: EventLog,
        implements: Vec<String>,
    ) -> Self {
        let state = Arc::new(PluginServerState {
            name: name.to_string(),
            log,
            implements,
            properties: Mutex::new(PropertiesResponse {
                success: true,
                patterns,
                err: String::new(),
            }),
            attach: Mutex::new(AttachResponse {
                success: true,
                ..Default::default()
            }),
            detach: Mutex::new(DetachResponse {
                success: true,
                ..Default::default()
            }),
            attach_requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/Plugin.Activate", post(activate))
            .route("/MountPointPlugin.MountPointProperties", post(properties))
            .route("/MountPointPlugin.MountPointAttach", post(attach))
            .route("/MountPointPlugin.MountPointDetach", post(detach))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    /// Registers this server in a plugin spec directory.
    pub fn write_spec(&self, dir: &Path, plugin_name: &str) {
        std::fs::write(dir.join(format!("{}.spec", plugin_name)), &self.url).unwrap();
    }

    pub fn set_attach_response(&self, response: AttachResponse) {
        *self.state.attach.lock().unwrap() = response;
    }

    pub fn set_detach_response(&self, response: DetachResponse) {
        *self.state.detach.lock().unwrap() = response;
    }

    pub fn attach_requests(&self) -> Vec<AttachRequest> {
        self.state.attach_requests.lock().unwrap().clone()
    }
}

async fn activate(State(state): State<Arc<PluginServerState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "Implements": state.implements }))
}

async fn properties(State(state): State<Arc<PluginServerState>>) -> impl IntoResponse {
    state.log.push(format!("{}:properties", state.name));
    let response = state.properties.lock().unwrap().clone();
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}

async fn attach(
    State(state): State<Arc<PluginServerState>>,
    Json(request): Json<AttachRequest>,
) -> impl IntoResponse {
    state.attach_requests.lock().unwrap().push(request);
    state.log.push(format!("{}:attach", state.name));
    let response = state.attach.lock().unwrap().clone();
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}

async fn detach(
    State(state): State<Arc<PluginServerState>>,
    Json(_request): Json<DetachRequest>,
) -> impl IntoResponse {
    state.log.push(format!("{}:detach", state.name));
    let response = state.detach.lock().unwrap().clone();
    let status = if response.success || response.recoverable {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}
