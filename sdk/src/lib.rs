// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! SDK for implementing mount-point middleware plugins.
//!
//! A plugin implements [`MountPointMiddleware`] and serves it with
//! [`serve`]; the host discovers it through a spec file written with
//! [`write_spec_file`]. The wire behavior matches what the chain's RPC
//! client expects: JSON bodies on four POST endpoints, with failing
//! responses carried on a 500 status alongside their body.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stevedore_core::api::{
    ActivateResponse, AttachRequest, AttachResponse, DetachRequest, DetachResponse,
    PropertiesRequest, PropertiesResponse, API_ACTIVATE, API_ATTACH, API_DETACH, API_IMPLEMENTS,
    API_PROPERTIES,
};

/// A mount-point middleware, from the plugin author's side. Failures are
/// expressed in the response bodies, as they travel on the wire.
#[async_trait]
pub trait MountPointMiddleware: Send + Sync + 'static {
    /// The advertised pattern set. Fetched at registration and after host
    /// restarts; cached by the host in between.
    async fn properties(&self) -> PropertiesResponse;

    /// Decides, per selected mount, whether to attach and what to change.
    async fn attach(&self, request: AttachRequest) -> AttachResponse;

    /// Terminates one clock tick of attachment for a container.
    async fn detach(&self, request: DetachRequest) -> DetachResponse;
}

/// Builds the HTTP router exposing a middleware over the wire protocol.
pub fn router(middleware: Arc<dyn MountPointMiddleware>) -> Router {
    Router::new()
        .route(&format!("/{}", API_ACTIVATE), post(activate))
        .route(&format!("/{}", API_PROPERTIES), post(properties))
        .route(&format!("/{}", API_ATTACH), post(attach))
        .route(&format!("/{}", API_DETACH), post(detach))
        .with_state(middleware)
}

/// Serves a middleware on an already-bound listener until the server
/// stops.
pub async fn serve(
    listener: tokio::net::TcpListener,
    middleware: Arc<dyn MountPointMiddleware>,
) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "serving mount-point middleware");
    axum::serve(listener, router(middleware)).await?;
    Ok(())
}

/// Registers a served middleware in a host's plugin directory. The host
/// resolves `plugin:<plugin_name>` through the written spec file.
pub fn write_spec_file(
    plugin_dir: impl AsRef<Path>,
    plugin_name: &str,
    url: &str,
) -> std::io::Result<PathBuf> {
    let plugin_dir = plugin_dir.as_ref();
    std::fs::create_dir_all(plugin_dir)?;
    let path = plugin_dir.join(format!("{}.spec", plugin_name));
    std::fs::write(&path, url)?;
    Ok(path)
}

async fn activate() -> Json<ActivateResponse> {
    Json(ActivateResponse {
        implements: vec![API_IMPLEMENTS.to_string()],
    })
}

async fn properties(
    State(middleware): State<Arc<dyn MountPointMiddleware>>,
    Json(_request): Json<PropertiesRequest>,
) -> impl IntoResponse {
    let response = middleware.properties().await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}

async fn attach(
    State(middleware): State<Arc<dyn MountPointMiddleware>>,
    Json(request): Json<AttachRequest>,
) -> impl IntoResponse {
    let response = middleware.attach(request).await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}

async fn detach(
    State(middleware): State<Arc<dyn MountPointMiddleware>>,
    Json(request): Json<DetachRequest>,
) -> impl IntoResponse {
    let response = middleware.detach(request).await;
    // A recoverable failure is a well-formed answer, not a server error.
    let status = if response.success || response.recoverable {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}
