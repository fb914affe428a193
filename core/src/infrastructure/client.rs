// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Plugin RPC Client
//
// JSON-over-HTTP transport to one middleware plugin: one POST per RPC,
// stateless between calls. Timeouts and cancellation belong to the
// reqwest::Client supplied by the caller and to dropping the in-flight
// future.

use crate::domain::api::{
    ActivateResponse, AttachRequest, AttachResponse, DetachRequest, DetachResponse,
    PropertiesRequest, PropertiesResponse, API_ACTIVATE, API_ATTACH, API_DETACH, API_PROPERTIES,
};
use crate::domain::middleware::MiddlewareError;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Failure of one RPC. Displays as `<call>: <detail>` so the calling layer
/// can name the phase in its own error text.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{call}: {source}")]
    Transport {
        call: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{call}: unexpected status {status}")]
    Status {
        call: &'static str,
        status: StatusCode,
    },

    #[error("{call}: invalid response body: {source}")]
    Body {
        call: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl RpcError {
    /// The RPC that failed.
    pub fn call(&self) -> &'static str {
        match self {
            Self::Transport { call, .. } | Self::Status { call, .. } | Self::Body { call, .. } => {
                call
            }
        }
    }
}

impl From<RpcError> for MiddlewareError {
    fn from(err: RpcError) -> Self {
        let call = err.call();
        let message = match err {
            RpcError::Transport { source, .. } => source.to_string(),
            RpcError::Status { status, .. } => format!("unexpected status {status}"),
            RpcError::Body { source, .. } => format!("invalid response body: {source}"),
        };
        MiddlewareError::new(call, message)
    }
}

/// Client for one middleware plugin endpoint.
#[derive(Debug, Clone)]
pub struct PluginClient {
    plugin_name: String,
    base_url: String,
    http: reqwest::Client,
}

impl PluginClient {
    pub fn new(
        plugin_name: impl Into<String>,
        base_url: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            plugin_name: plugin_name.into(),
            base_url,
            http,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Capability probe issued at registration.
    pub async fn activate(&self) -> Result<ActivateResponse, RpcError> {
        self.post(API_ACTIVATE, &serde_json::json!({})).await
    }

    /// Queries the middleware's advertised pattern set.
    pub async fn properties(
        &self,
        request: &PropertiesRequest,
    ) -> Result<PropertiesResponse, RpcError> {
        self.post(API_PROPERTIES, request).await
    }

    /// Offers the selected mounts of one container for attachment.
    pub async fn attach(&self, request: &AttachRequest) -> Result<AttachResponse, RpcError> {
        self.post(API_ATTACH, request).await
    }

    /// Terminates one clock tick of attachment for one container.
    pub async fn detach(&self, request: &DetachRequest) -> Result<DetachResponse, RpcError> {
        self.post(API_DETACH, request).await
    }

    async fn post<Req, Res>(&self, call: &'static str, request: &Req) -> Result<Res, RpcError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, call);
        tracing::debug!(plugin = %self.plugin_name, call, "middleware rpc");

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| RpcError::Transport { call, source })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| RpcError::Transport { call, source })?;

        if !status.is_success() {
            // A failing middleware may still answer with a well-formed
            // body, e.g. a recoverable detach failure; surface that body
            // rather than the status.
            if let Ok(parsed) = serde_json::from_slice::<Res>(&body) {
                return Ok(parsed);
            }
            return Err(RpcError::Status { call, status });
        }

        serde_json::from_slice(&body).map_err(|source| RpcError::Body { call, source })
    }
}
