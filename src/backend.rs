//! Conversational backend client.
//!
//! The backend is opaque: callgate only relies on the two request shapes in
//! [`crate::protocol::types`] and hands raw JSON replies to the classifier.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::BackendConfig;
use crate::error::{GateError, Result};
use crate::protocol::types::{ChatRequest, ConfirmRequest};

/// Path appended to the chat endpoint for tool-call approvals.
pub const CONFIRM_PATH: &str = "confirm-tool-call";

/// Request/response contract of the conversational backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a user command.
    async fn send_command(&self, request: &ChatRequest) -> Result<Value>;

    /// Relay an approved tool call so the backend can execute it and resume.
    async fn confirm_tool_call(&self, request: &ConfirmRequest) -> Result<Value>;
}

/// JSON-over-HTTP backend.
pub struct HttpChatBackend {
    chat_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpChatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChatBackend")
            .field("chat_url", &self.chat_url)
            .finish()
    }
}

impl HttpChatBackend {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| GateError::Backend(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            chat_url: config.chat_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    pub fn confirm_url(&self) -> String {
        format!("{}/{CONFIRM_PATH}", self.chat_url)
    }

    async fn post_json<B: serde::Serialize + Sync>(&self, url: &str, body: &B) -> Result<Value> {
        tracing::debug!(%url, "posting to backend");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| GateError::Backend(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(GateError::Backend(format!(
                "HTTP {} from {url}: {body_text}",
                status.as_u16()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GateError::Backend(format!("invalid JSON from {url}: {e}")))
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send_command(&self, request: &ChatRequest) -> Result<Value> {
        self.post_json(&self.chat_url, request).await
    }

    async fn confirm_tool_call(&self, request: &ConfirmRequest) -> Result<Value> {
        tracing::info!(
            tool_call_id = %request.tool_call.id,
            tool = %request.tool_call.tool_name,
            "relaying confirmed tool call"
        );
        self.post_json(&self.confirm_url(), request).await
    }
}
