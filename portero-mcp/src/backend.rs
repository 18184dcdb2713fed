// portero-mcp/src/backend.rs
// ============================================================================
// Module: Portero Backend Connections
// Description: Dispatch seam to backend tool providers.
// Purpose: Speak JSON-RPC 2.0 to backends over HTTP.
// Dependencies: reqwest, serde_json, async-trait
// ============================================================================

//! ## Overview
//! A backend connection lists tools and resources and dispatches calls. The
//! shipped implementation speaks JSON-RPC 2.0 over HTTP with an optional
//! bearer token; per-backend child-process transports are external
//! collaborators that plug into the same trait. Backend replies are returned
//! verbatim; failures propagate unchanged to the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of a backend response body in bytes.
const MAX_BACKEND_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
/// Request timeout applied to backend dispatches.
const BACKEND_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// JSON-RPC request id counter shared across backend clients.
static JSON_RPC_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by backend connections.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced a usable response.
    #[error("backend request failed: {0}")]
    Transport(String),
    /// The backend answered with a JSON-RPC error.
    #[error("{0}")]
    Rpc(String),
    /// The response could not be interpreted.
    #[error("backend response invalid: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// SECTION: Descriptors
// ============================================================================

/// Tool descriptor as reported by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Local tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Input schema; opaque to the gateway.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Resource descriptor as reported by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Resource URI in the backend's own scheme.
    pub uri: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
}

// ============================================================================
// SECTION: Connection Trait
// ============================================================================

/// Dispatch handle to one backend tool provider.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    /// Lists the backend's tool catalog.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the backend cannot be queried.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BackendError>;

    /// Invokes a tool and returns the raw reply verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when dispatch fails; backend-reported
    /// failures propagate unchanged.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, BackendError>;

    /// Lists the backend's resources.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the backend cannot be queried.
    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, BackendError>;

    /// Reads a resource by the backend's original URI.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the read fails.
    async fn read_resource(&self, uri: &str) -> Result<Value, BackendError>;
}

// ============================================================================
// SECTION: HTTP Client
// ============================================================================

/// JSON-RPC response envelope from a backend.
#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    /// Successful result payload.
    result: Option<Value>,
    /// Error payload when the request failed.
    error: Option<RpcError>,
}

/// JSON-RPC error payload from a backend.
#[derive(Debug, Deserialize)]
struct RpcError {
    /// Error message.
    message: String,
}

/// Backend connection over JSON-RPC 2.0 / HTTP.
pub struct HttpBackendClient {
    /// Backend endpoint URL.
    url: String,
    /// Optional bearer token presented to the backend.
    bearer_token: Option<String>,
    /// Shared HTTP client.
    client: reqwest::Client,
}

impl HttpBackendClient {
    /// Builds a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transport`] when the HTTP client cannot be
    /// constructed.
    pub fn new(url: impl Into<String>, bearer_token: Option<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(BACKEND_REQUEST_TIMEOUT)
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        Ok(Self {
            url: url.into(),
            bearer_token,
            client,
        })
    }

    /// Issues one JSON-RPC request and returns the result payload.
    async fn rpc(&self, method: &str, params: Value) -> Result<Value, BackendError> {
        let id = JSON_RPC_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response =
            request.send().await.map_err(|err| BackendError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Transport(format!("http status {status}")));
        }
        let bytes =
            response.bytes().await.map_err(|err| BackendError::Transport(err.to_string()))?;
        if bytes.len() > MAX_BACKEND_RESPONSE_BYTES {
            return Err(BackendError::InvalidResponse("response too large".to_string()));
        }
        let envelope: RpcEnvelope = serde_json::from_slice(&bytes)
            .map_err(|err| BackendError::InvalidResponse(err.to_string()))?;
        if let Some(error) = envelope.error {
            return Err(BackendError::Rpc(error.message));
        }
        envelope
            .result
            .ok_or_else(|| BackendError::InvalidResponse("missing result".to_string()))
    }
}

#[async_trait]
impl BackendConnection for HttpBackendClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BackendError> {
        let result = self.rpc("tools/list", json!({})).await?;
        let tools = result
            .get("tools")
            .cloned()
            .ok_or_else(|| BackendError::InvalidResponse("missing tools".to_string()))?;
        serde_json::from_value(tools).map_err(|err| BackendError::InvalidResponse(err.to_string()))
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, BackendError> {
        self.rpc(
            "tools/call",
            json!({
                "name": name,
                "arguments": arguments,
            }),
        )
        .await
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, BackendError> {
        let result = self.rpc("resources/list", json!({})).await?;
        let resources = result
            .get("resources")
            .cloned()
            .ok_or_else(|| BackendError::InvalidResponse("missing resources".to_string()))?;
        serde_json::from_value(resources)
            .map_err(|err| BackendError::InvalidResponse(err.to_string()))
    }

    async fn read_resource(&self, uri: &str) -> Result<Value, BackendError> {
        self.rpc(
            "resources/read",
            json!({
                "uri": uri,
            }),
        )
        .await
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use serde_json::json;

    use super::ToolDescriptor;

    #[test]
    fn tool_descriptor_accepts_missing_optional_fields() {
        let descriptor: ToolDescriptor =
            serde_json::from_value(json!({ "name": "read_file" })).expect("descriptor");
        assert_eq!(descriptor.name, "read_file");
        assert_eq!(descriptor.description, "");
        assert_eq!(descriptor.input_schema, serde_json::Value::Null);
    }

    #[test]
    fn tool_descriptor_reads_camel_case_schema() {
        let descriptor: ToolDescriptor = serde_json::from_value(json!({
            "name": "read_file",
            "description": "Reads a file",
            "inputSchema": { "type": "object" },
        }))
        .expect("descriptor");
        assert_eq!(descriptor.input_schema, json!({ "type": "object" }));
    }
}
