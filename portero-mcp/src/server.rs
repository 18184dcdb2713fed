// portero-mcp/src/server.rs
// ============================================================================
// Module: Portero HTTP Server
// Description: JSON-RPC 2.0 surface over HTTP with a bearer-token gate.
// Purpose: Expose the request pipeline at POST /mcp/message.
// Dependencies: axum, axum-server, rustls, tokio
// ============================================================================

//! ## Overview
//! Two routes: `GET /health` answers unauthenticated with status, timestamp,
//! and version; `POST /mcp/message` carries the JSON-RPC envelope behind the
//! bearer gate. Token comparison never reveals whether the presented token
//! was structurally valid. Malformed JSON yields a parse error (`-32700`),
//! handler failures an internal error (`-32603`). TLS is optional and loaded
//! from PEM paths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::routing::get;
use axum::routing::post;
use portero_config::TlsPaths;
use portero_core::now_ms;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::pipeline::PipelineError;
use crate::pipeline::RequestPipeline;
use crate::route::RouteError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default request body limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
/// MCP protocol revision advertised by `initialize`.
const PROTOCOL_VERSION: &str = "2024-11-05";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration problems, fatal at startup.
    #[error("server config error: {0}")]
    Config(String),
    /// Transport failures while serving.
    #[error("server transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind: SocketAddr,
    /// Bearer token required on `/mcp/message`.
    pub bearer_token: String,
    /// Optional TLS material; plain HTTP when absent.
    pub tls: Option<TlsPaths>,
    /// Request body limit in bytes.
    pub max_body_bytes: usize,
}

/// Gateway HTTP server.
pub struct McpServer {
    /// Server configuration.
    config: ServerConfig,
    /// Request pipeline.
    pipeline: Arc<RequestPipeline>,
}

/// Shared handler state.
struct ServerState {
    /// Request pipeline.
    pipeline: Arc<RequestPipeline>,
    /// Expected bearer token.
    bearer_token: String,
}

impl McpServer {
    /// Builds the server over the pipeline.
    #[must_use]
    pub fn new(config: ServerConfig, pipeline: Arc<RequestPipeline>) -> Self {
        Self {
            config,
            pipeline,
        }
    }

    /// Serves requests until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or TLS setup fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let state = Arc::new(ServerState {
            pipeline: self.pipeline,
            bearer_token: self.config.bearer_token,
        });
        let app = Router::new()
            .route("/health", get(handle_health))
            .route("/mcp/message", post(handle_message))
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .with_state(state);
        if let Some(tls) = &self.config.tls {
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                &tls.cert_path,
                &tls.key_path,
            )
            .await
            .map_err(|err| ServerError::Config(format!("tls load failed: {err}")))?;
            axum_server::bind_rustls(self.config.bind, tls_config)
                .serve(app.into_make_service())
                .await
                .map_err(|err| ServerError::Transport(format!("https server failed: {err}")))
        } else {
            let listener = tokio::net::TcpListener::bind(self.config.bind)
                .await
                .map_err(|err| ServerError::Transport(format!("bind failed: {err}")))?;
            axum::serve(listener, app)
                .await
                .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
        }
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Answers the unauthenticated health probe.
async fn handle_health() -> axum::Json<Value> {
    axum::Json(json!({
        "status": "ok",
        "timestamp": now_ms(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Answers the JSON-RPC endpoint.
async fn handle_message(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> (StatusCode, axum::Json<Value>) {
    let auth = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    let (status, response) = process_message(&state, auth, &bytes).await;
    (status, axum::Json(response))
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier; absent for notifications.
    #[serde(default)]
    id: Value,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    #[serde(default)]
    params: Value,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// Validates, parses, and dispatches one JSON-RPC message.
async fn process_message(
    state: &ServerState,
    auth_header: Option<&str>,
    bytes: &[u8],
) -> (StatusCode, Value) {
    if !authorized(state, auth_header) {
        return respond_error(StatusCode::UNAUTHORIZED, Value::Null, -32001, "unauthorized");
    }
    let request: JsonRpcRequest = match serde_json::from_slice(bytes) {
        Ok(request) => request,
        Err(_) => {
            return respond_error(StatusCode::BAD_REQUEST, Value::Null, -32700, "parse error");
        }
    };
    if request.jsonrpc != "2.0" {
        return respond_error(StatusCode::BAD_REQUEST, request.id, -32600, "invalid request");
    }
    match dispatch(state, &request.method, request.params).await {
        Ok(Some(result)) => respond_result(request.id, result),
        Ok(None) => {
            respond_error(StatusCode::BAD_REQUEST, request.id, -32601, "method not found")
        }
        Err(err) => {
            let (status, code) = classify_error(&err);
            respond_error(status, request.id, code, &err.to_string())
        }
    }
}

/// Dispatches a method; `Ok(None)` means method-not-found.
async fn dispatch(
    state: &ServerState,
    method: &str,
    params: Value,
) -> Result<Option<Value>, PipelineError> {
    match method {
        "initialize" => Ok(Some(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {},
            },
            "serverInfo": {
                "name": "portero",
                "version": env!("CARGO_PKG_VERSION"),
            },
        }))),
        "ping" => Ok(Some(json!({}))),
        method if method.starts_with("notifications/") => Ok(Some(json!({}))),
        "tools/list" => Ok(Some(state.pipeline.tools_list().await)),
        "tools/call" => {
            let name = params
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| PipelineError::InvalidParams("name is required".to_string()))?
                .to_string();
            let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            Ok(Some(state.pipeline.call_tool(&name, arguments).await?))
        }
        "resources/list" => Ok(Some(state.pipeline.resources_list().await)),
        "resources/read" => {
            let uri = params
                .get("uri")
                .and_then(Value::as_str)
                .ok_or_else(|| PipelineError::InvalidParams("uri is required".to_string()))?;
            Ok(Some(state.pipeline.resources_read(uri).await?))
        }
        _ => Ok(None),
    }
}

/// Maps a pipeline error to an HTTP status and JSON-RPC code.
fn classify_error(err: &PipelineError) -> (StatusCode, i64) {
    match err {
        PipelineError::Denied(_) => (StatusCode::OK, -32000),
        PipelineError::InvalidParams(_) => (StatusCode::BAD_REQUEST, -32602),
        PipelineError::Route(RouteError::Name(_) | RouteError::UnknownBackend(_)) => {
            (StatusCode::BAD_REQUEST, -32602)
        }
        PipelineError::Route(RouteError::Backend(_)) => (StatusCode::OK, -32002),
        PipelineError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, -32603),
    }
}

/// Builds a success envelope.
fn respond_result(id: Value, result: Value) -> (StatusCode, Value) {
    let response = JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(result),
        error: None,
    };
    (StatusCode::OK, serde_json::to_value(response).unwrap_or(Value::Null))
}

/// Builds an error envelope.
fn respond_error(
    status: StatusCode,
    id: Value,
    code: i64,
    message: &str,
) -> (StatusCode, Value) {
    let response = JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_string(),
        }),
    };
    (status, serde_json::to_value(response).unwrap_or(Value::Null))
}

// ============================================================================
// SECTION: Authentication
// ============================================================================

/// Checks the bearer token; the reply never distinguishes missing, malformed,
/// and mismatched tokens.
fn authorized(state: &ServerState, auth_header: Option<&str>) -> bool {
    let Some(header) = auth_header else {
        return false;
    };
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") {
        return false;
    }
    constant_time_eq(token.as_bytes(), state.bearer_token.as_bytes())
}

/// Compares two byte strings without early exit on mismatch.
fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in left.iter().zip(right) {
        diff |= a ^ b;
    }
    diff == 0
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

    use std::sync::Arc;

    use axum::http::StatusCode;
    use portero_channel::ActivityDigest;
    use portero_core::NoopAuditSink;
    use portero_core::StaticPolicy;
    use portero_core::runtime::anonymizer::Anonymizer;
    use portero_core::runtime::resolver::PolicyResolver;
    use portero_core::runtime::tasks::TaskManager;
    use portero_store::FileStore;
    use serde_json::json;

    use super::ServerState;
    use super::process_message;
    use crate::aggregate::ToolAggregator;
    use crate::pipeline::PipelineConfig;
    use crate::pipeline::RequestPipeline;
    use crate::registry::BackendRegistry;
    use crate::route::Router;

    fn server_state() -> (tempfile::TempDir, ServerState) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = Arc::new(FileStore::open(dir.path()).expect("store"));
        let registry = Arc::new(BackendRegistry::new());
        let aggregator = Arc::new(ToolAggregator::new(registry.clone()));
        let pipeline = RequestPipeline::new(PipelineConfig {
            registry: registry.clone(),
            aggregator: aggregator.clone(),
            router: Router::new(registry),
            anonymizer: Arc::new(Anonymizer::new(Vec::new()).expect("anonymizer")),
            resolver: Arc::new(PolicyResolver::new(StaticPolicy::default(), store.clone())),
            grants: store.clone(),
            tasks: TaskManager::new(store.clone()),
            channel: None,
            digest: ActivityDigest::disabled(),
            audit: Arc::new(NoopAuditSink),
        });
        let state = ServerState {
            pipeline: Arc::new(pipeline),
            bearer_token: "secret-token".to_string(),
        };
        (dir, state)
    }

    fn body(payload: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&payload).expect("body")
    }

    #[tokio::test]
    async fn missing_bearer_token_yields_401() {
        let (_dir, state) = server_state();
        let payload = body(json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }));
        let (status, response) = process_message(&state, None, &payload).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response["error"]["code"], -32001);
    }

    #[tokio::test]
    async fn wrong_bearer_token_yields_401() {
        let (_dir, state) = server_state();
        let payload = body(json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }));
        let (status, response) =
            process_message(&state, Some("Bearer wrong"), &payload).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response["error"]["message"], "unauthorized");
    }

    #[tokio::test]
    async fn malformed_json_yields_parse_error() {
        let (_dir, state) = server_state();
        let (status, response) =
            process_message(&state, Some("Bearer secret-token"), b"{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn ping_answers_empty_result() {
        let (_dir, state) = server_state();
        let payload = body(json!({ "jsonrpc": "2.0", "id": 7, "method": "ping" }));
        let (status, response) =
            process_message(&state, Some("Bearer secret-token"), &payload).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["id"], 7);
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn initialize_reports_capabilities() {
        let (_dir, state) = server_state();
        let payload = body(json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize" }));
        let (_status, response) =
            process_message(&state, Some("Bearer secret-token"), &payload).await;
        assert_eq!(response["result"]["serverInfo"]["name"], "portero");
        assert!(response["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn notifications_are_no_ops() {
        let (_dir, state) = server_state();
        let payload = body(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "notifications/initialized",
        }));
        let (status, response) =
            process_message(&state, Some("Bearer secret-token"), &payload).await;
        assert_eq!(status, StatusCode::OK);
        assert!(response["error"].is_null());
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let (_dir, state) = server_state();
        let payload = body(json!({ "jsonrpc": "2.0", "id": 3, "method": "bogus/method" }));
        let (status, response) =
            process_message(&state, Some("Bearer secret-token"), &payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn tools_list_always_includes_virtual_tools() {
        let (_dir, state) = server_state();
        let payload = body(json!({ "jsonrpc": "2.0", "id": 4, "method": "tools/list" }));
        let (_status, response) =
            process_message(&state, Some("Bearer secret-token"), &payload).await;
        let tools = response["result"]["tools"].as_array().expect("tools");
        let names: Vec<&str> =
            tools.iter().filter_map(|tool| tool["name"].as_str()).collect();
        assert!(names.contains(&"portero/search_tools"));
        assert!(names.contains(&"portero/call"));
        assert!(names.contains(&"portero/check_task"));
        assert!(names.contains(&"portero/list_tasks"));
    }

    #[tokio::test]
    async fn invalid_jsonrpc_version_is_rejected() {
        let (_dir, state) = server_state();
        let payload = body(json!({ "jsonrpc": "1.0", "id": 5, "method": "ping" }));
        let (status, response) =
            process_message(&state, Some("Bearer secret-token"), &payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], -32600);
    }
}
