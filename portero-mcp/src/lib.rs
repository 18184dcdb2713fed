// portero-mcp/src/lib.rs
// ============================================================================
// Module: Portero Gateway Runtime
// Description: Aggregation, routing, pipeline, executor, and HTTP server.
// Purpose: Expose one policy-mediated tool surface over JSON-RPC/HTTP.
// Dependencies: portero-core, portero-channel, portero-store, axum, tokio
// ============================================================================

//! ## Overview
//! The gateway runtime aggregates backend tool catalogs behind namespaced
//! names, routes calls through the anonymizer and the layered policy
//! resolver, parks approval-gated calls as durable tasks, executes approved
//! tasks in the background, and serves the JSON-RPC surface over HTTP.
//! Security posture: every request is untrusted until the bearer gate and the
//! policy resolver have passed it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod aggregate;
pub mod backend;
pub mod cleanup;
pub mod executor;
pub mod pipeline;
pub mod registry;
pub mod route;
pub mod server;
pub mod virtuals;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aggregate::AggregatedTool;
pub use aggregate::ToolAggregator;
pub use backend::BackendConnection;
pub use backend::BackendError;
pub use backend::HttpBackendClient;
pub use backend::ResourceDescriptor;
pub use backend::ToolDescriptor;
pub use cleanup::CleanupLoop;
pub use executor::TaskExecutor;
pub use pipeline::PipelineConfig;
pub use pipeline::PipelineError;
pub use pipeline::PipelineStatus;
pub use pipeline::RequestPipeline;
pub use registry::BackendRegistry;
pub use route::RouteError;
pub use route::Router;
pub use server::McpServer;
pub use server::ServerConfig;
