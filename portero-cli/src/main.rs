// portero-cli/src/main.rs
// ============================================================================
// Module: Portero CLI Entry Point
// Description: Command dispatcher for the Portero gateway.
// Purpose: Load configuration and run the gateway with its background loops.
// Dependencies: clap, portero-config, portero-mcp, tokio
// ============================================================================

//! ## Overview
//! The CLI exposes one command: `serve`. It loads the three configuration
//! documents, opens the file-backed state store and audit stream, connects
//! the configured backends over HTTP, wires the approval channel and its
//! background loops, and serves the JSON-RPC surface until the process
//! exits. Secrets come exclusively from the environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use portero_channel::ActivityDigest;
use portero_channel::ApprovalChannel;
use portero_channel::ApprovalChannelConfig;
use portero_channel::ChatTransport;
use portero_channel::LogChatTransport;
use portero_channel::PairingGuard;
use portero_channel::digest::DEFAULT_BATCH_WINDOW;
use portero_config::ConfigError;
use portero_config::GatewayConfig;
use portero_config::ServerEnv;
use portero_core::BackendName;
use portero_core::StoreError;
use portero_core::core::replacement::ReplacementError;
use portero_core::runtime::anonymizer::Anonymizer;
use portero_core::runtime::resolver::PolicyResolver;
use portero_core::runtime::tasks::TaskManager;
use portero_mcp::BackendError;
use portero_mcp::BackendRegistry;
use portero_mcp::CleanupLoop;
use portero_mcp::HttpBackendClient;
use portero_mcp::McpServer;
use portero_mcp::PipelineConfig;
use portero_mcp::PipelineStatus;
use portero_mcp::RequestPipeline;
use portero_mcp::Router;
use portero_mcp::ServerConfig;
use portero_mcp::TaskExecutor;
use portero_mcp::ToolAggregator;
use portero_mcp::server::DEFAULT_MAX_BODY_BYTES;
use portero_mcp::server::ServerError;
use portero_store::FileAuditStream;
use portero_store::FileStore;
use thiserror::Error;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Capacity of the approved-task queue between channel and executor.
const EXECUTOR_QUEUE_CAPACITY: usize = 256;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "portero", version, about = "Policy-mediating MCP gateway")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway.
    Serve(ServeCommand),
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Directory holding backends.toml, replacements.toml, policies.toml.
    #[arg(long, value_name = "DIR", default_value = "config")]
    config_dir: PathBuf,
    /// Directory holding the durable collections and the audit stream.
    #[arg(long, value_name = "DIR", default_value = "state")]
    state_dir: PathBuf,
    /// Listen address for the HTTP surface.
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:8443")]
    bind: SocketAddr,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal startup errors.
#[derive(Debug, Error)]
enum ServeError {
    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Durable state could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Replacement rules failed validation.
    #[error(transparent)]
    Replacements(#[from] ReplacementError),
    /// A backend client could not be constructed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The HTTP server failed.
    #[error(transparent)]
    Server(#[from] ServerError),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => run_serve(command),
    }
}

/// Builds the runtime and serves until the process exits.
fn run_serve(command: ServeCommand) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "portero: runtime start failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(serve(command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "portero: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Wires every subsystem and runs the HTTP server.
async fn serve(command: ServeCommand) -> Result<(), ServeError> {
    let env = ServerEnv::from_env()?;
    let config = GatewayConfig::load(&command.config_dir)?;

    let store = Arc::new(FileStore::open(&command.state_dir)?);
    let audit = Arc::new(FileAuditStream::open(&command.state_dir)?);

    let mut registry = BackendRegistry::new();
    for backend in &config.backends {
        let client = HttpBackendClient::new(&backend.url, backend.bearer_token.clone())?;
        registry.insert(
            BackendName::new(backend.name.as_str()),
            Arc::new(client),
            backend.pinned_tools.clone(),
        );
    }
    let registry = Arc::new(registry);

    let aggregator = Arc::new(ToolAggregator::new(registry.clone()));
    let router = Router::new(registry.clone());
    let anonymizer = Arc::new(Anonymizer::new(config.replacements.clone())?);
    let resolver =
        Arc::new(PolicyResolver::new(config.policies.to_static_policy(), store.clone()));
    let tasks = TaskManager::new(store.clone());

    // The chat-bot library is pluggable; this build ships the log transport.
    if env.channel_token.is_some() {
        let _ = writeln!(
            std::io::stderr(),
            "portero: WARNING: no chat transport compiled in; approval messages go to stderr"
        );
    }
    let transport: Arc<dyn ChatTransport> = Arc::new(LogChatTransport::new());
    let pairing = PairingGuard::new(store.clone(), env.pairing_secret.clone());
    let digest = ActivityDigest::spawn(transport.clone(), pairing.clone(), DEFAULT_BATCH_WINDOW);

    let (executor_tx, executor_rx) = mpsc::channel(EXECUTOR_QUEUE_CAPACITY);
    let channel = Arc::new(
        ApprovalChannel::new(
            transport,
            pairing,
            tasks.clone(),
            store.clone(),
            store.clone(),
            executor_tx,
            ApprovalChannelConfig {
                short_grant_ttl_ms: config.policies.grants.short_ttl_ms,
                long_grant_ttl_ms: config.policies.grants.long_ttl_ms,
            },
        )
        .with_audit(audit.clone())
        .with_status_source(Arc::new(PipelineStatus::new(
            registry.clone(),
            aggregator.clone(),
        ))),
    );

    let executor = TaskExecutor::new(
        router.clone(),
        anonymizer.clone(),
        tasks.clone(),
        registry.clone(),
        digest.clone(),
        audit.clone(),
        executor_rx,
    );
    tokio::spawn(executor.run());
    tokio::spawn(channel.clone().run_listener());
    {
        let channel = channel.clone();
        tokio::spawn(async move {
            channel.probe_startup().await;
        });
    }
    let cleanup =
        CleanupLoop::new(store.clone(), store.clone(), config.policies.grants.approval_ttl_ms);
    tokio::spawn(cleanup.run());

    let pipeline = Arc::new(RequestPipeline::new(PipelineConfig {
        registry,
        aggregator,
        router,
        anonymizer,
        resolver,
        grants: store.clone(),
        tasks,
        channel: Some(channel),
        digest,
        audit: audit.clone(),
    }));

    let _ = writeln!(
        std::io::stderr(),
        "portero: serving {} backends on {} ({} skipped)",
        config.backends.len(),
        command.bind,
        config.skipped_backends.len()
    );
    let server = McpServer::new(
        ServerConfig {
            bind: command.bind,
            bearer_token: env.bearer_token,
            tls: env.tls,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        },
        pipeline,
    );
    Ok(server.serve().await?)
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

    use clap::Parser;

    use super::Cli;
    use super::Commands;

    #[test]
    fn serve_parses_defaults() {
        let cli = Cli::try_parse_from(["portero", "serve"]).expect("parse");
        let Commands::Serve(command) = cli.command;
        assert_eq!(command.config_dir.to_str(), Some("config"));
        assert_eq!(command.state_dir.to_str(), Some("state"));
        assert_eq!(command.bind.to_string(), "127.0.0.1:8443");
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "portero",
            "serve",
            "--config-dir",
            "/etc/portero",
            "--state-dir",
            "/var/lib/portero",
            "--bind",
            "0.0.0.0:9000",
        ])
        .expect("parse");
        let Commands::Serve(command) = cli.command;
        assert_eq!(command.config_dir.to_str(), Some("/etc/portero"));
        assert_eq!(command.bind.to_string(), "0.0.0.0:9000");
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["portero", "bogus"]).is_err());
    }
}
