// portero-config/src/lib.rs
// ============================================================================
// Module: Portero Configuration
// Description: Configuration documents and environment wiring.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: portero-core, serde, toml
// ============================================================================

//! ## Overview
//! Portero loads three TOML documents from a configuration directory —
//! `backends.toml`, `replacements.toml`, and `policies.toml` — and reads
//! secrets from the environment. `${VAR}` placeholders inside documents are
//! substituted from the environment; an unresolved placeholder skips the
//! owning backend or replacement rule at startup without failing the rest.
//! Everything else fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod env;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::BackendConfig;
pub use config::ConfigError;
pub use config::GatewayConfig;
pub use config::GrantSettings;
pub use config::PoliciesConfig;
pub use config::ServerEnv;
pub use config::TlsPaths;
pub use env::substitute;
