// portero-mcp/src/route.rs
// ============================================================================
// Module: Portero Router
// Description: Namespaced dispatch to the owning backend.
// Purpose: Parse `backend/local` identifiers and forward calls and reads.
// Dependencies: portero-core
// ============================================================================

//! ## Overview
//! The router splits names on the first `/` (the remainder may itself contain
//! `/`), selects the owning backend, and forwards post-anonymization
//! arguments. Backend replies return verbatim; backend failures propagate
//! unchanged. Resource reads peel the `backend://` prefix the same way.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use portero_core::BackendName;
use portero_core::NameError;
use portero_core::NamespacedName;
use portero_core::ResourceUri;
use serde_json::Value;
use thiserror::Error;

use crate::backend::BackendError;
use crate::registry::BackendRegistry;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while routing calls and reads.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The identifier could not be parsed.
    #[error(transparent)]
    Name(#[from] NameError),
    /// No backend is registered under the parsed prefix.
    #[error("unknown backend: {0}")]
    UnknownBackend(BackendName),
    /// The backend failed; propagated unchanged.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Dispatches namespaced calls and reads to the owning backend.
#[derive(Clone)]
pub struct Router {
    /// Backend registry.
    registry: Arc<BackendRegistry>,
}

impl Router {
    /// Builds a router over the registry.
    #[must_use]
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            registry,
        }
    }

    /// Dispatches a tool call with post-anonymization arguments.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] for malformed names, unknown backends, or
    /// backend failures.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, RouteError> {
        let parsed = NamespacedName::parse(name)?;
        let connection = self
            .registry
            .connection(&parsed.backend)
            .ok_or_else(|| RouteError::UnknownBackend(parsed.backend.clone()))?;
        Ok(connection.call_tool(&parsed.local, arguments).await?)
    }

    /// Reads a resource through its owning backend.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] for malformed URIs, unknown backends, or
    /// backend failures.
    pub async fn read_resource(&self, uri: &str) -> Result<Value, RouteError> {
        let parsed = ResourceUri::parse(uri)?;
        let connection = self
            .registry
            .connection(&parsed.backend)
            .ok_or_else(|| RouteError::UnknownBackend(parsed.backend.clone()))?;
        Ok(connection.read_resource(&parsed.original).await?)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
