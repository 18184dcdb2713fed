// portero-core/src/core/name.rs
// ============================================================================
// Module: Portero Namespaced Names
// Description: Namespaced tool names and resource URIs exposed upstream.
// Purpose: Parse and format `backend/local` names and `backend://` URIs.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Aggregated tools are exposed upstream as `backend/local-name`, where the
//! backend prefix is the registry key and the remainder (which may itself
//! contain `/`) is the identifier used by that backend. Resource URIs follow
//! the same convention as `backend://original-uri`. Parsing splits on the
//! first separator only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::BackendName;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing namespaced names and resource URIs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    /// Tool name is missing the `backend/local` separator.
    #[error("malformed tool name (expected backend/local): {0}")]
    MalformedName(String),
    /// Resource URI is missing the `backend://` prefix.
    #[error("malformed resource uri (expected backend://uri): {0}")]
    MalformedUri(String),
}

// ============================================================================
// SECTION: Namespaced Tool Names
// ============================================================================

/// Fully namespaced tool name of the form `backend/local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespacedName {
    /// Backend namespace prefix.
    pub backend: BackendName,
    /// Local tool name used by the owning backend; may contain `/`.
    pub local: String,
}

impl NamespacedName {
    /// Builds a namespaced name from its parts.
    #[must_use]
    pub fn new(backend: BackendName, local: impl Into<String>) -> Self {
        Self {
            backend,
            local: local.into(),
        }
    }

    /// Parses a `backend/local` name, splitting on the first `/`.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::MalformedName`] when the separator is missing or
    /// either side is empty.
    pub fn parse(name: &str) -> Result<Self, NameError> {
        let (backend, local) =
            name.split_once('/').ok_or_else(|| NameError::MalformedName(name.to_string()))?;
        if backend.is_empty() || local.is_empty() {
            return Err(NameError::MalformedName(name.to_string()));
        }
        Ok(Self {
            backend: BackendName::new(backend),
            local: local.to_string(),
        })
    }

    /// Returns the full `backend/local` form.
    #[must_use]
    pub fn full(&self) -> String {
        format!("{}/{}", self.backend, self.local)
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.backend, self.local)
    }
}

// ============================================================================
// SECTION: Resource URIs
// ============================================================================

/// Namespaced resource URI of the form `backend://original-uri`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUri {
    /// Backend namespace prefix.
    pub backend: BackendName,
    /// Original URI understood by the owning backend.
    pub original: String,
}

impl ResourceUri {
    /// Builds a resource URI from its parts.
    #[must_use]
    pub fn new(backend: BackendName, original: impl Into<String>) -> Self {
        Self {
            backend,
            original: original.into(),
        }
    }

    /// Parses a `backend://original-uri` value, peeling the backend prefix.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::MalformedUri`] when the `://` separator is missing
    /// or the backend prefix is empty.
    pub fn parse(uri: &str) -> Result<Self, NameError> {
        let (backend, original) =
            uri.split_once("://").ok_or_else(|| NameError::MalformedUri(uri.to_string()))?;
        if backend.is_empty() {
            return Err(NameError::MalformedUri(uri.to_string()));
        }
        Ok(Self {
            backend: BackendName::new(backend),
            original: original.to_string(),
        })
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.backend, self.original)
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

    use super::NameError;
    use super::NamespacedName;
    use super::ResourceUri;

    #[test]
    fn parse_splits_on_first_separator() {
        let name = NamespacedName::parse("filesystem/read/deep").expect("name");
        assert_eq!(name.backend.as_str(), "filesystem");
        assert_eq!(name.local, "read/deep");
        assert_eq!(name.full(), "filesystem/read/deep");
    }

    #[test]
    fn parse_rejects_missing_separator() {
        let err = NamespacedName::parse("filesystem").expect_err("malformed");
        assert_eq!(err, NameError::MalformedName("filesystem".to_string()));
    }

    #[test]
    fn parse_rejects_empty_sides() {
        assert!(NamespacedName::parse("/read_file").is_err());
        assert!(NamespacedName::parse("filesystem/").is_err());
    }

    #[test]
    fn resource_uri_peels_backend_prefix() {
        let uri = ResourceUri::parse("drive://files/2024/report.txt").expect("uri");
        assert_eq!(uri.backend.as_str(), "drive");
        assert_eq!(uri.original, "files/2024/report.txt");
    }

    #[test]
    fn resource_uri_rejects_missing_scheme() {
        assert!(ResourceUri::parse("files/report.txt").is_err());
    }
}
