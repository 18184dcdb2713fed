// portero-core/src/core/grant.rs
// ============================================================================
// Module: Portero Grants
// Description: Time-bounded overrides for require-approval policies.
// Purpose: Represent admin-issued exemptions with explicit expiry.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A grant makes `require-approval` behave as `allow` for any tool matching
//! its pattern while the grant is active. Activity is a pure function of the
//! supplied clock value: a grant is active iff `now < expires_at`.
//!
//! ## Invariants
//! - `expires_at > created_at` for every constructed grant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::GrantId;
use crate::core::pattern::ToolPattern;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while constructing grants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrantError {
    /// Grant lifetime is zero or negative.
    #[error("grant ttl must be positive")]
    NonPositiveTtl,
}

// ============================================================================
// SECTION: Grant Record
// ============================================================================

/// Time-bounded exemption from the require-approval policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Opaque unique identifier.
    pub id: GrantId,
    /// Tool-name pattern the grant covers.
    pub pattern: ToolPattern,
    /// Creation timestamp (unix epoch milliseconds).
    pub created_at: i64,
    /// Expiry timestamp (unix epoch milliseconds).
    pub expires_at: i64,
}

impl Grant {
    /// Builds a grant valid for `ttl_ms` from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::NonPositiveTtl`] when `ttl_ms` is not positive.
    pub fn new(pattern: ToolPattern, now: i64, ttl_ms: i64) -> Result<Self, GrantError> {
        if ttl_ms <= 0 {
            return Err(GrantError::NonPositiveTtl);
        }
        Ok(Self {
            id: GrantId::generate(),
            pattern,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
        })
    }

    /// Returns true while the grant is active at the supplied clock value.
    #[must_use]
    pub const fn is_active(&self, now: i64) -> bool {
        now < self.expires_at
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

    use super::Grant;
    use super::GrantError;
    use crate::core::pattern::ToolPattern;

    #[test]
    fn grant_expires_at_exceeds_created_at() {
        let pattern = ToolPattern::new("github/*").expect("pattern");
        let grant = Grant::new(pattern, 1_000, 60_000).expect("grant");
        assert!(grant.expires_at > grant.created_at);
        assert!(grant.is_active(1_000));
        assert!(grant.is_active(60_999));
        assert!(!grant.is_active(61_000));
    }

    #[test]
    fn zero_ttl_rejected() {
        let pattern = ToolPattern::new("github/*").expect("pattern");
        assert_eq!(Grant::new(pattern, 1_000, 0).expect_err("ttl"), GrantError::NonPositiveTtl);
    }
}
