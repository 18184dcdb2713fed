// portero-core/src/core/replacement.rs
// ============================================================================
// Module: Portero Replacement Rules
// Description: Literal substitution rules between fake and real values.
// Purpose: Define the process-scoped records driving the anonymizer.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A replacement rule maps a caller-visible `fake` literal to the `real`
//! value dispatched to backends. Bidirectional rules invert on responses;
//! one-way rules substitute a response replacement (or a fixed redaction
//! token) so the real value never reaches the caller. Rules are loaded at
//! startup and never change for the life of the process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Redaction token substituted for one-way rules without an explicit
/// response replacement.
pub const REDACTED_TOKEN: &str = "***REDACTED***";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while validating replacement rules.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplacementError {
    /// The `fake` side of a rule is empty.
    #[error("replacement rule {0}: fake must not be empty")]
    EmptyFake(usize),
}

// ============================================================================
// SECTION: Replacement Rule
// ============================================================================

/// Literal substitution rule between caller-facing and backend-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRule {
    /// Caller-visible literal; never empty.
    pub fake: String,
    /// Backend-facing literal substituted inbound.
    pub real: String,
    /// Whether responses rewrite `real` back to `fake`.
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
    /// Whether matching is case-sensitive.
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
    /// Replacement emitted for `real` in responses of one-way rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_replacement: Option<String>,
}

const fn default_bidirectional() -> bool {
    true
}

const fn default_case_sensitive() -> bool {
    true
}

impl ReplacementRule {
    /// Returns the text substituted for `real` in outbound rewrites.
    #[must_use]
    pub fn outbound_replacement(&self) -> &str {
        if self.bidirectional {
            &self.fake
        } else {
            self.response_replacement.as_deref().unwrap_or(REDACTED_TOKEN)
        }
    }
}

/// Validates a loaded rule set.
///
/// # Errors
///
/// Returns [`ReplacementError`] naming the first invalid rule index.
pub fn validate_rules(rules: &[ReplacementRule]) -> Result<(), ReplacementError> {
    for (index, rule) in rules.iter().enumerate() {
        if rule.fake.is_empty() {
            return Err(ReplacementError::EmptyFake(index));
        }
    }
    Ok(())
}
