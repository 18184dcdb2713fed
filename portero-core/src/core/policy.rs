// portero-core/src/core/policy.rs
// ============================================================================
// Module: Portero Policy Model
// Description: Policy actions, decisions, and static/dynamic rule records.
// Purpose: Provide the records consumed by the layered policy resolver.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Policy entries map tool-name patterns to an action. Static entries come
//! from configuration and never change at runtime; dynamic rules are
//! persisted, admin-editable, and override configuration. The resolver in
//! [`crate::runtime::resolver`] is the only component authorized to consult
//! these records for authorization purposes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RuleId;

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Action a policy entry assigns to matching tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyAction {
    /// Dispatch without admin involvement.
    Allow,
    /// Reject the call outright.
    Deny,
    /// Park the call as a task pending admin approval.
    RequireApproval,
}

impl PolicyAction {
    /// Returns the canonical wire label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::RequireApproval => "require-approval",
        }
    }
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Provenance of a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicySource {
    /// Persisted, admin-editable rule.
    DynamicRule,
    /// Exact tool-name entry from configuration.
    StaticExact,
    /// Pattern entry from configuration.
    StaticPattern,
    /// Configured default action.
    Default,
}

/// Resolved policy decision with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Action to apply.
    pub action: PolicyAction,
    /// Layer the decision came from.
    pub source: PolicySource,
    /// Matching pattern text, when the source carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Matching dynamic rule identifier, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,
}

// ============================================================================
// SECTION: Dynamic Rules
// ============================================================================

/// Persisted, admin-editable policy rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicRule {
    /// Opaque unique identifier.
    pub id: RuleId,
    /// Tool-name pattern text.
    pub pattern: String,
    /// Action applied when the pattern matches.
    pub action: PolicyAction,
    /// Creation timestamp (unix epoch milliseconds).
    pub created_at: i64,
}

// ============================================================================
// SECTION: Static Policy
// ============================================================================

/// Configured pattern entry, kept in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPatternRule {
    /// Tool-name pattern text.
    pub pattern: String,
    /// Action applied when the pattern matches.
    pub action: PolicyAction,
}

/// Static policy document loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPolicy {
    /// Exact tool-name entries.
    pub exact: BTreeMap<String, PolicyAction>,
    /// Pattern entries in configuration order.
    pub patterns: Vec<StaticPatternRule>,
    /// Default action when nothing matches.
    pub default_action: PolicyAction,
}

impl Default for StaticPolicy {
    fn default() -> Self {
        Self {
            exact: BTreeMap::new(),
            patterns: Vec::new(),
            default_action: PolicyAction::RequireApproval,
        }
    }
}
