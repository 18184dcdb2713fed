// portero-core/src/interfaces/mod.rs
// ============================================================================
// Module: Portero Store Interfaces
// Description: Durable-state traits implemented by the file-backed store.
// Purpose: Keep the core free of I/O while defining the exclusive state path.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! The state store is the exclusive path to durable state; no component
//! bypasses it. Each collection exposes read-modify-write operations that the
//! implementation must serialize within the process: the effect order of
//! completed operations on one collection is a total order consistent with
//! call-return order of a single writer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::grant::Grant;
use crate::core::identifiers::ChatId;
use crate::core::identifiers::GrantId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::TaskId;
use crate::core::policy::DynamicRule;
use crate::core::policy::PolicyAction;
use crate::core::task::Task;
use crate::core::task::TaskStatus;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage failed to read or write.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Record serialization or deserialization failed.
    #[error("store serialization failed: {0}")]
    Serialization(String),
    /// The referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),
    /// A validating mutation rejected the update.
    #[error("update rejected: {0}")]
    Rejected(String),
}

/// Result of a validating task mutation.
pub type MutationOutcome = Result<(), String>;

// ============================================================================
// SECTION: Task Store
// ============================================================================

/// Durable store for task records.
pub trait TaskStore: Send + Sync {
    /// Inserts a new task record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn create(&self, task: Task) -> Result<(), StoreError>;

    /// Fetches a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// Applies a validating mutation to a task under the collection lock.
    ///
    /// The mutator runs against the current record; returning `Err`
    /// abandons the write and surfaces [`StoreError::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids,
    /// [`StoreError::Rejected`] when the mutator declines, or another
    /// [`StoreError`] when persistence fails.
    fn update(
        &self,
        id: &TaskId,
        mutator: &mut dyn FnMut(&mut Task) -> MutationOutcome,
    ) -> Result<Task, StoreError>;

    /// Lists tasks newest-first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list(&self, status: Option<TaskStatus>, limit: usize) -> Result<Vec<Task>, StoreError>;

    /// Removes a task; returns true when a record was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn remove(&self, id: &TaskId) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Grant Store
// ============================================================================

/// Durable store for grants.
pub trait GrantStore: Send + Sync {
    /// Inserts a new grant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn create(&self, grant: Grant) -> Result<(), StoreError>;

    /// Fetches a grant by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get(&self, id: &GrantId) -> Result<Option<Grant>, StoreError>;

    /// Lists grants newest-first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list(&self, limit: usize) -> Result<Vec<Grant>, StoreError>;

    /// Removes a grant; returns true when a record was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn remove(&self, id: &GrantId) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Rule Store
// ============================================================================

/// Durable store for dynamic policy rules.
pub trait RuleStore: Send + Sync {
    /// Creates or replaces the rule for `pattern`; the newest upsert wins
    /// and exactly one rule per pattern exists at any time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn upsert(&self, pattern: &str, action: PolicyAction) -> Result<DynamicRule, StoreError>;

    /// Lists rules newest-first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list(&self, limit: usize) -> Result<Vec<DynamicRule>, StoreError>;

    /// Removes a rule; returns true when a record was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn remove(&self, id: &RuleId) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Admin Store
// ============================================================================

/// Durable store for the single admin pairing record.
pub trait AdminStore: Send + Sync {
    /// Returns the paired admin principal, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn admin(&self) -> Result<Option<ChatId>, StoreError>;

    /// Persists the paired admin principal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn set_admin(&self, chat: ChatId) -> Result<(), StoreError>;
}
