// portero-channel/src/pairing.rs
// ============================================================================
// Module: Portero Admin Pairing
// Description: Shared-secret pairing of the single admin principal.
// Purpose: Bind approval-channel authorization to one paired chat principal.
// Dependencies: portero-core
// ============================================================================

//! ## Overview
//! An unpaired channel accepts exactly two commands from any principal: an
//! identity disclosure and `pair <secret>`. A successful pair persists the
//! admin principal; from then on only that principal can drive the channel.
//! Pairing happens exactly once; later attempts are rejected even with the
//! correct secret.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use portero_core::ChatId;
use portero_core::StoreError;
use portero_core::interfaces::AdminStore;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of a pairing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    /// The principal is now the paired admin.
    Paired,
    /// A different principal is already paired.
    AlreadyPaired,
    /// The supplied secret does not match.
    WrongSecret,
    /// No pairing secret is configured for this deployment.
    NotConfigured,
}

// ============================================================================
// SECTION: Pairing Guard
// ============================================================================

/// Guards channel authorization behind the persisted admin pairing.
#[derive(Clone)]
pub struct PairingGuard {
    /// Durable pairing record.
    admin: Arc<dyn AdminStore>,
    /// Configured pairing secret, when present.
    secret: Option<String>,
}

impl PairingGuard {
    /// Builds a guard over the admin store and the configured secret.
    #[must_use]
    pub fn new(admin: Arc<dyn AdminStore>, secret: Option<String>) -> Self {
        Self {
            admin,
            secret,
        }
    }

    /// Returns the paired admin principal, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the pairing record cannot be read.
    pub fn admin(&self) -> Result<Option<ChatId>, StoreError> {
        self.admin.admin()
    }

    /// Returns true when `principal` is the paired admin.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the pairing record cannot be read.
    pub fn is_admin(&self, principal: &ChatId) -> Result<bool, StoreError> {
        Ok(self.admin.admin()?.as_ref() == Some(principal))
    }

    /// Attempts to pair `principal` with the supplied secret.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the pairing record cannot be read or
    /// written.
    pub fn try_pair(
        &self,
        principal: &ChatId,
        supplied: &str,
    ) -> Result<PairingOutcome, StoreError> {
        let Some(secret) = self.secret.as_deref() else {
            return Ok(PairingOutcome::NotConfigured);
        };
        if self.admin.admin()?.is_some() {
            return Ok(PairingOutcome::AlreadyPaired);
        }
        if !constant_time_eq(secret.as_bytes(), supplied.as_bytes()) {
            return Ok(PairingOutcome::WrongSecret);
        }
        self.admin.set_admin(principal.clone())?;
        Ok(PairingOutcome::Paired)
    }
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
