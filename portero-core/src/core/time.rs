// portero-core/src/core/time.rs
// ============================================================================
// Module: Portero Time Helpers
// Description: Epoch-millisecond clock used across gateway records.
// Purpose: Provide one consistent timestamp representation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! All gateway records carry unix epoch milliseconds as `i64`. Components
//! that need testable expiry math take `now` as a parameter and use this
//! helper only at their outermost call sites.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Returns the current wall-clock time as unix epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    i64::try_from(millis).unwrap_or(i64::MAX)
}
