// portero-store/src/lib.rs
// ============================================================================
// Module: Portero Store
// Description: File-backed state store and audit stream for the gateway.
// Purpose: Provide atomic-replace durability for tasks, grants, rules, admin.
// Dependencies: portero-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The store persists four collections — tasks, grants, rules, and the admin
//! pairing record — as one JSON document each, ordered newest-first, plus an
//! append-only JSON-lines audit stream. Writes serialize to a sibling temp
//! file and rename over the target; a crash between the two steps leaves the
//! previous committed content readable. All writers serialize within the
//! process on per-collection locks.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditStream;
pub use store::FileStore;
