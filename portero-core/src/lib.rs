// portero-core/src/lib.rs
// ============================================================================
// Module: Portero Core
// Description: Data model and pipeline primitives for the Portero gateway.
// Purpose: Provide deterministic, I/O-free building blocks for the gateway.
// Dependencies: serde, serde_json, thiserror, uuid
// ============================================================================

//! ## Overview
//! Portero Core defines the gateway's data model: namespaced tool names, the
//! policy pattern language, replacement rules and the anonymizer, the layered
//! policy resolver, the task state machine, grants, and the store interfaces
//! everything durable flows through. The crate performs no I/O of its own;
//! hosts supply stores, transports, and clocks at the seams defined in
//! [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::audit::AuditRecord;
pub use core::audit::AuditSink;
pub use core::audit::NoopAuditSink;
pub use core::audit::StderrAuditSink;
pub use core::grant::Grant;
pub use core::grant::GrantError;
pub use core::identifiers::BackendName;
pub use core::identifiers::ChatId;
pub use core::identifiers::GrantId;
pub use core::identifiers::RuleId;
pub use core::identifiers::TaskId;
pub use core::name::NameError;
pub use core::name::NamespacedName;
pub use core::name::ResourceUri;
pub use core::pattern::PatternError;
pub use core::pattern::ToolPattern;
pub use core::policy::DynamicRule;
pub use core::policy::PolicyAction;
pub use core::policy::PolicyDecision;
pub use core::policy::PolicySource;
pub use core::policy::StaticPatternRule;
pub use core::policy::StaticPolicy;
pub use core::replacement::REDACTED_TOKEN;
pub use core::replacement::ReplacementError;
pub use core::replacement::ReplacementRule;
pub use core::task::Task;
pub use core::task::TaskStatus;
pub use core::time::now_ms;
pub use interfaces::AdminStore;
pub use interfaces::GrantStore;
pub use interfaces::RuleStore;
pub use interfaces::StoreError;
pub use interfaces::TaskStore;
pub use runtime::anonymizer::Anonymizer;
pub use runtime::resolver::PolicyResolver;
pub use runtime::tasks::TaskError;
pub use runtime::tasks::TaskManager;
