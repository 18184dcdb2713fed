// portero-core/src/core/audit.rs
// ============================================================================
// Module: Portero Audit Records
// Description: Structured audit events for gateway tool invocations.
// Purpose: Emit append-only audit records without hard logging dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every terminal pipeline path produces exactly one audit record. The sink
//! trait is intentionally lightweight so deployments can route events to
//! their preferred pipeline; the file-backed stream lives in `portero-store`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::TaskId;
use crate::core::policy::PolicySource;
use crate::core::time::now_ms;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit record for one tool invocation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Event label; always `tool_call`.
    pub event: String,
    /// Event timestamp (unix epoch milliseconds).
    pub timestamp_ms: i64,
    /// Fully namespaced tool name.
    pub tool: String,
    /// Caller-facing (anonymized) arguments.
    pub args: Value,
    /// `approved` for executor completions; absent for synchronous paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<String>,
    /// Policy layer that authorized or rejected the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_source: Option<PolicySource>,
    /// Owning task, for asynchronous paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Error message for failed or denied calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Creates a record with a consistent timestamp.
    #[must_use]
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            event: "tool_call".to_string(),
            timestamp_ms: now_ms(),
            tool: tool.into(),
            args,
            approval_status: None,
            policy_source: None,
            task_id: None,
            error: None,
        }
    }

    /// Sets the policy provenance on the record.
    #[must_use]
    pub fn with_policy_source(mut self, source: PolicySource) -> Self {
        self.policy_source = Some(source);
        self
    }

    /// Marks the record as an approved asynchronous execution.
    #[must_use]
    pub fn with_approval(mut self, task_id: TaskId) -> Self {
        self.approval_status = Some("approved".to_string());
        self.task_id = Some(task_id);
        self
    }

    /// Sets the error message on the record.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for gateway invocation records.
pub trait AuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, record: &AuditRecord);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Ok(payload) = serde_json::to_string(record) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: &AuditRecord) {}
}
