// portero-core/src/core/task.rs
// ============================================================================
// Module: Portero Task Records
// Description: Durable records for tool invocations deferred for approval.
// Purpose: Capture the task state machine and its timestamps.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A task is the durable record of a tool invocation parked pending admin
//! approval. Status evolves along a fixed state machine; the permitted
//! transitions are encoded in [`TaskStatus::can_transition`] and enforced by
//! [`crate::runtime::tasks::TaskManager`]. Terminal states are `completed`,
//! `denied`, and `error`.
//!
//! ## Invariants
//! - `result` is present iff status is `completed`.
//! - `error` is present iff status is `error` (and may also be recorded on a
//!   denial whose notification send failed).
//! - Status values are stable for serialization and contract matching.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::TaskId;
use crate::core::policy::PolicyAction;

// ============================================================================
// SECTION: Task Status
// ============================================================================

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Awaiting an admin decision on the approval channel.
    PendingApproval,
    /// Approved and queued for background execution.
    ApprovedQueued,
    /// Dispatched to the owning backend.
    Executing,
    /// Finished successfully with a stored result.
    Completed,
    /// Denied by the admin.
    Denied,
    /// Failed while parking, sending, or executing.
    Error,
}

impl TaskStatus {
    /// Returns true when the status admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Denied | Self::Error)
    }

    /// Returns true when the transition to `target` is permitted by the
    /// state machine. No other transitions exist.
    #[must_use]
    pub const fn can_transition(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::PendingApproval, Self::ApprovedQueued | Self::Denied | Self::Error)
                | (Self::ApprovedQueued, Self::Executing | Self::Completed | Self::Error)
                | (Self::Executing, Self::Completed | Self::Error)
        )
    }

    /// Returns the canonical wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingApproval => "pending-approval",
            Self::ApprovedQueued => "approved-queued",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Denied => "denied",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SECTION: Task Record
// ============================================================================

/// Durable record of a deferred tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque unique identifier.
    pub id: TaskId,
    /// Fully namespaced tool name.
    pub tool: String,
    /// Arguments after inbound anonymization; dispatched to the backend.
    pub real_args: Value,
    /// Caller-facing arguments as originally received.
    pub original_args: Value,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Stored result; present iff status is `completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Stored error message; present iff status is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Policy action in force when the task was created.
    pub policy_action: PolicyAction,
    /// Opaque approval-channel message handle, once the request was sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_message: Option<String>,
    /// Creation timestamp (unix epoch milliseconds).
    pub created_at: i64,
    /// Timestamp of entry into `approved-queued`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<i64>,
    /// Timestamp of entry into `executing` or a terminal execution state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<i64>,
    /// Timestamp of the most recent status poll; observability only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<i64>,
}

impl Task {
    /// Builds a new task in `pending-approval`.
    #[must_use]
    pub fn new(
        tool: impl Into<String>,
        real_args: Value,
        original_args: Value,
        policy_action: PolicyAction,
        created_at: i64,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            tool: tool.into(),
            real_args,
            original_args,
            status: TaskStatus::PendingApproval,
            result: None,
            error: None,
            policy_action,
            approval_message: None,
            created_at,
            approved_at: None,
            executed_at: None,
            checked_at: None,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
