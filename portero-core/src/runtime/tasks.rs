// portero-core/src/runtime/tasks.rs
// ============================================================================
// Module: Portero Task Manager
// Description: Stateful facade enforcing the task state machine.
// Purpose: Own every task state transition over the durable task store.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The task manager is the single writer of task state. Transitions are
//! validated inside the store's read-modify-write so concurrent callers
//! serialize on the collection lock; a disallowed transition is a programming
//! error and fails loudly as [`TaskError::InvalidTransition`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::TaskId;
use crate::core::policy::PolicyAction;
use crate::core::task::Task;
use crate::core::task::TaskStatus;
use crate::core::time::now_ms;
use crate::interfaces::StoreError;
use crate::interfaces::TaskStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by task manager operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The requested transition is not permitted by the state machine.
    #[error("invalid task transition: {0}")]
    InvalidTransition(String),
    /// The referenced task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// The underlying store failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(message) => Self::InvalidTransition(message),
            StoreError::NotFound(id) => Self::NotFound(TaskId::new(id)),
            other => Self::Store(other),
        }
    }
}

// ============================================================================
// SECTION: Task Manager
// ============================================================================

/// Facade over the task collection enforcing the state machine.
#[derive(Clone)]
pub struct TaskManager {
    /// Durable task store.
    store: Arc<dyn TaskStore>,
}

impl TaskManager {
    /// Builds a task manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
        }
    }

    /// Creates a new task in `pending-approval`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] when persistence fails.
    pub fn create(
        &self,
        tool: impl Into<String>,
        real_args: Value,
        original_args: Value,
        policy_action: PolicyAction,
    ) -> Result<Task, TaskError> {
        let task = Task::new(tool, real_args, original_args, policy_action, now_ms());
        self.store.create(task.clone())?;
        Ok(task)
    }

    /// Transitions a task to `target`, stamping lifecycle timestamps.
    ///
    /// `approved_at` is set on entry to `approved-queued`; `executed_at` on
    /// entry to `executing` and on terminal transitions out of `executing`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidTransition`] when the state machine does
    /// not permit the move.
    pub fn transition_to(&self, id: &TaskId, target: TaskStatus) -> Result<Task, TaskError> {
        let now = now_ms();
        let task = self.store.update(id, &mut |task| {
            if !task.status.can_transition(target) {
                return Err(format!(
                    "{} -> {} is not permitted",
                    task.status.as_str(),
                    target.as_str()
                ));
            }
            let previous = task.status;
            task.status = target;
            match target {
                TaskStatus::ApprovedQueued => task.approved_at = Some(now),
                TaskStatus::Executing => task.executed_at = Some(now),
                TaskStatus::Completed | TaskStatus::Error
                    if previous == TaskStatus::Executing =>
                {
                    task.executed_at = Some(now);
                }
                _ => {}
            }
            Ok(())
        })?;
        Ok(task)
    }

    /// Stores a successful result, completing the task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidTransition`] unless the task is in
    /// `executing` or `approved-queued`.
    pub fn set_result(&self, id: &TaskId, value: Value) -> Result<Task, TaskError> {
        let now = now_ms();
        let task = self.store.update(id, &mut |task| {
            if !matches!(task.status, TaskStatus::Executing | TaskStatus::ApprovedQueued) {
                return Err(format!("result not accepted in {}", task.status.as_str()));
            }
            task.status = TaskStatus::Completed;
            task.result = Some(value.clone());
            task.error = None;
            task.executed_at = Some(now);
            Ok(())
        })?;
        Ok(task)
    }

    /// Stores an error message, failing the task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidTransition`] when the task is already
    /// terminal.
    pub fn set_error(&self, id: &TaskId, message: impl Into<String>) -> Result<Task, TaskError> {
        let message = message.into();
        let now = now_ms();
        let task = self.store.update(id, &mut |task| {
            if task.status.is_terminal() {
                return Err(format!("error not accepted in {}", task.status.as_str()));
            }
            task.status = TaskStatus::Error;
            task.error = Some(message.clone());
            task.executed_at = Some(now);
            Ok(())
        })?;
        Ok(task)
    }

    /// Records the approval-channel message handle on the task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] when the task is missing or the store fails.
    pub fn set_approval_message(
        &self,
        id: &TaskId,
        handle: impl Into<String>,
    ) -> Result<Task, TaskError> {
        let handle = handle.into();
        let task = self.store.update(id, &mut |task| {
            task.approval_message = Some(handle.clone());
            Ok(())
        })?;
        Ok(task)
    }

    /// Stamps `checked_at`; observability only, never gates state.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] when the task is missing or the store fails.
    pub fn mark_checked(&self, id: &TaskId) -> Result<Task, TaskError> {
        let now = now_ms();
        let task = self.store.update(id, &mut |task| {
            task.checked_at = Some(now);
            Ok(())
        })?;
        Ok(task)
    }

    /// Fetches a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] when the read fails.
    pub fn get(&self, id: &TaskId) -> Result<Option<Task>, TaskError> {
        Ok(self.store.get(id)?)
    }

    /// Lists tasks newest-first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] when the read fails.
    pub fn list(&self, status: Option<TaskStatus>, limit: usize) -> Result<Vec<Task>, TaskError> {
        Ok(self.store.list(status, limit)?)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
