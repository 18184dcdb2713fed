// portero-mcp/src/executor.rs
// ============================================================================
// Module: Portero Task Executor
// Description: Background execution of approved tasks.
// Purpose: Drain the approval queue, dispatch, and finalize task records.
// Dependencies: portero-core, portero-channel, tokio
// ============================================================================

//! ## Overview
//! The executor drains approved task ids from the channel's queue. Each task
//! transitions to `executing`, dispatches its post-anonymization arguments
//! through the router, and finalizes with the outbound-anonymized result or
//! the backend error. Approval authorizes execution at the moment granted:
//! no policy re-check, no retry. Executions run concurrently; backends
//! self-serialize over their own transports.
//!
//! On startup the executor re-drains tasks already in `approved-queued`, so
//! approvals granted just before a crash still execute.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Arc;

use portero_channel::ActivityDigest;
use portero_channel::ActivityNotice;
use portero_channel::NoticeStatus;
use portero_core::AuditRecord;
use portero_core::AuditSink;
use portero_core::TaskId;
use portero_core::TaskStatus;
use portero_core::runtime::anonymizer::Anonymizer;
use portero_core::runtime::tasks::TaskManager;
use tokio::sync::mpsc;

use crate::registry::BackendRegistry;
use crate::route::Router;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on queued tasks re-drained at startup.
const STARTUP_DRAIN_LIMIT: usize = 1024;

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Shared execution context.
struct ExecutorInner {
    /// Namespaced dispatch router.
    router: Router,
    /// Replacement-rule engine for outbound rewriting.
    anonymizer: Arc<Anonymizer>,
    /// Task state machine facade.
    tasks: TaskManager,
    /// Backend registry for usage marking.
    registry: Arc<BackendRegistry>,
    /// Activity digest publisher.
    digest: ActivityDigest,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
}

/// Background executor over the approved-task queue.
pub struct TaskExecutor {
    /// Shared execution context.
    inner: Arc<ExecutorInner>,
    /// Queue of approved task ids.
    receiver: mpsc::Receiver<TaskId>,
}

impl TaskExecutor {
    /// Builds an executor over its collaborators and the approval queue.
    #[must_use]
    pub fn new(
        router: Router,
        anonymizer: Arc<Anonymizer>,
        tasks: TaskManager,
        registry: Arc<BackendRegistry>,
        digest: ActivityDigest,
        audit: Arc<dyn AuditSink>,
        receiver: mpsc::Receiver<TaskId>,
    ) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                router,
                anonymizer,
                tasks,
                registry,
                digest,
                audit,
            }),
            receiver,
        }
    }

    /// Runs until the approval queue closes.
    pub async fn run(mut self) {
        // Crash recovery: approvals accepted before a restart are still
        // queued in the store.
        match self.inner.tasks.list(Some(TaskStatus::ApprovedQueued), STARTUP_DRAIN_LIMIT) {
            Ok(queued) => {
                // Oldest first.
                for task in queued.into_iter().rev() {
                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move {
                        inner.execute(task.id).await;
                    });
                }
            }
            Err(err) => warn(&format!("startup drain failed: {err}")),
        }
        while let Some(task_id) = self.receiver.recv().await {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                inner.execute(task_id).await;
            });
        }
    }
}

impl ExecutorInner {
    /// Executes one approved task to a terminal state.
    async fn execute(&self, task_id: TaskId) {
        let task = match self.tasks.transition_to(&task_id, TaskStatus::Executing) {
            Ok(task) => task,
            Err(err) => {
                // Already claimed by a competing drain, or gone.
                warn(&format!("task {task_id} not executable: {err}"));
                return;
            }
        };
        match self.router.call_tool(&task.tool, task.real_args.clone()).await {
            Ok(reply) => {
                self.registry.mark_used(&task.tool);
                let visible = self.anonymizer.deanonymize(&reply);
                if let Err(err) = self.tasks.set_result(&task_id, visible) {
                    warn(&format!("task {task_id} result store failed: {err}"));
                    let _ = self.tasks.set_error(&task_id, format!("result store failed: {err}"));
                }
                let record = AuditRecord::new(&task.tool, task.original_args.clone())
                    .with_approval(task_id.clone());
                self.audit.record(&record);
                self.digest.publish(ActivityNotice::new(NoticeStatus::Completed, &task.tool));
            }
            Err(err) => {
                if let Err(store_err) = self.tasks.set_error(&task_id, err.to_string()) {
                    warn(&format!("task {task_id} error store failed: {store_err}"));
                }
                let record = AuditRecord::new(&task.tool, task.original_args.clone())
                    .with_approval(task_id.clone())
                    .with_error(err.to_string());
                self.audit.record(&record);
                self.digest.publish(ActivityNotice::with_reason(
                    NoticeStatus::Error,
                    &task.tool,
                    err.to_string(),
                ));
            }
        }
    }
}

/// Writes a single-line operator warning to stderr.
fn warn(message: &str) {
    let _ = writeln!(std::io::stderr(), "portero: WARNING: executor: {message}");
}
