// portero-mcp/src/pipeline.rs
// ============================================================================
// Module: Portero Request Pipeline
// Description: Per-invocation orchestration of the gateway subsystems.
// Purpose: Anonymize, resolve policy, then dispatch, deny, or park as a task.
// Dependencies: portero-core, portero-channel
// ============================================================================

//! ## Overview
//! Every `tools/call` flows through the pipeline: virtual tools short-circuit
//! to their in-gateway handlers; everything else is anonymized inbound,
//! resolved against the layered policy, checked against active grants, and
//! then either denied, parked as a pending-approval task, or dispatched
//! synchronously with outbound anonymization. The pipeline never blocks
//! waiting for human approval; parked calls return a pending envelope
//! immediately and the caller polls `portero/check_task`.
//!
//! Every terminal path produces exactly one audit record and one admin
//! notification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;

use portero_channel::ActivityDigest;
use portero_channel::ActivityNotice;
use portero_channel::ApprovalChannel;
use portero_channel::NoticeStatus;
use portero_channel::StatusSnapshot;
use portero_channel::StatusSource;
use portero_core::AuditRecord;
use portero_core::AuditSink;
use portero_core::PolicyAction;
use portero_core::PolicyDecision;
use portero_core::StoreError;
use portero_core::Task;
use portero_core::TaskStatus;
use portero_core::interfaces::GrantStore;
use portero_core::now_ms;
use portero_core::runtime::anonymizer::Anonymizer;
use portero_core::runtime::resolver::PolicyResolver;
use portero_core::runtime::tasks::TaskError;
use portero_core::runtime::tasks::TaskManager;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::aggregate::ToolAggregator;
use crate::registry::BackendRegistry;
use crate::route::RouteError;
use crate::route::Router;
use crate::virtuals;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on grants scanned per invocation.
const GRANT_SCAN_LIMIT: usize = 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced to the JSON-RPC layer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The policy denied the call.
    #[error("denied by policy: {0}")]
    Denied(String),
    /// The request parameters could not be interpreted.
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// Routing or backend dispatch failed.
    #[error(transparent)]
    Route(#[from] RouteError),
    /// Durable state or another internal collaborator failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TaskError> for PipelineError {
    fn from(err: TaskError) -> Self {
        Self::Internal(err.to_string())
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Collaborators wired into the pipeline.
pub struct PipelineConfig {
    /// Backend registry.
    pub registry: Arc<BackendRegistry>,
    /// Catalog aggregator.
    pub aggregator: Arc<ToolAggregator>,
    /// Namespaced dispatch router.
    pub router: Router,
    /// Replacement-rule engine.
    pub anonymizer: Arc<Anonymizer>,
    /// Layered policy resolver.
    pub resolver: Arc<PolicyResolver>,
    /// Grant collection.
    pub grants: Arc<dyn GrantStore>,
    /// Task state machine facade.
    pub tasks: TaskManager,
    /// Approval channel; absent when no transport is configured.
    pub channel: Option<Arc<ApprovalChannel>>,
    /// Activity digest publisher.
    pub digest: ActivityDigest,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
}

/// Per-invocation orchestrator over the gateway subsystems.
pub struct RequestPipeline {
    registry: Arc<BackendRegistry>,
    aggregator: Arc<ToolAggregator>,
    router: Router,
    anonymizer: Arc<Anonymizer>,
    resolver: Arc<PolicyResolver>,
    grants: Arc<dyn GrantStore>,
    tasks: TaskManager,
    channel: Option<Arc<ApprovalChannel>>,
    digest: ActivityDigest,
    audit: Arc<dyn AuditSink>,
}

impl RequestPipeline {
    /// Builds the pipeline from its collaborators.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            registry: config.registry,
            aggregator: config.aggregator,
            router: config.router,
            anonymizer: config.anonymizer,
            resolver: config.resolver,
            grants: config.grants,
            tasks: config.tasks,
            channel: config.channel,
            digest: config.digest,
            audit: config.audit,
        }
    }

    /// Returns the task manager shared with the executor.
    #[must_use]
    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    // ------------------------------------------------------------------
    // JSON-RPC surface
    // ------------------------------------------------------------------

    /// Builds the `tools/list` result: virtual tools first, then the
    /// filtered aggregate.
    pub async fn tools_list(&self) -> Value {
        let mut tools = virtuals::definitions();
        for tool in self.aggregator.filtered().await {
            tools.push(json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema,
            }));
        }
        json!({
            "tools": tools,
        })
    }

    /// Builds the `resources/list` result.
    pub async fn resources_list(&self) -> Value {
        let resources: Vec<Value> = self
            .aggregator
            .list_resources()
            .await
            .into_iter()
            .map(|resource| {
                json!({
                    "uri": resource.uri,
                    "name": resource.name,
                })
            })
            .collect();
        json!({
            "resources": resources,
        })
    }

    /// Delegates a `resources/read` to the owning backend.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for malformed URIs, unknown backends, or
    /// backend failures.
    pub async fn resources_read(&self, uri: &str) -> Result<Value, PipelineError> {
        Ok(self.router.read_resource(uri).await?)
    }

    /// Handles a `tools/call` for a virtual or aggregated tool.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for denials, routing failures, and internal
    /// errors. Parked calls are not errors; they return the pending
    /// envelope.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, PipelineError> {
        if virtuals::is_virtual(name) {
            return self.handle_virtual(name, arguments).await;
        }
        let real_args = self.anonymizer.anonymize(&arguments);
        let decision = self.resolver.resolve(name)?;
        match decision.action {
            PolicyAction::Deny => {
                let record = AuditRecord::new(name, arguments)
                    .with_policy_source(decision.source)
                    .with_error("denied by policy");
                self.audit.record(&record);
                self.digest.publish(ActivityNotice::with_reason(
                    NoticeStatus::Blocked,
                    name,
                    "denied by policy",
                ));
                Err(PipelineError::Denied(name.to_string()))
            }
            PolicyAction::RequireApproval => {
                if self.has_active_grant(name)? {
                    // An active grant short-circuits the approval requirement.
                    self.dispatch(name, real_args, arguments, &decision).await
                } else {
                    self.park(name, real_args, arguments, &decision).await
                }
            }
            PolicyAction::Allow => self.dispatch(name, real_args, arguments, &decision).await,
        }
    }

    // ------------------------------------------------------------------
    // Synchronous dispatch
    // ------------------------------------------------------------------

    /// Dispatches through the router and applies outbound anonymization.
    async fn dispatch(
        &self,
        name: &str,
        real_args: Value,
        caller_args: Value,
        decision: &PolicyDecision,
    ) -> Result<Value, PipelineError> {
        match self.router.call_tool(name, real_args).await {
            Ok(reply) => {
                self.registry.mark_used(name);
                let visible = self.anonymizer.deanonymize(&reply);
                let record =
                    AuditRecord::new(name, caller_args).with_policy_source(decision.source);
                self.audit.record(&record);
                self.digest.publish(ActivityNotice::new(NoticeStatus::Allowed, name));
                Ok(visible)
            }
            Err(err) => {
                let record = AuditRecord::new(name, caller_args)
                    .with_policy_source(decision.source)
                    .with_error(err.to_string());
                self.audit.record(&record);
                self.digest.publish(ActivityNotice::with_reason(
                    NoticeStatus::Error,
                    name,
                    err.to_string(),
                ));
                Err(err.into())
            }
        }
    }

    /// Returns true when an active grant matches the tool name.
    fn has_active_grant(&self, name: &str) -> Result<bool, PipelineError> {
        let now = now_ms();
        let grants = self.grants.list(GRANT_SCAN_LIMIT)?;
        Ok(grants.iter().any(|grant| grant.is_active(now) && grant.pattern.matches(name)))
    }

    // ------------------------------------------------------------------
    // Approval deferral
    // ------------------------------------------------------------------

    /// Parks the call as a pending-approval task and returns immediately.
    async fn park(
        &self,
        name: &str,
        real_args: Value,
        caller_args: Value,
        decision: &PolicyDecision,
    ) -> Result<Value, PipelineError> {
        let task = self.tasks.create(name, real_args, caller_args, decision.action)?;
        let message = match &self.channel {
            Some(channel) => match channel.request_approval(&task).await {
                Ok(_) => "Approval requested; poll portero/check_task for the result.".to_string(),
                Err(err) => {
                    self.fail_park(&task, &err.to_string());
                    format!("approval request failed: {err}")
                }
            },
            None => {
                self.fail_park(&task, "approval channel not configured");
                "approval request failed: approval channel not configured".to_string()
            }
        };
        Ok(virtuals::pending_reply(&task, &message))
    }

    /// Moves a freshly parked task to `error` after a send failure. The
    /// caller still receives the pending envelope and learns the outcome by
    /// polling.
    fn fail_park(&self, task: &Task, reason: &str) {
        if let Err(err) = self.tasks.set_error(&task.id, format!("approval request failed: {reason}"))
        {
            let _ = writeln!(
                std::io::stderr(),
                "portero: WARNING: task {} error transition failed: {err}",
                task.id
            );
        }
        let record = AuditRecord::new(&task.tool, task.original_args.clone())
            .with_error(format!("approval request failed: {reason}"));
        let record = AuditRecord {
            task_id: Some(task.id.clone()),
            ..record
        };
        self.audit.record(&record);
        self.digest.publish(ActivityNotice::with_reason(
            NoticeStatus::Error,
            task.tool.clone(),
            format!("approval request failed: {reason}"),
        ));
    }

    // ------------------------------------------------------------------
    // Virtual tools
    // ------------------------------------------------------------------

    /// Dispatches one of the gateway's virtual tools.
    async fn handle_virtual(&self, name: &str, arguments: Value) -> Result<Value, PipelineError> {
        match name {
            virtuals::SEARCH_TOOLS => {
                let query = arguments.get("query").and_then(Value::as_str);
                let category = arguments.get("category").and_then(Value::as_str);
                let catalog = self.aggregator.unfiltered().await;
                Ok(virtuals::search(&catalog, query, category))
            }
            virtuals::CALL => {
                let tool = arguments
                    .get("tool")
                    .and_then(Value::as_str)
                    .ok_or_else(|| PipelineError::InvalidParams("tool is required".to_string()))?
                    .to_string();
                let args = arguments.get("args").cloned().unwrap_or_else(|| json!({}));
                self.call_tool_owned(tool, args).await
            }
            virtuals::CHECK_TASK => {
                let task_id = arguments
                    .get("task_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        PipelineError::InvalidParams("task_id is required".to_string())
                    })?;
                match self.tasks.get(&task_id.into())? {
                    None => Ok(virtuals::task_not_found_reply(task_id)),
                    Some(task) => {
                        let _ = self.tasks.mark_checked(&task.id);
                        Ok(virtuals::check_task_reply(&task))
                    }
                }
            }
            virtuals::LIST_TASKS => {
                let status = match arguments.get("status").and_then(Value::as_str) {
                    None => None,
                    Some(label) => Some(parse_status(label).ok_or_else(|| {
                        PipelineError::InvalidParams(format!("unknown status: {label}"))
                    })?),
                };
                let limit = arguments
                    .get("limit")
                    .and_then(Value::as_u64)
                    .map_or(virtuals::LIST_TASKS_DEFAULT, |limit| {
                        usize::try_from(limit).unwrap_or(virtuals::LIST_TASKS_MAX)
                    })
                    .min(virtuals::LIST_TASKS_MAX);
                let tasks = self.tasks.list(status, limit)?;
                Ok(virtuals::list_tasks_reply(&tasks))
            }
            _ => Err(PipelineError::InvalidParams(format!("unknown virtual tool: {name}"))),
        }
    }

    /// Owned-argument wrapper enabling boxed recursion from `portero/call`.
    fn call_tool_owned(
        &self,
        name: String,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, PipelineError>> + Send + '_>> {
        Box::pin(async move { self.call_tool(&name, arguments).await })
    }
}

/// Parses a task status label for `portero/list_tasks`.
fn parse_status(label: &str) -> Option<TaskStatus> {
    match label {
        "pending-approval" => Some(TaskStatus::PendingApproval),
        "approved-queued" => Some(TaskStatus::ApprovedQueued),
        "executing" => Some(TaskStatus::Executing),
        "completed" => Some(TaskStatus::Completed),
        "denied" => Some(TaskStatus::Denied),
        "error" => Some(TaskStatus::Error),
        _ => None,
    }
}

// ============================================================================
// SECTION: Status Source
// ============================================================================

/// Catalog counters for the approval channel's status command.
pub struct PipelineStatus {
    /// Backend registry.
    registry: Arc<BackendRegistry>,
    /// Catalog aggregator.
    aggregator: Arc<ToolAggregator>,
}

impl PipelineStatus {
    /// Builds the status source over the registry and aggregator.
    #[must_use]
    pub fn new(registry: Arc<BackendRegistry>, aggregator: Arc<ToolAggregator>) -> Self {
        Self {
            registry,
            aggregator,
        }
    }
}

impl StatusSource for PipelineStatus {
    fn snapshot(&self) -> StatusSnapshot {
        // Served from the cache only; the status command must not block on
        // backend catalog queries.
        StatusSnapshot {
            backends: self.registry.len(),
            catalog_size: self.aggregator.cached_size(),
        }
    }
}
