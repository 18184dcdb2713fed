// portero-channel/src/channel.rs
// ============================================================================
// Module: Portero Approval Channel
// Description: Decision ingestion, side effects, and admin commands.
// Purpose: Drive the task state machine from the paired admin's chat.
// Dependencies: portero-core, portero-store, tokio
// ============================================================================

//! ## Overview
//! The channel renders approval requests with discrete decision buttons,
//! validates every incoming decision against the paired admin and the task
//! state machine, applies decision side effects (grants and dynamic rules),
//! and hands approved tasks to the executor queue. Decisions on one task
//! serialize through the store's validating update: the first decision wins
//! and later ones receive an "already processed" note.
//!
//! Unpaired channels accept exactly two commands from any principal: the
//! identity disclosure and `pair <secret>`. Every other command requires the
//! paired admin.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use portero_core::ChatId;
use portero_core::Grant;
use portero_core::GrantId;
use portero_core::PolicyAction;
use portero_core::RuleId;
use portero_core::StoreError;
use portero_core::Task;
use portero_core::TaskId;
use portero_core::TaskStatus;
use portero_core::ToolPattern;
use portero_core::interfaces::GrantStore;
use portero_core::interfaces::RuleStore;
use portero_core::now_ms;
use portero_core::runtime::tasks::TaskError;
use portero_core::runtime::tasks::TaskManager;
use portero_store::FileAuditStream;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::pairing::PairingGuard;
use crate::pairing::PairingOutcome;
use crate::render::render_approval_request;
use crate::transport::ApprovalChoice;
use crate::transport::ChatTransport;
use crate::transport::ChatUpdate;
use crate::transport::MessageButton;
use crate::transport::OutgoingMessage;
use crate::transport::TransportError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Liveness probe timeout at startup.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Startup window after which a slow transport is warned about.
const SLOW_START_WARNING: Duration = Duration::from_secs(30);
/// Poll delay between empty receive batches.
const IDLE_POLL_DELAY: Duration = Duration::from_millis(500);
/// Maximum records considered by listing commands.
const LIST_SCAN_LIMIT: usize = 1000;
/// Default entries shown by listing commands.
const DEFAULT_LIST_LIMIT: usize = 20;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by approval-channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// No admin has been paired yet.
    #[error("no admin paired")]
    Unpaired,
    /// Durable state access failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Task manager rejected an operation.
    #[error(transparent)]
    Task(#[from] TaskError),
    /// Chat transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A command or payload could not be interpreted.
    #[error("invalid command: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Status Source
// ============================================================================

/// Catalog counters contributed by the gateway runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusSnapshot {
    /// Connected backend count.
    pub backends: usize,
    /// Aggregated catalog size.
    pub catalog_size: usize,
}

/// Supplies catalog counters for the `status` command.
pub trait StatusSource: Send + Sync {
    /// Returns the current counters.
    fn snapshot(&self) -> StatusSnapshot;
}

// ============================================================================
// SECTION: Channel
// ============================================================================

/// Grant lifetimes applied by decision side effects.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalChannelConfig {
    /// Lifetime of short grants in milliseconds.
    pub short_grant_ttl_ms: i64,
    /// Lifetime of long grants in milliseconds.
    pub long_grant_ttl_ms: i64,
}

/// Approval channel over a chat transport.
pub struct ApprovalChannel {
    /// Chat transport seam.
    transport: Arc<dyn ChatTransport>,
    /// Admin pairing guard.
    pairing: PairingGuard,
    /// Task state machine facade.
    tasks: TaskManager,
    /// Grant collection.
    grants: Arc<dyn GrantStore>,
    /// Dynamic rule collection.
    rules: Arc<dyn RuleStore>,
    /// Queue draining approved tasks into the executor.
    executor_tx: mpsc::Sender<TaskId>,
    /// Grant lifetimes.
    config: ApprovalChannelConfig,
    /// Audit stream for the recent-audit command.
    audit: Option<Arc<FileAuditStream>>,
    /// Catalog counters for the status command.
    status: Option<Arc<dyn StatusSource>>,
}

impl ApprovalChannel {
    /// Builds a channel over its collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        pairing: PairingGuard,
        tasks: TaskManager,
        grants: Arc<dyn GrantStore>,
        rules: Arc<dyn RuleStore>,
        executor_tx: mpsc::Sender<TaskId>,
        config: ApprovalChannelConfig,
    ) -> Self {
        Self {
            transport,
            pairing,
            tasks,
            grants,
            rules,
            executor_tx,
            config,
            audit: None,
            status: None,
        }
    }

    /// Attaches the audit stream serving the recent-audit command.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<FileAuditStream>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Attaches the catalog counter source for the status command.
    #[must_use]
    pub fn with_status_source(mut self, status: Arc<dyn StatusSource>) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the pairing guard.
    #[must_use]
    pub fn pairing(&self) -> &PairingGuard {
        &self.pairing
    }

    // ------------------------------------------------------------------
    // Approval requests
    // ------------------------------------------------------------------

    /// Sends the approval request for a parked task and records the message
    /// handle on the task.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unpaired`] when no admin exists, or the
    /// transport/store failure otherwise.
    pub async fn request_approval(&self, task: &Task) -> Result<String, ChannelError> {
        let admin = self.pairing.admin()?.ok_or(ChannelError::Unpaired)?;
        let text = render_approval_request(task);
        let buttons = ApprovalChoice::ALL
            .iter()
            .map(|choice| MessageButton {
                label: choice.label().to_string(),
                data: format!("decision:{}:{}", choice.as_str(), task.id),
            })
            .collect();
        let handle = self
            .transport
            .send(OutgoingMessage {
                chat: admin,
                text,
                buttons,
            })
            .await?;
        self.tasks.set_approval_message(&task.id, handle.clone())?;
        Ok(handle)
    }

    // ------------------------------------------------------------------
    // Update handling
    // ------------------------------------------------------------------

    /// Routes one incoming chat update.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when state access fails; user mistakes are
    /// answered over the transport instead.
    pub async fn handle_update(&self, update: ChatUpdate) -> Result<(), ChannelError> {
        match update {
            ChatUpdate::Message {
                chat,
                text,
            } => self.handle_command(&chat, &text).await,
            ChatUpdate::Callback {
                chat,
                data,
            } => self.handle_callback(&chat, &data).await,
        }
    }

    /// Handles a text command.
    async fn handle_command(&self, chat: &ChatId, text: &str) -> Result<(), ChannelError> {
        let tokens = tokenize(text);
        let Some((command, args)) = tokens.split_first() else {
            return Ok(());
        };
        match command.as_str() {
            "whoami" => {
                let paired = self.pairing.is_admin(chat)?;
                let role = if paired { "paired admin" } else { "not paired" };
                self.reply(chat, &format!("You are {chat} ({role}).")).await;
                return Ok(());
            }
            "pair" => {
                let secret = args.first().map(String::as_str).unwrap_or_default();
                let reply = match self.pairing.try_pair(chat, secret)? {
                    PairingOutcome::Paired => "Paired. You are now the admin.",
                    PairingOutcome::AlreadyPaired => "An admin is already paired.",
                    PairingOutcome::WrongSecret => "Pairing failed.",
                    PairingOutcome::NotConfigured => "Pairing is not configured.",
                };
                self.reply(chat, reply).await;
                return Ok(());
            }
            _ => {}
        }
        if !self.pairing.is_admin(chat)? {
            self.reply(chat, "Unauthorized.").await;
            return Ok(());
        }
        match command.as_str() {
            "approve" | "deny" => {
                let Some(task_id) = args.first() else {
                    self.reply(chat, "Usage: approve <task-id> | deny <task-id>").await;
                    return Ok(());
                };
                let choice = if command.as_str() == "approve" {
                    ApprovalChoice::Approve
                } else {
                    ApprovalChoice::Deny
                };
                self.ingest_decision(chat, choice, &TaskId::new(task_id.as_str())).await
            }
            "status" => {
                let report = self.status_report()?;
                self.reply(chat, &report).await;
                Ok(())
            }
            "grant" => self.command_grant(chat, args).await,
            "grants" => self.command_grants(chat).await,
            "revoke" => self.command_revoke(chat, args).await,
            "rule" => self.command_rule(chat, args).await,
            "rules" => self.command_rules(chat).await,
            "unrule" => self.command_unrule(chat, args).await,
            "tasks" => self.command_tasks(chat, args).await,
            "pending" => {
                self.command_tasks(chat, &["pending-approval".to_string()]).await
            }
            "audit" => self.command_audit(chat, args).await,
            _ => {
                self.reply(
                    chat,
                    "Commands: status, approve <id>, deny <id>, grant <pattern> [ttl-ms], \
                     grants, revoke <id>, rule <pattern> <action>, rules, unrule <id>, \
                     tasks [status], pending, audit [n], whoami",
                )
                .await;
                Ok(())
            }
        }
    }

    /// Handles a button-press callback payload.
    async fn handle_callback(&self, chat: &ChatId, data: &str) -> Result<(), ChannelError> {
        let mut parts = data.splitn(3, ':');
        let kind = parts.next().unwrap_or_default();
        match kind {
            "decision" => {
                let choice = parts
                    .next()
                    .and_then(ApprovalChoice::parse)
                    .ok_or_else(|| ChannelError::Invalid(data.to_string()))?;
                let task_id = parts
                    .next()
                    .ok_or_else(|| ChannelError::Invalid(data.to_string()))?;
                self.ingest_decision(chat, choice, &TaskId::new(task_id)).await
            }
            "policy" => {
                let action = parts
                    .next()
                    .and_then(parse_action)
                    .ok_or_else(|| ChannelError::Invalid(data.to_string()))?;
                let tool = parts
                    .next()
                    .ok_or_else(|| ChannelError::Invalid(data.to_string()))?;
                if !self.pairing.is_admin(chat)? {
                    self.reply(chat, "Unauthorized.").await;
                    return Ok(());
                }
                let rule = self.rules.upsert(tool, action)?;
                self.reply(chat, &format!("Rule set: {} -> {}.", rule.pattern, action.as_str()))
                    .await;
                Ok(())
            }
            _ => Err(ChannelError::Invalid(data.to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    /// Validates and applies a decision for a task.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when state access fails; stale or
    /// unauthorized decisions are answered over the transport.
    pub async fn ingest_decision(
        &self,
        principal: &ChatId,
        choice: ApprovalChoice,
        task_id: &TaskId,
    ) -> Result<(), ChannelError> {
        if !self.pairing.is_admin(principal)? {
            self.reply(principal, "Unauthorized.").await;
            return Ok(());
        }
        let Some(task) = self.tasks.get(task_id)? else {
            self.reply(principal, &format!("Task {task_id} not found.")).await;
            return Ok(());
        };
        if task.status != TaskStatus::PendingApproval {
            self.reply(
                principal,
                &format!("Task {task_id} already processed ({}).", task.status.as_str()),
            )
            .await;
            return Ok(());
        }

        if choice.approves() {
            match self.tasks.transition_to(task_id, TaskStatus::ApprovedQueued) {
                Ok(_) => {}
                Err(TaskError::InvalidTransition(_)) => {
                    // Lost the race against a concurrent decision.
                    self.reply(principal, &format!("Task {task_id} already processed.")).await;
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
            let mut ack = format!("Approved {} ({}).", task_id, task.tool);
            match self.apply_approval_side_effect(choice, &task) {
                Ok(Some(note)) => {
                    ack.push(' ');
                    ack.push_str(&note);
                }
                Ok(None) => {}
                Err(err) => {
                    ack.push_str(&format!(" Side effect failed: {err}."));
                }
            }
            if self.executor_tx.send(task_id.clone()).await.is_err() {
                ack.push_str(" Executor unavailable; task stays queued.");
            }
            self.reply(principal, &ack).await;
        } else {
            match self.tasks.transition_to(task_id, TaskStatus::Denied) {
                Ok(_) => {}
                Err(TaskError::InvalidTransition(_)) => {
                    self.reply(principal, &format!("Task {task_id} already processed.")).await;
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
            let mut ack = format!("Denied {} ({}).", task_id, task.tool);
            if choice == ApprovalChoice::DenyAlwaysDenyTool {
                match self.rules.upsert(&task.tool, PolicyAction::Deny) {
                    Ok(_) => ack.push_str(" Future calls will be denied."),
                    Err(err) => ack.push_str(&format!(" Rule upsert failed: {err}.")),
                }
            }
            self.reply(principal, &ack).await;
        }
        Ok(())
    }

    /// Applies the side effect of an approving choice, returning an ack note.
    fn apply_approval_side_effect(
        &self,
        choice: ApprovalChoice,
        task: &Task,
    ) -> Result<Option<String>, ChannelError> {
        let ttl_ms = match choice {
            ApprovalChoice::ApproveGrantShort => self.config.short_grant_ttl_ms,
            ApprovalChoice::ApproveGrantLong => self.config.long_grant_ttl_ms,
            ApprovalChoice::ApproveAlwaysAllowTool => {
                let rule = self.rules.upsert(&task.tool, PolicyAction::Allow)?;
                return Ok(Some(format!("Always allowed ({}).", rule.id)));
            }
            ApprovalChoice::Approve
            | ApprovalChoice::Deny
            | ApprovalChoice::DenyAlwaysDenyTool => return Ok(None),
        };
        let pattern = ToolPattern::new(task.tool.as_str())
            .map_err(|err| ChannelError::Invalid(err.to_string()))?;
        let grant = Grant::new(pattern, now_ms(), ttl_ms)
            .map_err(|err| ChannelError::Invalid(err.to_string()))?;
        self.grants.create(grant.clone())?;
        Ok(Some(format!("Granted until {} ({}).", grant.expires_at, grant.id)))
    }

    // ------------------------------------------------------------------
    // Admin commands
    // ------------------------------------------------------------------

    fn status_report(&self) -> Result<String, ChannelError> {
        let now = now_ms();
        let pending = self.tasks.list(Some(TaskStatus::PendingApproval), LIST_SCAN_LIMIT)?.len();
        let executing = self.tasks.list(Some(TaskStatus::Executing), LIST_SCAN_LIMIT)?.len();
        let queued = self.tasks.list(Some(TaskStatus::ApprovedQueued), LIST_SCAN_LIMIT)?.len();
        let grants = self
            .grants
            .list(LIST_SCAN_LIMIT)?
            .iter()
            .filter(|grant| grant.is_active(now))
            .count();
        let rules = self.rules.list(LIST_SCAN_LIMIT)?.len();
        let mut report = String::from("Gateway status\n");
        if let Some(status) = &self.status {
            let snapshot = status.snapshot();
            report.push_str(&format!(
                "Backends: {}\nCatalog: {} tools\n",
                snapshot.backends, snapshot.catalog_size
            ));
        }
        report.push_str(&format!(
            "Tasks: {pending} pending, {queued} queued, {executing} executing\nActive grants: \
             {grants}\nDynamic rules: {rules}"
        ));
        Ok(report)
    }

    async fn command_grant(&self, chat: &ChatId, args: &[String]) -> Result<(), ChannelError> {
        let Some(pattern_text) = args.first() else {
            self.reply(chat, "Usage: grant <pattern> [ttl-ms]").await;
            return Ok(());
        };
        let ttl_ms = match args.get(1) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(value) if value > 0 => value,
                _ => {
                    self.reply(chat, "Grant ttl must be a positive integer.").await;
                    return Ok(());
                }
            },
            None => self.config.short_grant_ttl_ms,
        };
        let pattern = match ToolPattern::new(pattern_text.as_str()) {
            Ok(pattern) => pattern,
            Err(err) => {
                self.reply(chat, &format!("Invalid pattern: {err}.")).await;
                return Ok(());
            }
        };
        let grant = Grant::new(pattern, now_ms(), ttl_ms)
            .map_err(|err| ChannelError::Invalid(err.to_string()))?;
        self.grants.create(grant.clone())?;
        self.reply(
            chat,
            &format!("Grant {} for {} until {}.", grant.id, grant.pattern, grant.expires_at),
        )
        .await;
        Ok(())
    }

    async fn command_grants(&self, chat: &ChatId) -> Result<(), ChannelError> {
        let now = now_ms();
        let grants = self.grants.list(LIST_SCAN_LIMIT)?;
        if grants.is_empty() {
            self.reply(chat, "No grants.").await;
            return Ok(());
        }
        let mut lines = String::from("Grants\n");
        for grant in grants.iter().take(DEFAULT_LIST_LIMIT) {
            let state = if grant.is_active(now) { "active" } else { "expired" };
            lines.push_str(&format!(
                "{} {} until {} ({state})\n",
                grant.id, grant.pattern, grant.expires_at
            ));
        }
        self.reply(chat, lines.trim_end()).await;
        Ok(())
    }

    async fn command_revoke(&self, chat: &ChatId, args: &[String]) -> Result<(), ChannelError> {
        let Some(id) = args.first() else {
            self.reply(chat, "Usage: revoke <grant-id>").await;
            return Ok(());
        };
        let removed = self.grants.remove(&GrantId::new(id.as_str()))?;
        let reply =
            if removed { format!("Grant {id} revoked.") } else { format!("Grant {id} not found.") };
        self.reply(chat, &reply).await;
        Ok(())
    }

    async fn command_rule(&self, chat: &ChatId, args: &[String]) -> Result<(), ChannelError> {
        let (Some(pattern), Some(action)) = (args.first(), args.get(1)) else {
            self.reply(chat, "Usage: rule <pattern> <allow|deny|require-approval>").await;
            return Ok(());
        };
        let Some(action) = parse_action(action) else {
            self.reply(chat, "Action must be allow, deny, or require-approval.").await;
            return Ok(());
        };
        if let Err(err) = ToolPattern::new(pattern.as_str()) {
            self.reply(chat, &format!("Invalid pattern: {err}.")).await;
            return Ok(());
        }
        let rule = self.rules.upsert(pattern, action)?;
        self.reply(chat, &format!("Rule {}: {} -> {}.", rule.id, rule.pattern, action.as_str()))
            .await;
        Ok(())
    }

    async fn command_rules(&self, chat: &ChatId) -> Result<(), ChannelError> {
        let rules = self.rules.list(LIST_SCAN_LIMIT)?;
        if rules.is_empty() {
            self.reply(chat, "No dynamic rules.").await;
            return Ok(());
        }
        let mut lines = String::from("Dynamic rules\n");
        for rule in rules.iter().take(DEFAULT_LIST_LIMIT) {
            lines.push_str(&format!("{} {} -> {}\n", rule.id, rule.pattern, rule.action.as_str()));
        }
        self.reply(chat, lines.trim_end()).await;
        Ok(())
    }

    async fn command_unrule(&self, chat: &ChatId, args: &[String]) -> Result<(), ChannelError> {
        let Some(id) = args.first() else {
            self.reply(chat, "Usage: unrule <rule-id>").await;
            return Ok(());
        };
        let removed = self.rules.remove(&RuleId::new(id.as_str()))?;
        let reply =
            if removed { format!("Rule {id} removed.") } else { format!("Rule {id} not found.") };
        self.reply(chat, &reply).await;
        Ok(())
    }

    async fn command_tasks(&self, chat: &ChatId, args: &[String]) -> Result<(), ChannelError> {
        let status = match args.first().map(String::as_str) {
            None => None,
            Some(label) => match parse_status(label) {
                Some(status) => Some(status),
                None => {
                    self.reply(chat, &format!("Unknown status: {label}.")).await;
                    return Ok(());
                }
            },
        };
        let tasks = self.tasks.list(status, DEFAULT_LIST_LIMIT)?;
        if tasks.is_empty() {
            self.reply(chat, "No tasks.").await;
            return Ok(());
        }
        let mut lines = String::from("Tasks\n");
        for task in &tasks {
            lines.push_str(&format!("{} {} {}\n", task.id, task.status.as_str(), task.tool));
        }
        self.reply(chat, lines.trim_end()).await;
        Ok(())
    }

    async fn command_audit(&self, chat: &ChatId, args: &[String]) -> Result<(), ChannelError> {
        let Some(audit) = &self.audit else {
            self.reply(chat, "Audit stream is not attached.").await;
            return Ok(());
        };
        let limit = args
            .first()
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(10)
            .min(LIST_SCAN_LIMIT);
        let records = audit.read_recent(limit)?;
        if records.is_empty() {
            self.reply(chat, "No audit records.").await;
            return Ok(());
        }
        let mut lines = String::from("Recent audit\n");
        for record in &records {
            let outcome = match (&record.error, &record.approval_status) {
                (Some(error), _) => format!("error: {error}"),
                (None, Some(approval)) => approval.clone(),
                (None, None) => "ok".to_string(),
            };
            lines.push_str(&format!("{} {} {}\n", record.timestamp_ms, record.tool, outcome));
        }
        self.reply(chat, lines.trim_end()).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Probes transport liveness at startup; never fatal.
    pub async fn probe_startup(&self) {
        let started = Instant::now();
        loop {
            match tokio::time::timeout(PROBE_TIMEOUT, self.transport.probe()).await {
                Ok(Ok(())) => return,
                Ok(Err(err)) => {
                    warn(&format!("approval channel probe failed: {err}"));
                }
                Err(_) => {
                    warn("approval channel probe timed out");
                }
            }
            if started.elapsed() >= SLOW_START_WARNING {
                warn("approval channel slow to start; continuing without confirmation");
                return;
            }
            tokio::time::sleep(PROBE_TIMEOUT).await;
        }
    }

    /// Drains incoming updates until the process exits.
    pub async fn run_listener(self: Arc<Self>) {
        loop {
            match self.transport.receive().await {
                Ok(updates) if updates.is_empty() => {
                    tokio::time::sleep(IDLE_POLL_DELAY).await;
                }
                Ok(updates) => {
                    for update in updates {
                        if let Err(err) = self.handle_update(update).await {
                            warn(&format!("approval channel update failed: {err}"));
                        }
                    }
                }
                Err(err) => {
                    warn(&format!("approval channel receive failed: {err}"));
                    tokio::time::sleep(IDLE_POLL_DELAY).await;
                }
            }
        }
    }

    /// Sends a best-effort reply; failures are logged, never propagated.
    async fn reply(&self, chat: &ChatId, text: &str) {
        let outcome = self
            .transport
            .send(OutgoingMessage {
                chat: chat.clone(),
                text: text.to_string(),
                buttons: Vec::new(),
            })
            .await;
        if let Err(err) = outcome {
            warn(&format!("approval channel reply failed: {err}"));
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Splits a command line into tokens, treating `:` like whitespace so
/// `approve:TASK` and `approve TASK` parse the same way.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| ch.is_whitespace() || ch == ':')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a policy action label.
fn parse_action(label: &str) -> Option<PolicyAction> {
    match label {
        "allow" => Some(PolicyAction::Allow),
        "deny" => Some(PolicyAction::Deny),
        "require-approval" => Some(PolicyAction::RequireApproval),
        _ => None,
    }
}

/// Parses a task status label.
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

/// Writes a single-line operator warning to stderr.
fn warn(message: &str) {
    let _ = writeln!(std::io::stderr(), "portero: WARNING: {message}");
}

// ============================================================================
// SECTION: Tests
// ============================================================================
