// portero-mcp/tests/pipeline_scenarios.rs
// ============================================================================
// Module: Pipeline Scenario Tests
// Description: End-to-end flows over the pipeline, channel, and executor.
// Purpose: Exercise allow, deny, deferral, grant, and anonymizer round trips.
// Dependencies: portero-mcp, portero-channel, portero-store, tokio
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use portero_channel::ActivityDigest;
use portero_channel::ApprovalChannel;
use portero_channel::ApprovalChannelConfig;
use portero_channel::ApprovalChoice;
use portero_channel::ChatTransport;
use portero_channel::ChatUpdate;
use portero_channel::OutgoingMessage;
use portero_channel::PairingGuard;
use portero_channel::TransportError;
use portero_core::AuditRecord;
use portero_core::AuditSink;
use portero_core::BackendName;
use portero_core::ChatId;
use portero_core::PolicyAction;
use portero_core::ReplacementRule;
use portero_core::StaticPatternRule;
use portero_core::StaticPolicy;
use portero_core::TaskId;
use portero_core::TaskStatus;
use portero_core::interfaces::AdminStore;
use portero_core::runtime::anonymizer::Anonymizer;
use portero_core::runtime::resolver::PolicyResolver;
use portero_core::runtime::tasks::TaskManager;
use portero_mcp::BackendConnection;
use portero_mcp::BackendError;
use portero_mcp::BackendRegistry;
use portero_mcp::PipelineConfig;
use portero_mcp::PipelineError;
use portero_mcp::RequestPipeline;
use portero_mcp::ResourceDescriptor;
use portero_mcp::Router;
use portero_mcp::TaskExecutor;
use portero_mcp::ToolAggregator;
use portero_mcp::ToolDescriptor;
use portero_store::FileStore;
use serde_json::Value;
use serde_json::json;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Fakes
// ============================================================================

/// Backend that records calls and echoes its arguments.
#[derive(Default)]
struct EchoBackend {
    calls: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl BackendConnection for EchoBackend {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BackendError> {
        Ok(vec![
            ToolDescriptor {
                name: "read_file".to_string(),
                description: "Reads a file".to_string(),
                input_schema: json!({ "type": "object" }),
            },
            ToolDescriptor {
                name: "echo".to_string(),
                description: "Echoes its input".to_string(),
                input_schema: json!({ "type": "object" }),
            },
        ])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, BackendError> {
        self.calls.lock().expect("calls lock").push((name.to_string(), arguments.clone()));
        Ok(json!({
            "content": [
                {
                    "type": "text",
                    "text": arguments.to_string(),
                }
            ]
        }))
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, BackendError> {
        Ok(Vec::new())
    }

    async fn read_resource(&self, _uri: &str) -> Result<Value, BackendError> {
        Err(BackendError::Transport("no resources".to_string()))
    }
}

/// Audit sink capturing records for assertions.
#[derive(Default)]
struct CapturingAudit {
    records: Mutex<Vec<AuditRecord>>,
}

impl AuditSink for CapturingAudit {
    fn record(&self, record: &AuditRecord) {
        self.records.lock().expect("records lock").push(record.clone());
    }
}

/// Chat transport capturing approval requests.
#[derive(Default)]
struct CapturingTransport {
    sent: Mutex<Vec<OutgoingMessage>>,
}

#[async_trait]
impl ChatTransport for CapturingTransport {
    async fn send(&self, message: OutgoingMessage) -> Result<String, TransportError> {
        let mut sent = self.sent.lock().expect("sent lock");
        sent.push(message);
        Ok(format!("msg-{}", sent.len()))
    }

    async fn receive(&self) -> Result<Vec<ChatUpdate>, TransportError> {
        Ok(Vec::new())
    }

    async fn probe(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Transport whose sends always fail.
struct FailingTransport;

#[async_trait]
impl ChatTransport for FailingTransport {
    async fn send(&self, _message: OutgoingMessage) -> Result<String, TransportError> {
        Err(TransportError::Send("bot unreachable".to_string()))
    }

    async fn receive(&self) -> Result<Vec<ChatUpdate>, TransportError> {
        Ok(Vec::new())
    }

    async fn probe(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Fixture
// ============================================================================

struct Fixture {
    _dir: tempfile::TempDir,
    backend: Arc<EchoBackend>,
    audit: Arc<CapturingAudit>,
    pipeline: Arc<RequestPipeline>,
    channel: Arc<ApprovalChannel>,
    tasks: TaskManager,
    admin: ChatId,
}

struct FixtureOptions {
    policy: StaticPolicy,
    replacements: Vec<ReplacementRule>,
    transport: Arc<dyn ChatTransport>,
    short_grant_ttl_ms: i64,
    spawn_executor: bool,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            policy: StaticPolicy {
                exact: BTreeMap::new(),
                patterns: Vec::new(),
                default_action: PolicyAction::Allow,
            },
            replacements: Vec::new(),
            transport: Arc::new(CapturingTransport::default()),
            short_grant_ttl_ms: 60_000,
            spawn_executor: true,
        }
    }
}

fn fixture(options: FixtureOptions) -> Fixture {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(FileStore::open(dir.path()).expect("store"));
    let admin = ChatId::new("admin-1");
    store.set_admin(admin.clone()).expect("pair admin");

    let backend = Arc::new(EchoBackend::default());
    let mut registry = BackendRegistry::new();
    registry.insert(BackendName::new("filesystem"), backend.clone(), None);
    registry.insert(BackendName::new("github"), backend.clone(), None);
    let registry = Arc::new(registry);

    let aggregator = Arc::new(ToolAggregator::new(registry.clone()));
    let router = Router::new(registry.clone());
    let anonymizer = Arc::new(Anonymizer::new(options.replacements).expect("anonymizer"));
    let resolver = Arc::new(PolicyResolver::new(options.policy, store.clone()));
    let tasks = TaskManager::new(store.clone());
    let audit = Arc::new(CapturingAudit::default());
    let digest = ActivityDigest::disabled();

    let (executor_tx, executor_rx) = mpsc::channel(16);
    let pairing = PairingGuard::new(store.clone(), None);
    let channel = Arc::new(ApprovalChannel::new(
        options.transport,
        pairing,
        tasks.clone(),
        store.clone(),
        store.clone(),
        executor_tx,
        ApprovalChannelConfig {
            short_grant_ttl_ms: options.short_grant_ttl_ms,
            long_grant_ttl_ms: 86_400_000,
        },
    ));

    if options.spawn_executor {
        let executor = TaskExecutor::new(
            router.clone(),
            anonymizer.clone(),
            tasks.clone(),
            registry.clone(),
            ActivityDigest::disabled(),
            audit.clone(),
            executor_rx,
        );
        tokio::spawn(executor.run());
    }

    let pipeline = Arc::new(RequestPipeline::new(PipelineConfig {
        registry,
        aggregator,
        router,
        anonymizer,
        resolver,
        grants: store.clone(),
        tasks: tasks.clone(),
        channel: Some(channel.clone()),
        digest,
        audit: audit.clone(),
    }));

    Fixture {
        _dir: dir,
        backend,
        audit,
        pipeline,
        channel,
        tasks,
        admin,
    }
}

fn decode_text(reply: &Value) -> Value {
    let text = reply["content"][0]["text"].as_str().expect("text content");
    serde_json::from_str(text).expect("payload")
}

async fn wait_for_status(tasks: &TaskManager, id: &TaskId, status: TaskStatus) {
    for _ in 0..100 {
        let task = tasks.get(id).expect("get").expect("task");
        if task.status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task never reached {status:?}");
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

#[tokio::test]
async fn allow_path_dispatches_once_and_audits() {
    let mut exact = BTreeMap::new();
    exact.insert("filesystem/read_file".to_string(), PolicyAction::Allow);
    let fixture = fixture(FixtureOptions {
        policy: StaticPolicy {
            exact,
            patterns: Vec::new(),
            default_action: PolicyAction::Allow,
        },
        ..FixtureOptions::default()
    });

    let reply = fixture
        .pipeline
        .call_tool("filesystem/read_file", json!({ "path": "/x" }))
        .await
        .expect("call");

    let calls = fixture.backend.calls.lock().expect("calls lock");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "read_file");
    assert_eq!(calls[0].1, json!({ "path": "/x" }));
    drop(calls);

    assert_eq!(reply["content"][0]["type"], "text");

    let records = fixture.audit.records.lock().expect("records lock");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tool, "filesystem/read_file");
    assert_eq!(records[0].approval_status, None);
    assert_eq!(records[0].error, None);
}

#[tokio::test]
async fn deny_path_raises_and_audits() {
    let mut exact = BTreeMap::new();
    exact.insert("filesystem/delete_file".to_string(), PolicyAction::Deny);
    let fixture = fixture(FixtureOptions {
        policy: StaticPolicy {
            exact,
            patterns: Vec::new(),
            default_action: PolicyAction::Allow,
        },
        ..FixtureOptions::default()
    });

    let err = fixture
        .pipeline
        .call_tool("filesystem/delete_file", json!({ "path": "/x" }))
        .await
        .expect_err("denied");
    assert!(err.to_string().contains("denied by policy"));
    assert!(matches!(err, PipelineError::Denied(_)));

    assert!(fixture.backend.calls.lock().expect("calls lock").is_empty());
    let records = fixture.audit.records.lock().expect("records lock");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].error.as_deref(), Some("denied by policy"));
    assert_eq!(records[0].approval_status, None);
}

#[tokio::test]
async fn approval_deferral_parks_then_executes_after_approve() {
    let fixture = fixture(FixtureOptions {
        policy: StaticPolicy {
            exact: BTreeMap::new(),
            patterns: vec![StaticPatternRule {
                pattern: "github/*".to_string(),
                action: PolicyAction::RequireApproval,
            }],
            default_action: PolicyAction::Allow,
        },
        ..FixtureOptions::default()
    });

    let reply = fixture
        .pipeline
        .call_tool("github/echo", json!({ "title": "release" }))
        .await
        .expect("park");
    let payload = decode_text(&reply);
    assert_eq!(payload["status"], "pending-approval");
    let task_id = TaskId::new(payload["task_id"].as_str().expect("task id"));

    // No dispatch happened; the task is durable and pending.
    assert!(fixture.backend.calls.lock().expect("calls lock").is_empty());
    let task = fixture.tasks.get(&task_id).expect("get").expect("task");
    assert_eq!(task.status, TaskStatus::PendingApproval);
    assert!(task.approval_message.is_some());

    fixture
        .channel
        .ingest_decision(&fixture.admin, ApprovalChoice::Approve, &task_id)
        .await
        .expect("approve");
    wait_for_status(&fixture.tasks, &task_id, TaskStatus::Completed).await;

    // The stored result is the backend reply verbatim.
    let check = fixture
        .pipeline
        .call_tool("portero/check_task", json!({ "task_id": task_id }))
        .await
        .expect("check");
    assert_eq!(check["content"][0]["text"], json!({ "title": "release" }).to_string());

    let calls = fixture.backend.calls.lock().expect("calls lock");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "echo");

    let records = fixture.audit.records.lock().expect("records lock");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].approval_status.as_deref(), Some("approved"));
}

#[tokio::test]
async fn grant_side_effect_short_circuits_until_expiry() {
    let fixture = fixture(FixtureOptions {
        policy: StaticPolicy {
            exact: BTreeMap::new(),
            patterns: vec![StaticPatternRule {
                pattern: "github/*".to_string(),
                action: PolicyAction::RequireApproval,
            }],
            default_action: PolicyAction::Allow,
        },
        short_grant_ttl_ms: 500,
        ..FixtureOptions::default()
    });

    let reply =
        fixture.pipeline.call_tool("github/echo", json!({ "n": 1 })).await.expect("park");
    let payload = decode_text(&reply);
    let task_id = TaskId::new(payload["task_id"].as_str().expect("task id"));
    fixture
        .channel
        .ingest_decision(&fixture.admin, ApprovalChoice::ApproveGrantShort, &task_id)
        .await
        .expect("approve with grant");
    wait_for_status(&fixture.tasks, &task_id, TaskStatus::Completed).await;

    // While the grant is active the same tool dispatches synchronously.
    let second =
        fixture.pipeline.call_tool("github/echo", json!({ "n": 2 })).await.expect("call");
    assert_eq!(second["content"][0]["type"], "text");
    assert_eq!(fixture.tasks.list(None, 10).expect("list").len(), 1, "no second task");

    // After expiry the call parks again.
    tokio::time::sleep(Duration::from_millis(700)).await;
    let third = fixture.pipeline.call_tool("github/echo", json!({ "n": 3 })).await.expect("park");
    let payload = decode_text(&third);
    assert_eq!(payload["status"], "pending-approval");
    assert_eq!(fixture.tasks.list(None, 10).expect("list").len(), 2);
}

#[tokio::test]
async fn anonymizer_round_trips_bidirectional_and_one_way_rules() {
    let fixture = fixture(FixtureOptions {
        replacements: vec![
            ReplacementRule {
                fake: "John Doe".to_string(),
                real: "Jane Real".to_string(),
                bidirectional: true,
                case_sensitive: true,
                response_replacement: None,
            },
            ReplacementRule {
                fake: "FAKE_KEY".to_string(),
                real: "sk_secret".to_string(),
                bidirectional: false,
                case_sensitive: true,
                response_replacement: Some("***".to_string()),
            },
        ],
        ..FixtureOptions::default()
    });

    let reply = fixture
        .pipeline
        .call_tool("filesystem/echo", json!({ "name": "John Doe", "key": "FAKE_KEY" }))
        .await
        .expect("call");

    // The backend saw the real values.
    let calls = fixture.backend.calls.lock().expect("calls lock");
    assert_eq!(calls[0].1, json!({ "name": "Jane Real", "key": "sk_secret" }));
    drop(calls);

    // The caller sees the fake value back, and never the one-way secret.
    let text = reply["content"][0]["text"].as_str().expect("text");
    assert!(text.contains("John Doe"));
    assert!(text.contains("***"));
    assert!(!text.contains("Jane Real"));
    assert!(!text.contains("sk_secret"));
}

#[tokio::test]
async fn approval_send_failure_moves_task_to_error_but_returns_envelope() {
    let fixture = fixture(FixtureOptions {
        policy: StaticPolicy {
            exact: BTreeMap::new(),
            patterns: vec![StaticPatternRule {
                pattern: "github/*".to_string(),
                action: PolicyAction::RequireApproval,
            }],
            default_action: PolicyAction::Allow,
        },
        transport: Arc::new(FailingTransport),
        ..FixtureOptions::default()
    });

    let reply = fixture
        .pipeline
        .call_tool("github/echo", json!({ "title": "x" }))
        .await
        .expect("envelope still returned");
    let payload = decode_text(&reply);
    assert_eq!(payload["status"], "pending-approval");
    let task_id = TaskId::new(payload["task_id"].as_str().expect("task id"));

    let task = fixture.tasks.get(&task_id).expect("get").expect("task");
    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.error.as_deref().expect("error").contains("approval request failed"));

    // The caller learns the outcome by polling.
    let check = fixture
        .pipeline
        .call_tool("portero/check_task", json!({ "task_id": task_id }))
        .await
        .expect("check");
    let payload = decode_text(&check);
    assert_eq!(payload["status"], "error");
}

#[tokio::test]
async fn delegated_virtual_call_flows_through_policy() {
    let mut exact = BTreeMap::new();
    exact.insert("filesystem/delete_file".to_string(), PolicyAction::Deny);
    let fixture = fixture(FixtureOptions {
        policy: StaticPolicy {
            exact,
            patterns: Vec::new(),
            default_action: PolicyAction::Allow,
        },
        ..FixtureOptions::default()
    });

    let err = fixture
        .pipeline
        .call_tool(
            "portero/call",
            json!({ "tool": "filesystem/delete_file", "args": { "path": "/x" } }),
        )
        .await
        .expect_err("denied through delegation");
    assert!(matches!(err, PipelineError::Denied(_)));

    let reply = fixture
        .pipeline
        .call_tool(
            "portero/call",
            json!({ "tool": "filesystem/read_file", "args": { "path": "/x" } }),
        )
        .await
        .expect("delegated call");
    assert_eq!(reply["content"][0]["type"], "text");
}

#[tokio::test]
async fn search_tools_filters_the_unfiltered_catalog() {
    let fixture = fixture(FixtureOptions::default());
    let reply = fixture
        .pipeline
        .call_tool("portero/search_tools", json!({ "query": "read" }))
        .await
        .expect("search");
    let payload = decode_text(&reply);
    assert_eq!(payload["count"], 2, "read_file from both registered backends");
}

#[tokio::test]
async fn check_task_reports_not_found_as_structured_reply() {
    let fixture = fixture(FixtureOptions::default());
    let reply = fixture
        .pipeline
        .call_tool("portero/check_task", json!({ "task_id": "missing" }))
        .await
        .expect("structured reply");
    let payload = decode_text(&reply);
    assert_eq!(payload["status"], "not-found");
}

#[tokio::test]
async fn list_tasks_caps_limit() {
    let fixture = fixture(FixtureOptions::default());
    for index in 0..3 {
        fixture
            .tasks
            .create(
                format!("github/tool_{index}"),
                json!({}),
                json!({}),
                PolicyAction::RequireApproval,
            )
            .expect("create");
    }
    let reply = fixture
        .pipeline
        .call_tool("portero/list_tasks", json!({ "limit": 2 }))
        .await
        .expect("list");
    let payload = decode_text(&reply);
    assert_eq!(payload["count"], 2);
}
