// portero-mcp/src/virtuals.rs
// ============================================================================
// Module: Portero Virtual Tools
// Description: Gateway-implemented tools always present in the catalog.
// Purpose: Catalog search, delegated calls, and task result retrieval.
// Dependencies: portero-core, serde_json
// ============================================================================

//! ## Overview
//! Four virtual tools live inside the gateway: `portero/search_tools` filters
//! the unfiltered catalog, `portero/call` delegates through the pipeline by
//! full name, `portero/check_task` retrieves a task's status or final result,
//! and `portero/list_tasks` summarizes tasks. Search categories map to a
//! fixed keyword table; unknown categories fall through to a literal
//! substring match.

// ============================================================================
// SECTION: Imports
// ============================================================================

use portero_core::Task;
use portero_core::TaskStatus;
use serde_json::Value;
use serde_json::json;

use crate::aggregate::AggregatedTool;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Namespace prefix of virtual tools.
pub const VIRTUAL_PREFIX: &str = "portero/";
/// Catalog search virtual tool.
pub const SEARCH_TOOLS: &str = "portero/search_tools";
/// Delegated call virtual tool.
pub const CALL: &str = "portero/call";
/// Task status retrieval virtual tool.
pub const CHECK_TASK: &str = "portero/check_task";
/// Task summary virtual tool.
pub const LIST_TASKS: &str = "portero/list_tasks";

/// Hard cap for `portero/list_tasks`.
pub const LIST_TASKS_MAX: usize = 100;
/// Default limit for `portero/list_tasks`.
pub const LIST_TASKS_DEFAULT: usize = 20;

/// Fixed category keyword map for catalog search.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("filesystem", &["file", "directory", "path", "folder"]),
    ("google", &["google", "gmail", "calendar", "drive"]),
    ("gmail", &["gmail", "mail", "email"]),
    ("calendar", &["calendar", "event", "meeting", "schedule"]),
    ("drive", &["drive", "document", "spreadsheet", "folder"]),
    ("email", &["email", "mail", "message", "send"]),
    ("stripe", &["stripe", "payment", "invoice", "customer"]),
    ("github", &["github", "repository", "pull", "issue", "branch"]),
    ("database", &["database", "query", "table", "record"]),
];

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Returns the virtual tool definitions for `tools/list`.
#[must_use]
pub fn definitions() -> Vec<Value> {
    vec![
        json!({
            "name": SEARCH_TOOLS,
            "description": "Search the full tool catalog by query or category.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "category": { "type": "string" },
                },
            },
        }),
        json!({
            "name": CALL,
            "description": "Call any catalog tool by its full backend/name.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "tool": { "type": "string" },
                    "args": { "type": "object" },
                },
                "required": ["tool"],
            },
        }),
        json!({
            "name": CHECK_TASK,
            "description": "Retrieve the status or final result of a task.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "task_id": { "type": "string" },
                },
                "required": ["task_id"],
            },
        }),
        json!({
            "name": LIST_TASKS,
            "description": "Summarize tasks, optionally filtered by status.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "status": { "type": "string" },
                    "limit": { "type": "integer" },
                },
            },
        }),
    ]
}

/// Returns true when `name` names a virtual tool.
#[must_use]
pub fn is_virtual(name: &str) -> bool {
    name.starts_with(VIRTUAL_PREFIX)
}

// ============================================================================
// SECTION: Search
// ============================================================================

/// Filters the unfiltered catalog by query and category.
#[must_use]
pub fn search(catalog: &[AggregatedTool], query: Option<&str>, category: Option<&str>) -> Value {
    let matches: Vec<&AggregatedTool> = catalog
        .iter()
        .filter(|tool| {
            category.is_none_or(|category| matches_category(tool, category))
                && query.is_none_or(|query| matches_text(tool, query))
        })
        .collect();
    let tools: Vec<Value> = matches
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
            })
        })
        .collect();
    text_content(&json!({
        "count": tools.len(),
        "tools": tools,
    }))
}

/// Returns true when the tool matches the category keyword table, or the
/// literal category text for unknown categories.
fn matches_category(tool: &AggregatedTool, category: &str) -> bool {
    let category = category.to_ascii_lowercase();
    match CATEGORY_KEYWORDS.iter().find(|(name, _)| *name == category) {
        Some((_, keywords)) => keywords.iter().any(|keyword| matches_text(tool, keyword)),
        None => matches_text(tool, &category),
    }
}

/// Case-insensitive substring match on name and description.
fn matches_text(tool: &AggregatedTool, needle: &str) -> bool {
    let needle = needle.to_ascii_lowercase();
    tool.name.to_ascii_lowercase().contains(&needle)
        || tool.description.to_ascii_lowercase().contains(&needle)
}

// ============================================================================
// SECTION: Task Views
// ============================================================================

/// Renders the `portero/check_task` reply for a known task.
///
/// Completed tasks return the stored result verbatim; every other status
/// returns a status envelope.
#[must_use]
pub fn check_task_reply(task: &Task) -> Value {
    if task.status == TaskStatus::Completed
        && let Some(result) = &task.result
    {
        return result.clone();
    }
    let mut envelope = json!({
        "status": task.status.as_str(),
        "task_id": task.id,
        "tool": task.tool,
    });
    if let Some(error) = &task.error
        && let Some(fields) = envelope.as_object_mut()
    {
        fields.insert("error".to_string(), json!(error));
    }
    text_content(&envelope)
}

/// Renders the `portero/check_task` reply for an unknown task id.
#[must_use]
pub fn task_not_found_reply(task_id: &str) -> Value {
    text_content(&json!({
        "status": "not-found",
        "task_id": task_id,
    }))
}

/// Renders the `portero/list_tasks` reply.
#[must_use]
pub fn list_tasks_reply(tasks: &[Task]) -> Value {
    let summaries: Vec<Value> = tasks
        .iter()
        .map(|task| {
            json!({
                "task_id": task.id,
                "tool": task.tool,
                "status": task.status.as_str(),
                "created_at": task.created_at,
            })
        })
        .collect();
    text_content(&json!({
        "count": summaries.len(),
        "tasks": summaries,
    }))
}

/// Renders the pending-approval reply for a freshly parked task.
#[must_use]
pub fn pending_reply(task: &Task, message: &str) -> Value {
    text_content(&json!({
        "status": "pending-approval",
        "task_id": task.id,
        "tool": task.tool,
        "message": message,
    }))
}

/// Wraps a payload in the text-content reply shape.
#[must_use]
pub fn text_content(payload: &Value) -> Value {
    let text = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    json!({
        "content": [
            {
                "type": "text",
                "text": text,
            }
        ]
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use portero_core::BackendName;
    use portero_core::PolicyAction;
    use portero_core::Task;
    use serde_json::json;

    use super::check_task_reply;
    use super::is_virtual;
    use super::pending_reply;
    use super::search;
    use crate::aggregate::AggregatedTool;

    fn tool(name: &str, description: &str) -> AggregatedTool {
        let (backend, local) = name.split_once('/').expect("name");
        AggregatedTool {
            name: name.to_string(),
            backend: BackendName::new(backend),
            local: local.to_string(),
            description: description.to_string(),
            input_schema: json!({}),
        }
    }

    fn decode_text(reply: &serde_json::Value) -> serde_json::Value {
        let text = reply["content"][0]["text"].as_str().expect("text content");
        serde_json::from_str(text).expect("payload")
    }

    #[test]
    fn virtual_names_are_detected() {
        assert!(is_virtual("portero/search_tools"));
        assert!(is_virtual("portero/check_task"));
        assert!(!is_virtual("filesystem/read_file"));
    }

    #[test]
    fn search_matches_query_case_insensitively() {
        let catalog = vec![
            tool("fs/read_file", "Reads a file"),
            tool("mail/send_email", "Sends an email"),
        ];
        let payload = decode_text(&search(&catalog, Some("READ"), None));
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["tools"][0]["name"], "fs/read_file");
    }

    #[test]
    fn known_category_uses_keyword_table() {
        let catalog = vec![
            tool("mail/send_email", "Sends an email message"),
            tool("fs/read_file", "Reads a file"),
        ];
        let payload = decode_text(&search(&catalog, None, Some("email")));
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["tools"][0]["name"], "mail/send_email");
    }

    #[test]
    fn unknown_category_falls_back_to_substring() {
        let catalog = vec![tool("acme/frobnicate", "Frobnicates widgets")];
        let payload = decode_text(&search(&catalog, None, Some("frobnicate")));
        assert_eq!(payload["count"], 1);
        let payload = decode_text(&search(&catalog, None, Some("nonexistent")));
        assert_eq!(payload["count"], 0);
    }

    #[test]
    fn completed_task_returns_stored_result_verbatim() {
        let mut task = Task::new(
            "fs/read_file",
            json!({}),
            json!({}),
            PolicyAction::RequireApproval,
            1_000,
        );
        task.status = portero_core::TaskStatus::Completed;
        task.result = Some(json!({ "content": [{ "type": "text", "text": "data" }] }));
        let reply = check_task_reply(&task);
        assert_eq!(reply, json!({ "content": [{ "type": "text", "text": "data" }] }));
    }

    #[test]
    fn pending_task_returns_status_envelope() {
        let task = Task::new(
            "fs/read_file",
            json!({}),
            json!({}),
            PolicyAction::RequireApproval,
            1_000,
        );
        let payload = decode_text(&check_task_reply(&task));
        assert_eq!(payload["status"], "pending-approval");
        assert_eq!(payload["tool"], "fs/read_file");
    }

    #[test]
    fn pending_reply_carries_task_id() {
        let task = Task::new(
            "github/create_pull_request",
            json!({}),
            json!({}),
            PolicyAction::RequireApproval,
            1_000,
        );
        let payload = decode_text(&pending_reply(&task, "Approval requested."));
        assert_eq!(payload["status"], "pending-approval");
        assert_eq!(payload["task_id"], json!(task.id));
        assert_eq!(payload["message"], "Approval requested.");
    }
}
