// portero-channel/src/render.rs
// ============================================================================
// Module: Portero Approval Rendering
// Description: Type-aware human-readable summaries of parked tool calls.
// Purpose: Show the admin what a task will do before they decide.
// Dependencies: portero-core, serde_json
// ============================================================================

//! ## Overview
//! Approval requests render the caller-facing arguments of a parked task.
//! Recognized argument shapes get a family-specific summary (email, calendar
//! event, file operation, source-control action, document or database record,
//! payment); anything else falls through to a generic key-value summary of
//! the first eight fields. Values are truncated to keep messages chat-sized.

// ============================================================================
// SECTION: Imports
// ============================================================================

use portero_core::Task;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum characters of an email body shown to the admin.
const MAX_BODY_CHARS: usize = 800;
/// Maximum characters of any other rendered value.
const MAX_VALUE_CHARS: usize = 200;
/// Maximum fields shown by the generic summary.
const MAX_GENERIC_FIELDS: usize = 8;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Renders the approval request body for a parked task.
#[must_use]
pub fn render_approval_request(task: &Task) -> String {
    let mut message = format!("Approval required: {}\nTask: {}\n", task.tool, task.id);
    message.push_str(&render_args(&task.original_args));
    message
}

/// Renders the argument summary for caller-facing arguments.
#[must_use]
pub fn render_args(args: &Value) -> String {
    let Value::Object(fields) = args else {
        return format!("Arguments: {}\n", truncate(&args.to_string(), MAX_VALUE_CHARS));
    };
    if is_email(fields) {
        return render_email(fields);
    }
    if is_calendar_event(fields) {
        return render_calendar_event(fields);
    }
    if is_file_operation(fields) {
        return render_file_operation(fields);
    }
    if is_source_control(fields) {
        return render_source_control(fields);
    }
    if is_record(fields) {
        return render_record(fields);
    }
    if is_payment(fields) {
        return render_payment(fields);
    }
    render_generic(fields)
}

// ============================================================================
// SECTION: Family Detection
// ============================================================================

type Fields = serde_json::Map<String, Value>;

fn is_email(fields: &Fields) -> bool {
    fields.contains_key("to") && (fields.contains_key("subject") || fields.contains_key("body"))
}

fn is_calendar_event(fields: &Fields) -> bool {
    fields.contains_key("summary") && (fields.contains_key("start") || fields.contains_key("end"))
}

fn is_file_operation(fields: &Fields) -> bool {
    fields.contains_key("path") || fields.contains_key("destination")
}

fn is_source_control(fields: &Fields) -> bool {
    fields.contains_key("owner") && fields.contains_key("repo")
}

fn is_record(fields: &Fields) -> bool {
    ["database_id", "page_id", "record_id", "collection"]
        .iter()
        .any(|key| fields.contains_key(*key))
}

fn is_payment(fields: &Fields) -> bool {
    fields.contains_key("amount")
        && (fields.contains_key("currency") || fields.contains_key("customer"))
}

// ============================================================================
// SECTION: Family Renderers
// ============================================================================

fn render_email(fields: &Fields) -> String {
    let mut lines = String::from("Email\n");
    push_field(&mut lines, fields, "to", "To");
    push_field(&mut lines, fields, "cc", "Cc");
    push_field(&mut lines, fields, "bcc", "Bcc");
    push_field(&mut lines, fields, "subject", "Subject");
    if let Some(body) = fields.get("body") {
        lines.push_str(&format!("Body: {}\n", truncate(&scalar(body), MAX_BODY_CHARS)));
    }
    lines
}

fn render_calendar_event(fields: &Fields) -> String {
    let mut lines = String::from("Calendar event\n");
    push_field(&mut lines, fields, "summary", "Summary");
    push_field(&mut lines, fields, "start", "Start");
    push_field(&mut lines, fields, "end", "End");
    push_field(&mut lines, fields, "attendees", "Attendees");
    push_field(&mut lines, fields, "location", "Location");
    push_field(&mut lines, fields, "description", "Description");
    lines
}

fn render_file_operation(fields: &Fields) -> String {
    let mut lines = String::from("File operation\n");
    push_field(&mut lines, fields, "path", "Path");
    push_field(&mut lines, fields, "destination", "Destination");
    if let Some(content) = fields.get("content") {
        let length = match content {
            Value::String(text) => text.chars().count(),
            other => other.to_string().chars().count(),
        };
        lines.push_str(&format!("Content length: {length}\n"));
    }
    lines
}

fn render_source_control(fields: &Fields) -> String {
    let mut lines = String::from("Source-control action\n");
    push_field(&mut lines, fields, "owner", "Owner");
    push_field(&mut lines, fields, "repo", "Repo");
    push_field(&mut lines, fields, "title", "Title");
    push_field(&mut lines, fields, "body", "Body");
    push_field(&mut lines, fields, "branch", "Branch");
    push_field(&mut lines, fields, "head", "Head");
    push_field(&mut lines, fields, "base", "Base");
    lines
}

fn render_record(fields: &Fields) -> String {
    let mut lines = String::from("Record operation\n");
    push_field(&mut lines, fields, "database_id", "Database");
    push_field(&mut lines, fields, "page_id", "Page");
    push_field(&mut lines, fields, "record_id", "Record");
    push_field(&mut lines, fields, "collection", "Collection");
    push_field(&mut lines, fields, "properties", "Properties");
    lines
}

fn render_payment(fields: &Fields) -> String {
    let mut lines = String::from("Payment operation\n");
    push_field(&mut lines, fields, "amount", "Amount");
    push_field(&mut lines, fields, "currency", "Currency");
    push_field(&mut lines, fields, "customer", "Customer");
    push_field(&mut lines, fields, "description", "Description");
    push_field(&mut lines, fields, "email", "Email");
    push_field(&mut lines, fields, "name", "Name");
    lines
}

fn render_generic(fields: &Fields) -> String {
    let mut lines = String::from("Arguments\n");
    for (key, value) in fields.iter().take(MAX_GENERIC_FIELDS) {
        lines.push_str(&format!("{key}: {}\n", truncate(&scalar(value), MAX_VALUE_CHARS)));
    }
    let hidden = fields.len().saturating_sub(MAX_GENERIC_FIELDS);
    if hidden > 0 {
        lines.push_str(&format!("(+{hidden} more)\n"));
    }
    lines
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Appends `Label: value` when the field is present.
fn push_field(lines: &mut String, fields: &Fields, key: &str, label: &str) {
    if let Some(value) = fields.get(key) {
        lines.push_str(&format!("{label}: {}\n", truncate(&scalar(value), MAX_VALUE_CHARS)));
    }
}

/// Renders a JSON value as a single line.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Truncates to `max` characters, appending an ellipsis when shortened.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(max).collect();
    shortened.push('…');
    shortened
}

// ============================================================================
// SECTION: Tests
// ============================================================================
