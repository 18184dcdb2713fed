// portero-store/src/store.rs
// ============================================================================
// Module: Portero File Store
// Description: JSON-document collections with atomic file replacement.
// Purpose: Implement the core store traits over a state directory.
// Dependencies: portero-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Each collection lives in `<state_dir>/<collection>.json` as a document
//! with a single top-level list field, newest entries first. Reads tolerate a
//! missing file and return the empty shape. Every write is a read-modify-write
//! under that collection's lock, serialized to `<collection>.json.tmp` in the
//! same directory and renamed over the target.
//!
//! A legacy `approvals.json` document may exist in older state directories;
//! this store never reads or writes it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use portero_core::ChatId;
use portero_core::DynamicRule;
use portero_core::Grant;
use portero_core::GrantId;
use portero_core::PolicyAction;
use portero_core::RuleId;
use portero_core::StoreError;
use portero_core::Task;
use portero_core::TaskId;
use portero_core::TaskStatus;
use portero_core::interfaces::AdminStore;
use portero_core::interfaces::GrantStore;
use portero_core::interfaces::MutationOutcome;
use portero_core::interfaces::RuleStore;
use portero_core::interfaces::TaskStore;
use portero_core::now_ms;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

// ============================================================================
// SECTION: Documents
// ============================================================================

/// Task collection document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TasksDocument {
    /// Tasks, newest first.
    tasks: Vec<Task>,
}

/// Grant collection document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GrantsDocument {
    /// Grants, newest first.
    grants: Vec<Grant>,
}

/// Dynamic rule collection document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RulesDocument {
    /// Rules, newest first.
    rules: Vec<DynamicRule>,
}

/// Admin pairing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AdminRecord {
    /// Paired admin chat principal.
    chat_id: ChatId,
    /// Pairing timestamp (unix epoch milliseconds).
    paired_at: i64,
}

/// Admin pairing document; holds at most one record.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AdminDocument {
    /// Pairing records, newest first.
    admin: Vec<AdminRecord>,
}

// ============================================================================
// SECTION: File Store
// ============================================================================

/// File-backed store over a state directory.
pub struct FileStore {
    /// Path of the tasks document.
    tasks_path: PathBuf,
    /// Path of the grants document.
    grants_path: PathBuf,
    /// Path of the rules document.
    rules_path: PathBuf,
    /// Path of the admin document.
    admin_path: PathBuf,
    /// Serializes task writers.
    tasks_lock: Mutex<()>,
    /// Serializes grant writers.
    grants_lock: Mutex<()>,
    /// Serializes rule writers.
    rules_lock: Mutex<()>,
    /// Serializes admin writers.
    admin_lock: Mutex<()>,
}

impl FileStore {
    /// Opens a store over `state_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the directory cannot be
    /// created.
    pub fn open(state_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(state_dir)
            .map_err(|err| StoreError::Unavailable(format!("state dir create failed: {err}")))?;
        Ok(Self {
            tasks_path: state_dir.join("tasks.json"),
            grants_path: state_dir.join("grants.json"),
            rules_path: state_dir.join("rules.json"),
            admin_path: state_dir.join("admin.json"),
            tasks_lock: Mutex::new(()),
            grants_lock: Mutex::new(()),
            rules_lock: Mutex::new(()),
            admin_lock: Mutex::new(()),
        })
    }

    fn guard<'a>(lock: &'a Mutex<()>) -> Result<MutexGuard<'a, ()>, StoreError> {
        lock.lock().map_err(|_| StoreError::Unavailable("collection lock poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Document I/O
// ============================================================================

/// Reads a collection document, returning the empty shape for missing files.
fn read_document<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(err) => {
            return Err(StoreError::Unavailable(format!(
                "read failed for {}: {err}",
                path.display()
            )));
        }
    };
    serde_json::from_slice(&content).map_err(|err| {
        StoreError::Serialization(format!("parse failed for {}: {err}", path.display()))
    })
}

/// Writes a collection document atomically: temp file, then rename.
fn write_document<T: Serialize>(path: &Path, document: &T) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(document).map_err(|err| {
        StoreError::Serialization(format!("serialize failed for {}: {err}", path.display()))
    })?;
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);
    fs::write(&temp_path, payload).map_err(|err| {
        StoreError::Unavailable(format!("write failed for {}: {err}", temp_path.display()))
    })?;
    fs::rename(&temp_path, path).map_err(|err| {
        StoreError::Unavailable(format!("rename failed for {}: {err}", path.display()))
    })
}

// ============================================================================
// SECTION: Task Store
// ============================================================================

impl TaskStore for FileStore {
    fn create(&self, task: Task) -> Result<(), StoreError> {
        let _guard = Self::guard(&self.tasks_lock)?;
        let mut document: TasksDocument = read_document(&self.tasks_path)?;
        document.tasks.insert(0, task);
        write_document(&self.tasks_path, &document)
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let _guard = Self::guard(&self.tasks_lock)?;
        let document: TasksDocument = read_document(&self.tasks_path)?;
        Ok(document.tasks.into_iter().find(|task| task.id == *id))
    }

    fn update(
        &self,
        id: &TaskId,
        mutator: &mut dyn FnMut(&mut Task) -> MutationOutcome,
    ) -> Result<Task, StoreError> {
        let _guard = Self::guard(&self.tasks_lock)?;
        let mut document: TasksDocument = read_document(&self.tasks_path)?;
        let task = document
            .tasks
            .iter_mut()
            .find(|task| task.id == *id)
            .ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
        let mut candidate = task.clone();
        mutator(&mut candidate).map_err(StoreError::Rejected)?;
        *task = candidate.clone();
        write_document(&self.tasks_path, &document)?;
        Ok(candidate)
    }

    fn list(&self, status: Option<TaskStatus>, limit: usize) -> Result<Vec<Task>, StoreError> {
        let _guard = Self::guard(&self.tasks_lock)?;
        let document: TasksDocument = read_document(&self.tasks_path)?;
        Ok(document
            .tasks
            .into_iter()
            .filter(|task| status.is_none_or(|status| task.status == status))
            .take(limit)
            .collect())
    }

    fn remove(&self, id: &TaskId) -> Result<bool, StoreError> {
        let _guard = Self::guard(&self.tasks_lock)?;
        let mut document: TasksDocument = read_document(&self.tasks_path)?;
        let before = document.tasks.len();
        document.tasks.retain(|task| task.id != *id);
        let removed = document.tasks.len() < before;
        if removed {
            write_document(&self.tasks_path, &document)?;
        }
        Ok(removed)
    }
}

// ============================================================================
// SECTION: Grant Store
// ============================================================================

impl GrantStore for FileStore {
    fn create(&self, grant: Grant) -> Result<(), StoreError> {
        let _guard = Self::guard(&self.grants_lock)?;
        let mut document: GrantsDocument = read_document(&self.grants_path)?;
        document.grants.insert(0, grant);
        write_document(&self.grants_path, &document)
    }

    fn get(&self, id: &GrantId) -> Result<Option<Grant>, StoreError> {
        let _guard = Self::guard(&self.grants_lock)?;
        let document: GrantsDocument = read_document(&self.grants_path)?;
        Ok(document.grants.into_iter().find(|grant| grant.id == *id))
    }

    fn list(&self, limit: usize) -> Result<Vec<Grant>, StoreError> {
        let _guard = Self::guard(&self.grants_lock)?;
        let document: GrantsDocument = read_document(&self.grants_path)?;
        Ok(document.grants.into_iter().take(limit).collect())
    }

    fn remove(&self, id: &GrantId) -> Result<bool, StoreError> {
        let _guard = Self::guard(&self.grants_lock)?;
        let mut document: GrantsDocument = read_document(&self.grants_path)?;
        let before = document.grants.len();
        document.grants.retain(|grant| grant.id != *id);
        let removed = document.grants.len() < before;
        if removed {
            write_document(&self.grants_path, &document)?;
        }
        Ok(removed)
    }
}

// ============================================================================
// SECTION: Rule Store
// ============================================================================

impl RuleStore for FileStore {
    fn upsert(&self, pattern: &str, action: PolicyAction) -> Result<DynamicRule, StoreError> {
        let _guard = Self::guard(&self.rules_lock)?;
        let mut document: RulesDocument = read_document(&self.rules_path)?;
        // The newest upsert wins; at most one rule per pattern survives.
        document.rules.retain(|rule| rule.pattern != pattern);
        let rule = DynamicRule {
            id: RuleId::generate(),
            pattern: pattern.to_string(),
            action,
            created_at: now_ms(),
        };
        document.rules.insert(0, rule.clone());
        write_document(&self.rules_path, &document)?;
        Ok(rule)
    }

    fn list(&self, limit: usize) -> Result<Vec<DynamicRule>, StoreError> {
        let _guard = Self::guard(&self.rules_lock)?;
        let document: RulesDocument = read_document(&self.rules_path)?;
        Ok(document.rules.into_iter().take(limit).collect())
    }

    fn remove(&self, id: &RuleId) -> Result<bool, StoreError> {
        let _guard = Self::guard(&self.rules_lock)?;
        let mut document: RulesDocument = read_document(&self.rules_path)?;
        let before = document.rules.len();
        document.rules.retain(|rule| rule.id != *id);
        let removed = document.rules.len() < before;
        if removed {
            write_document(&self.rules_path, &document)?;
        }
        Ok(removed)
    }
}

// ============================================================================
// SECTION: Admin Store
// ============================================================================

impl AdminStore for FileStore {
    fn admin(&self) -> Result<Option<ChatId>, StoreError> {
        let _guard = Self::guard(&self.admin_lock)?;
        let document: AdminDocument = read_document(&self.admin_path)?;
        Ok(document.admin.first().map(|record| record.chat_id.clone()))
    }

    fn set_admin(&self, chat: ChatId) -> Result<(), StoreError> {
        let _guard = Self::guard(&self.admin_lock)?;
        let document = AdminDocument {
            admin: vec![AdminRecord {
                chat_id: chat,
                paired_at: now_ms(),
            }],
        };
        write_document(&self.admin_path, &document)
    }
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

    use std::fs;

    use portero_core::ChatId;
    use portero_core::Grant;
    use portero_core::PolicyAction;
    use portero_core::Task;
    use portero_core::TaskStatus;
    use portero_core::ToolPattern;
    use portero_core::interfaces::AdminStore;
    use portero_core::interfaces::GrantStore;
    use portero_core::interfaces::RuleStore;
    use portero_core::interfaces::TaskStore;
    use serde_json::json;

    use super::FileStore;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileStore::open(dir.path()).expect("store");
        (dir, store)
    }

    fn sample_task(tool: &str) -> Task {
        Task::new(tool, json!({"a": 1}), json!({"a": 1}), PolicyAction::RequireApproval, 1_000)
    }

    #[test]
    fn missing_files_read_as_empty() {
        let (_dir, store) = store();
        assert!(TaskStore::list(&store, None, 10).expect("tasks").is_empty());
        assert!(GrantStore::list(&store, 10).expect("grants").is_empty());
        assert!(RuleStore::list(&store, 10).expect("rules").is_empty());
        assert_eq!(store.admin().expect("admin"), None);
    }

    #[test]
    fn tasks_round_trip_newest_first() {
        let (_dir, store) = store();
        let first = sample_task("a/one");
        let second = sample_task("a/two");
        TaskStore::create(&store, first.clone()).expect("create");
        TaskStore::create(&store, second.clone()).expect("create");
        let listed = TaskStore::list(&store, None, 10).expect("list");
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        let fetched = TaskStore::get(&store, &first.id).expect("get").expect("task");
        assert_eq!(fetched, first);
    }

    #[test]
    fn update_persists_mutation() {
        let (_dir, store) = store();
        let task = sample_task("a/one");
        TaskStore::create(&store, task.clone()).expect("create");
        let updated = store
            .update(&task.id, &mut |task| {
                task.status = TaskStatus::Denied;
                Ok(())
            })
            .expect("update");
        assert_eq!(updated.status, TaskStatus::Denied);
        let fetched = TaskStore::get(&store, &task.id).expect("get").expect("task");
        assert_eq!(fetched.status, TaskStatus::Denied);
    }

    #[test]
    fn rejected_mutation_leaves_record_unchanged() {
        let (_dir, store) = store();
        let task = sample_task("a/one");
        TaskStore::create(&store, task.clone()).expect("create");
        let result = store.update(&task.id, &mut |task| {
            task.status = TaskStatus::Completed;
            Err("refused".to_string())
        });
        assert!(result.is_err());
        let fetched = TaskStore::get(&store, &task.id).expect("get").expect("task");
        assert_eq!(fetched.status, TaskStatus::PendingApproval);
    }

    #[test]
    fn rule_upsert_keeps_one_rule_per_pattern() {
        let (_dir, store) = store();
        store.upsert("x/*", PolicyAction::Allow).expect("upsert");
        let replacement = store.upsert("x/*", PolicyAction::Deny).expect("upsert");
        let rules = RuleStore::list(&store, 10).expect("list");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, replacement.id);
        assert_eq!(rules[0].action, PolicyAction::Deny);
    }

    #[test]
    fn admin_pairing_round_trips() {
        let (_dir, store) = store();
        store.set_admin(ChatId::new("admin-1")).expect("set");
        assert_eq!(store.admin().expect("admin"), Some(ChatId::new("admin-1")));
    }

    #[test]
    fn leftover_temp_file_never_corrupts_committed_content() {
        let (dir, store) = store();
        let grant =
            Grant::new(ToolPattern::new("a/*").expect("pattern"), 1_000, 60_000).expect("grant");
        GrantStore::create(&store, grant.clone()).expect("create");
        // Simulate a crash between the temp write and the rename.
        fs::write(dir.path().join("grants.json.tmp"), b"{\"grants\": garbage").expect("tmp");
        let listed = GrantStore::list(&store, 10).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, grant.id);
    }

    #[test]
    fn legacy_approvals_document_is_ignored() {
        let (dir, store) = store();
        fs::write(dir.path().join("approvals.json"), b"{\"approvals\": []}").expect("legacy");
        assert!(TaskStore::list(&store, None, 10).expect("tasks").is_empty());
        TaskStore::create(&store, sample_task("a/one")).expect("create");
        let legacy = fs::read_to_string(dir.path().join("approvals.json")).expect("read");
        assert_eq!(legacy, "{\"approvals\": []}");
    }
}
