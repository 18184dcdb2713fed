// portero-mcp/src/cleanup.rs
// ============================================================================
// Module: Portero Cleanup Loop
// Description: Periodic expiry of grants and stale pending approvals.
// Purpose: Keep the durable collections bounded without admin intervention.
// Dependencies: portero-core, tokio
// ============================================================================

//! ## Overview
//! Every interval the loop removes grants whose expiry has passed and, when
//! an approval TTL is configured, pending-approval tasks older than that TTL.
//! Without the TTL, tasks persist until admin action. Sweep failures are
//! logged and swallowed; the loop always continues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use portero_core::StoreError;
use portero_core::TaskStatus;
use portero_core::interfaces::GrantStore;
use portero_core::interfaces::TaskStore;
use portero_core::now_ms;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default sweep interval.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
/// Upper bound on records examined per sweep.
const SWEEP_SCAN_LIMIT: usize = 1024;

// ============================================================================
// SECTION: Cleanup Loop
// ============================================================================

/// Periodic sweeper over grants and stale pending approvals.
pub struct CleanupLoop {
    /// Grant collection.
    grants: Arc<dyn GrantStore>,
    /// Task collection; used for stale-approval removal only.
    tasks: Arc<dyn TaskStore>,
    /// Optional pending-approval TTL in milliseconds.
    approval_ttl_ms: Option<i64>,
    /// Sweep interval.
    interval: Duration,
}

impl CleanupLoop {
    /// Builds a cleanup loop with the default interval.
    #[must_use]
    pub fn new(
        grants: Arc<dyn GrantStore>,
        tasks: Arc<dyn TaskStore>,
        approval_ttl_ms: Option<i64>,
    ) -> Self {
        Self::with_interval(grants, tasks, approval_ttl_ms, DEFAULT_CLEANUP_INTERVAL)
    }

    /// Builds a cleanup loop with an explicit interval.
    #[must_use]
    pub fn with_interval(
        grants: Arc<dyn GrantStore>,
        tasks: Arc<dyn TaskStore>,
        approval_ttl_ms: Option<i64>,
        interval: Duration,
    ) -> Self {
        Self {
            grants,
            tasks,
            approval_ttl_ms,
            interval,
        }
    }

    /// Runs until the process exits.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = self.sweep(now_ms()) {
                let _ = writeln!(std::io::stderr(), "portero: WARNING: cleanup sweep failed: {err}");
            }
        }
    }

    /// Removes expired grants and, when configured, stale pending tasks.
    fn sweep(&self, now: i64) -> Result<(), StoreError> {
        for grant in self.grants.list(SWEEP_SCAN_LIMIT)? {
            if !grant.is_active(now) {
                self.grants.remove(&grant.id)?;
            }
        }
        if let Some(ttl) = self.approval_ttl_ms {
            let pending = self.tasks.list(Some(TaskStatus::PendingApproval), SWEEP_SCAN_LIMIT)?;
            for task in pending {
                if now.saturating_sub(task.created_at) > ttl {
                    self.tasks.remove(&task.id)?;
                }
            }
        }
        Ok(())
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

    use std::sync::Arc;

    use portero_core::Grant;
    use portero_core::PolicyAction;
    use portero_core::Task;
    use portero_core::ToolPattern;
    use portero_core::interfaces::GrantStore;
    use portero_core::interfaces::TaskStore;
    use portero_store::FileStore;
    use serde_json::json;

    use super::CleanupLoop;

    fn store() -> (tempfile::TempDir, Arc<FileStore>) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = Arc::new(FileStore::open(dir.path()).expect("store"));
        (dir, store)
    }

    #[test]
    fn sweep_removes_only_expired_grants() {
        let (_dir, store) = store();
        let live = Grant::new(ToolPattern::new("a/*").expect("pattern"), 1_000, 60_000)
            .expect("grant");
        let dead =
            Grant::new(ToolPattern::new("b/*").expect("pattern"), 1_000, 1_000).expect("grant");
        GrantStore::create(store.as_ref(), live.clone()).expect("create");
        GrantStore::create(store.as_ref(), dead).expect("create");

        let cleanup = CleanupLoop::new(store.clone(), store.clone(), None);
        cleanup.sweep(10_000).expect("sweep");

        let remaining = GrantStore::list(store.as_ref(), 10).expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, live.id);
    }

    #[test]
    fn sweep_leaves_pending_tasks_without_ttl() {
        let (_dir, store) = store();
        let task =
            Task::new("a/slow", json!({}), json!({}), PolicyAction::RequireApproval, 1_000);
        TaskStore::create(store.as_ref(), task).expect("create");

        let cleanup = CleanupLoop::new(store.clone(), store.clone(), None);
        cleanup.sweep(i64::MAX).expect("sweep");
        assert_eq!(TaskStore::list(store.as_ref(), None, 10).expect("list").len(), 1);
    }

    #[test]
    fn sweep_removes_stale_pending_tasks_with_ttl() {
        let (_dir, store) = store();
        let stale =
            Task::new("a/slow", json!({}), json!({}), PolicyAction::RequireApproval, 1_000);
        let fresh =
            Task::new("a/fast", json!({}), json!({}), PolicyAction::RequireApproval, 90_000);
        TaskStore::create(store.as_ref(), stale).expect("create");
        TaskStore::create(store.as_ref(), fresh.clone()).expect("create");

        let cleanup = CleanupLoop::new(store.clone(), store.clone(), Some(10_000));
        cleanup.sweep(100_000).expect("sweep");

        let remaining = TaskStore::list(store.as_ref(), None, 10).expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, fresh.id);
    }
}
