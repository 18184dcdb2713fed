// portero-mcp/src/registry.rs
// ============================================================================
// Module: Portero Backend Registry
// Description: Connected backends, pinned tool sets, and the recency set.
// Purpose: Track dispatch handles and which tools callers actually use.
// Dependencies: portero-core
// ============================================================================

//! ## Overview
//! The registry holds, per backend, the dispatch handle and the optional
//! pinned tool set from configuration, plus one process-wide recency set of
//! fully namespaced tool names. The recency set is the mechanism by which
//! callers promote tools into the filtered catalog by using them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use portero_core::BackendName;

use crate::backend::BackendConnection;

// ============================================================================
// SECTION: Entries
// ============================================================================

/// One connected backend.
struct BackendEntry {
    /// Dispatch handle.
    connection: Arc<dyn BackendConnection>,
    /// Pinned local tool names; absent when the backend does not pin.
    pinned: Option<BTreeSet<String>>,
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registry of connected backends and the shared recency set.
#[derive(Default)]
pub struct BackendRegistry {
    /// Backends keyed by namespace prefix.
    backends: BTreeMap<BackendName, BackendEntry>,
    /// Recently used fully namespaced tool names.
    recency: Mutex<HashSet<String>>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend with its optional pinned tool set.
    pub fn insert(
        &mut self,
        name: BackendName,
        connection: Arc<dyn BackendConnection>,
        pinned: Option<Vec<String>>,
    ) {
        let pinned = pinned.map(|tools| tools.into_iter().collect());
        self.backends.insert(
            name,
            BackendEntry {
                connection,
                pinned,
            },
        );
    }

    /// Returns the dispatch handle for a backend.
    #[must_use]
    pub fn connection(&self, name: &BackendName) -> Option<Arc<dyn BackendConnection>> {
        self.backends.get(name).map(|entry| Arc::clone(&entry.connection))
    }

    /// Returns the pinned set for a backend, when configured.
    #[must_use]
    pub fn pinned(&self, name: &BackendName) -> Option<&BTreeSet<String>> {
        self.backends.get(name).and_then(|entry| entry.pinned.as_ref())
    }

    /// Returns true when any backend declares a pinned set.
    #[must_use]
    pub fn any_pinned(&self) -> bool {
        self.backends.values().any(|entry| entry.pinned.is_some())
    }

    /// Returns the registered backend names in stable order.
    #[must_use]
    pub fn names(&self) -> Vec<BackendName> {
        self.backends.keys().cloned().collect()
    }

    /// Returns the number of registered backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Returns true when no backend is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Inserts a fully namespaced name into the recency set.
    pub fn mark_used(&self, full_name: &str) {
        if let Ok(mut recency) = self.recency.lock() {
            recency.insert(full_name.to_string());
        }
    }

    /// Returns true when the fully namespaced name was used before.
    #[must_use]
    pub fn recently_used(&self, full_name: &str) -> bool {
        self.recency.lock().map(|recency| recency.contains(full_name)).unwrap_or(false)
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

    use async_trait::async_trait;
    use portero_core::BackendName;
    use serde_json::Value;

    use super::BackendRegistry;
    use crate::backend::BackendConnection;
    use crate::backend::BackendError;
    use crate::backend::ResourceDescriptor;
    use crate::backend::ToolDescriptor;

    struct NullConnection;

    #[async_trait]
    impl BackendConnection for NullConnection {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BackendError> {
            Ok(Vec::new())
        }

        async fn call_tool(&self, _name: &str, _arguments: Value) -> Result<Value, BackendError> {
            Err(BackendError::Transport("null connection".to_string()))
        }

        async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, BackendError> {
            Ok(Vec::new())
        }

        async fn read_resource(&self, _uri: &str) -> Result<Value, BackendError> {
            Err(BackendError::Transport("null connection".to_string()))
        }
    }

    #[test]
    fn recency_set_tracks_usage() {
        let mut registry = BackendRegistry::new();
        registry.insert(BackendName::new("fs"), Arc::new(NullConnection), None);
        assert!(!registry.recently_used("fs/read_file"));
        registry.mark_used("fs/read_file");
        assert!(registry.recently_used("fs/read_file"));
    }

    #[test]
    fn pinned_sets_are_per_backend() {
        let mut registry = BackendRegistry::new();
        registry.insert(
            BackendName::new("fs"),
            Arc::new(NullConnection),
            Some(vec!["read_file".to_string()]),
        );
        registry.insert(BackendName::new("mail"), Arc::new(NullConnection), None);
        assert!(registry.any_pinned());
        assert!(registry.pinned(&BackendName::new("fs")).expect("pinned").contains("read_file"));
        assert!(registry.pinned(&BackendName::new("mail")).is_none());
        assert_eq!(registry.len(), 2);
    }
}
