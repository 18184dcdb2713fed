// portero-mcp/src/aggregate.rs
// ============================================================================
// Module: Portero Tool Aggregator
// Description: Namespaced, TTL-cached union of backend tool catalogs.
// Purpose: Publish a filtered surface small enough for small-context clients.
// Dependencies: portero-core, tokio
// ============================================================================

//! ## Overview
//! The aggregator namespaces each backend tool as `backend/local` and caches
//! the union with a TTL. Two list modes exist: the unfiltered union feeds the
//! search virtual tool; the filtered view is what `tools/list` publishes.
//! When no backend pins, filtered equals unfiltered; otherwise a tool is
//! visible iff its backend does not pin, its local name is pinned, or its
//! full name is in the recency set. A backend that fails to answer is skipped
//! with a warning; its tools drop out when the cache refreshes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use portero_core::BackendName;
use serde_json::Value;

use crate::backend::ResourceDescriptor;
use crate::registry::BackendRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default catalog cache TTL.
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Types
// ============================================================================

/// One namespaced tool in the aggregated catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedTool {
    /// Fully namespaced name (`backend/local`).
    pub name: String,
    /// Owning backend.
    pub backend: BackendName,
    /// Local name used by the backend.
    pub local: String,
    /// Human-readable description.
    pub description: String,
    /// Input schema; opaque to the gateway.
    pub input_schema: Value,
}

/// Cached catalog snapshot.
struct CacheEntry {
    /// Namespaced union of backend catalogs.
    tools: Vec<AggregatedTool>,
    /// Snapshot time for TTL checks.
    fetched_at: Instant,
}

// ============================================================================
// SECTION: Aggregator
// ============================================================================

/// Namespaced catalog aggregator with a TTL-bounded cache.
pub struct ToolAggregator {
    /// Backend registry.
    registry: Arc<BackendRegistry>,
    /// Cache TTL.
    ttl: Duration,
    /// Cached snapshot; eventually consistent within the TTL.
    cache: Mutex<Option<CacheEntry>>,
}

impl ToolAggregator {
    /// Builds an aggregator with the default TTL.
    #[must_use]
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self::with_ttl(registry, DEFAULT_CATALOG_TTL)
    }

    /// Builds an aggregator with an explicit TTL.
    #[must_use]
    pub fn with_ttl(registry: Arc<BackendRegistry>, ttl: Duration) -> Self {
        Self {
            registry,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Returns the full namespaced union, refreshing the cache when stale.
    pub async fn unfiltered(&self) -> Vec<AggregatedTool> {
        if let Some(tools) = self.cached() {
            return tools;
        }
        let tools = self.fetch_all().await;
        if let Ok(mut cache) = self.cache.lock() {
            *cache = Some(CacheEntry {
                tools: tools.clone(),
                fetched_at: Instant::now(),
            });
        }
        tools
    }

    /// Returns the filtered view published to the client.
    pub async fn filtered(&self) -> Vec<AggregatedTool> {
        let tools = self.unfiltered().await;
        if !self.registry.any_pinned() {
            return tools;
        }
        tools
            .into_iter()
            .filter(|tool| match self.registry.pinned(&tool.backend) {
                None => true,
                Some(pinned) => {
                    pinned.contains(&tool.local) || self.registry.recently_used(&tool.name)
                }
            })
            .collect()
    }

    /// Lists resources across backends as `backend://uri` entries.
    pub async fn list_resources(&self) -> Vec<ResourceDescriptor> {
        let mut resources = Vec::new();
        for name in self.registry.names() {
            let Some(connection) = self.registry.connection(&name) else {
                continue;
            };
            match connection.list_resources().await {
                Ok(entries) => {
                    for entry in entries {
                        resources.push(ResourceDescriptor {
                            uri: format!("{name}://{}", entry.uri),
                            name: entry.name,
                        });
                    }
                }
                Err(err) => warn_backend(&name, &err.to_string()),
            }
        }
        resources
    }

    /// Returns the cached catalog size without refreshing; zero when cold.
    #[must_use]
    pub fn cached_size(&self) -> usize {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.as_ref().map(|entry| entry.tools.len()))
            .unwrap_or(0)
    }

    /// Returns the cached snapshot while it is within the TTL.
    fn cached(&self) -> Option<Vec<AggregatedTool>> {
        let cache = self.cache.lock().ok()?;
        let entry = cache.as_ref()?;
        if entry.fetched_at.elapsed() < self.ttl {
            return Some(entry.tools.clone());
        }
        None
    }

    /// Queries every backend catalog, skipping ones that fail.
    async fn fetch_all(&self) -> Vec<AggregatedTool> {
        let mut tools = Vec::new();
        for name in self.registry.names() {
            let Some(connection) = self.registry.connection(&name) else {
                continue;
            };
            match connection.list_tools().await {
                Ok(descriptors) => {
                    for descriptor in descriptors {
                        tools.push(AggregatedTool {
                            name: format!("{name}/{}", descriptor.name),
                            backend: name.clone(),
                            local: descriptor.name,
                            description: descriptor.description,
                            input_schema: descriptor.input_schema,
                        });
                    }
                }
                Err(err) => warn_backend(&name, &err.to_string()),
            }
        }
        tools
    }
}

/// Warns on stderr that a backend failed a catalog query.
fn warn_backend(name: &BackendName, message: &str) {
    let _ = writeln!(std::io::stderr(), "portero: WARNING: backend {name} unavailable: {message}");
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
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use async_trait::async_trait;
    use portero_core::BackendName;
    use serde_json::Value;
    use serde_json::json;

    use super::ToolAggregator;
    use crate::backend::BackendConnection;
    use crate::backend::BackendError;
    use crate::backend::ResourceDescriptor;
    use crate::backend::ToolDescriptor;
    use crate::registry::BackendRegistry;

    struct StaticBackend {
        tools: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl StaticBackend {
        fn new(tools: Vec<&'static str>) -> Self {
            Self {
                tools,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BackendConnection for StaticBackend {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BackendError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self
                .tools
                .iter()
                .map(|name| ToolDescriptor {
                    name: (*name).to_string(),
                    description: format!("{name} tool"),
                    input_schema: json!({ "type": "object" }),
                })
                .collect())
        }

        async fn call_tool(&self, _name: &str, _arguments: Value) -> Result<Value, BackendError> {
            Err(BackendError::Transport("static backend".to_string()))
        }

        async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, BackendError> {
            Ok(vec![ResourceDescriptor {
                uri: "docs/readme".to_string(),
                name: "readme".to_string(),
            }])
        }

        async fn read_resource(&self, _uri: &str) -> Result<Value, BackendError> {
            Err(BackendError::Transport("static backend".to_string()))
        }
    }

    fn registry_with(
        entries: Vec<(&str, Arc<StaticBackend>, Option<Vec<String>>)>,
    ) -> Arc<BackendRegistry> {
        let mut registry = BackendRegistry::new();
        for (name, backend, pinned) in entries {
            registry.insert(BackendName::new(name), backend, pinned);
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn unfiltered_namespaces_all_tools() {
        let registry = registry_with(vec![
            ("fs", Arc::new(StaticBackend::new(vec!["read", "write"])), None),
            ("mail", Arc::new(StaticBackend::new(vec!["send"])), None),
        ]);
        let aggregator = ToolAggregator::new(registry);
        let tools = aggregator.unfiltered().await;
        let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(names, vec!["fs/read", "fs/write", "mail/send"]);
    }

    #[tokio::test]
    async fn filtered_equals_unfiltered_without_pins() {
        let registry =
            registry_with(vec![("fs", Arc::new(StaticBackend::new(vec!["read", "write"])), None)]);
        let aggregator = ToolAggregator::new(registry);
        assert_eq!(aggregator.filtered().await.len(), 2);
    }

    #[tokio::test]
    async fn filtered_applies_pins_and_recency() {
        let registry = registry_with(vec![
            (
                "fs",
                Arc::new(StaticBackend::new(vec!["read", "write", "delete"])),
                Some(vec!["read".to_string()]),
            ),
            ("mail", Arc::new(StaticBackend::new(vec!["send"])), None),
        ]);
        let aggregator = ToolAggregator::new(registry.clone());

        let visible = aggregator.filtered().await;
        let names: Vec<&str> = visible.iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(names, vec!["fs/read", "mail/send"]);

        registry.mark_used("fs/delete");
        let visible = aggregator.filtered().await;
        let names: Vec<&str> = visible.iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(names, vec!["fs/read", "fs/delete", "mail/send"]);
    }

    #[tokio::test]
    async fn cache_serves_within_ttl() {
        let backend = Arc::new(StaticBackend::new(vec!["read"]));
        let registry = registry_with(vec![("fs", backend.clone(), None)]);
        let aggregator = ToolAggregator::with_ttl(registry, Duration::from_secs(60));
        aggregator.unfiltered().await;
        aggregator.unfiltered().await;
        assert_eq!(backend.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn expired_cache_refreshes() {
        let backend = Arc::new(StaticBackend::new(vec!["read"]));
        let registry = registry_with(vec![("fs", backend.clone(), None)]);
        let aggregator = ToolAggregator::with_ttl(registry, Duration::from_millis(0));
        aggregator.unfiltered().await;
        aggregator.unfiltered().await;
        assert_eq!(backend.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn resources_are_namespaced() {
        let registry = registry_with(vec![("fs", Arc::new(StaticBackend::new(vec![])), None)]);
        let aggregator = ToolAggregator::new(registry);
        let resources = aggregator.list_resources().await;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "fs://docs/readme");
    }
}
