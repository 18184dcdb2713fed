// portero-core/src/runtime/resolver.rs
// ============================================================================
// Module: Portero Policy Resolver
// Description: Layered allow/deny/require-approval resolution with provenance.
// Purpose: Provide the single authorization decision point for tool calls.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Resolution consults, in order: dynamic rules (exact pattern text first,
//! then first pattern match in store order), the static exact map, the static
//! pattern list in configuration order, and the configured default. The first
//! hit wins. The resolver is deterministic for a given store snapshot and is
//! the only component authorized to consult these records for authorization.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::pattern::ToolPattern;
use crate::core::policy::PolicyDecision;
use crate::core::policy::PolicySource;
use crate::core::policy::StaticPolicy;
use crate::interfaces::RuleStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on dynamic rules consulted per resolution.
const MAX_DYNAMIC_RULES: usize = 1024;

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Layered policy resolver over static configuration and dynamic rules.
pub struct PolicyResolver {
    /// Static policy document from configuration.
    static_policy: StaticPolicy,
    /// Persisted, admin-editable rules.
    rules: Arc<dyn RuleStore>,
}

impl PolicyResolver {
    /// Builds a resolver over the static document and the rule store.
    #[must_use]
    pub fn new(static_policy: StaticPolicy, rules: Arc<dyn RuleStore>) -> Self {
        Self {
            static_policy,
            rules,
        }
    }

    /// Resolves the policy decision for a fully namespaced tool name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the dynamic rule store cannot be read.
    pub fn resolve(&self, tool: &str) -> Result<PolicyDecision, StoreError> {
        let dynamic = self.rules.list(MAX_DYNAMIC_RULES)?;
        for rule in &dynamic {
            if rule.pattern == tool {
                return Ok(PolicyDecision {
                    action: rule.action,
                    source: PolicySource::DynamicRule,
                    pattern: Some(rule.pattern.clone()),
                    rule_id: Some(rule.id.clone()),
                });
            }
        }
        for rule in &dynamic {
            if pattern_matches(&rule.pattern, tool) {
                return Ok(PolicyDecision {
                    action: rule.action,
                    source: PolicySource::DynamicRule,
                    pattern: Some(rule.pattern.clone()),
                    rule_id: Some(rule.id.clone()),
                });
            }
        }
        if let Some(action) = self.static_policy.exact.get(tool) {
            return Ok(PolicyDecision {
                action: *action,
                source: PolicySource::StaticExact,
                pattern: None,
                rule_id: None,
            });
        }
        for entry in &self.static_policy.patterns {
            if pattern_matches(&entry.pattern, tool) {
                return Ok(PolicyDecision {
                    action: entry.action,
                    source: PolicySource::StaticPattern,
                    pattern: Some(entry.pattern.clone()),
                    rule_id: None,
                });
            }
        }
        Ok(PolicyDecision {
            action: self.static_policy.default_action,
            source: PolicySource::Default,
            pattern: None,
            rule_id: None,
        })
    }
}

/// Matches stored pattern text against a tool name; invalid text never
/// matches.
fn pattern_matches(pattern: &str, tool: &str) -> bool {
    ToolPattern::new(pattern).is_ok_and(|pattern| pattern.matches(tool))
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

    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::PolicyResolver;
    use crate::core::identifiers::RuleId;
    use crate::core::policy::DynamicRule;
    use crate::core::policy::PolicyAction;
    use crate::core::policy::PolicySource;
    use crate::core::policy::StaticPatternRule;
    use crate::core::policy::StaticPolicy;
    use crate::interfaces::RuleStore;
    use crate::interfaces::StoreError;

    #[derive(Default)]
    struct MemoryRules {
        rules: Mutex<Vec<DynamicRule>>,
    }

    impl MemoryRules {
        fn with(rules: Vec<DynamicRule>) -> Arc<Self> {
            Arc::new(Self {
                rules: Mutex::new(rules),
            })
        }
    }

    impl RuleStore for MemoryRules {
        fn upsert(&self, pattern: &str, action: PolicyAction) -> Result<DynamicRule, StoreError> {
            let rule = DynamicRule {
                id: RuleId::generate(),
                pattern: pattern.to_string(),
                action,
                created_at: 0,
            };
            let mut rules = self.rules.lock().expect("rules lock");
            rules.retain(|existing| existing.pattern != pattern);
            rules.insert(0, rule.clone());
            Ok(rule)
        }

        fn list(&self, limit: usize) -> Result<Vec<DynamicRule>, StoreError> {
            let rules = self.rules.lock().expect("rules lock");
            Ok(rules.iter().take(limit).cloned().collect())
        }

        fn remove(&self, id: &RuleId) -> Result<bool, StoreError> {
            let mut rules = self.rules.lock().expect("rules lock");
            let before = rules.len();
            rules.retain(|existing| existing.id != *id);
            Ok(rules.len() < before)
        }
    }

    fn static_policy() -> StaticPolicy {
        let mut exact = BTreeMap::new();
        exact.insert("x/y".to_string(), PolicyAction::Deny);
        StaticPolicy {
            exact,
            patterns: vec![StaticPatternRule {
                pattern: "x/*".to_string(),
                action: PolicyAction::RequireApproval,
            }],
            default_action: PolicyAction::Allow,
        }
    }

    #[test]
    fn dynamic_rule_overrides_static_exact() {
        let rules = Arc::new(MemoryRules::default());
        let rule = rules.upsert("x/*", PolicyAction::Allow).expect("upsert");
        let resolver = PolicyResolver::new(static_policy(), rules.clone());

        let decision = resolver.resolve("x/y").expect("resolve");
        assert_eq!(decision.action, PolicyAction::Allow);
        assert_eq!(decision.source, PolicySource::DynamicRule);
        assert_eq!(decision.pattern.as_deref(), Some("x/*"));
        assert_eq!(decision.rule_id, Some(rule.id.clone()));

        assert!(rules.remove(&rule.id).expect("remove"));
        let decision = resolver.resolve("x/y").expect("resolve");
        assert_eq!(decision.action, PolicyAction::Deny);
        assert_eq!(decision.source, PolicySource::StaticExact);
    }

    #[test]
    fn dynamic_exact_wins_over_dynamic_pattern() {
        let rules = MemoryRules::with(Vec::new());
        rules.upsert("x/**", PolicyAction::Deny).expect("upsert");
        rules.upsert("x/y", PolicyAction::Allow).expect("upsert");
        let resolver = PolicyResolver::new(static_policy(), rules);

        let decision = resolver.resolve("x/y").expect("resolve");
        assert_eq!(decision.action, PolicyAction::Allow);
        assert_eq!(decision.pattern.as_deref(), Some("x/y"));
    }

    #[test]
    fn static_patterns_apply_in_insertion_order() {
        let rules = Arc::new(MemoryRules::default());
        let policy = StaticPolicy {
            exact: BTreeMap::new(),
            patterns: vec![
                StaticPatternRule {
                    pattern: "a/**".to_string(),
                    action: PolicyAction::Deny,
                },
                StaticPatternRule {
                    pattern: "a/*".to_string(),
                    action: PolicyAction::Allow,
                },
            ],
            default_action: PolicyAction::Allow,
        };
        let resolver = PolicyResolver::new(policy, rules);
        let decision = resolver.resolve("a/b").expect("resolve");
        assert_eq!(decision.action, PolicyAction::Deny);
        assert_eq!(decision.source, PolicySource::StaticPattern);
        assert_eq!(decision.pattern.as_deref(), Some("a/**"));
    }

    #[test]
    fn default_action_applies_when_nothing_matches() {
        let resolver = PolicyResolver::new(static_policy(), Arc::new(MemoryRules::default()));
        let decision = resolver.resolve("other/tool").expect("resolve");
        assert_eq!(decision.action, PolicyAction::Allow);
        assert_eq!(decision.source, PolicySource::Default);
        assert_eq!(decision.pattern, None);
        assert_eq!(decision.rule_id, None);
    }

    #[test]
    fn resolution_is_deterministic() {
        let rules = Arc::new(MemoryRules::default());
        rules.upsert("x/*", PolicyAction::Allow).expect("upsert");
        let resolver = PolicyResolver::new(static_policy(), rules);
        let first = resolver.resolve("x/z").expect("resolve");
        let second = resolver.resolve("x/z").expect("resolve");
        assert_eq!(first, second);
    }
}
