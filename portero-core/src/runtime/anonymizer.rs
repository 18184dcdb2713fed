// portero-core/src/runtime/anonymizer.rs
// ============================================================================
// Module: Portero Anonymizer
// Description: Bidirectional literal rewriting across nested structured data.
// Purpose: Swap caller-visible pseudonyms and real secrets around dispatch.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The anonymizer walks arbitrarily nested JSON values and rewrites string
//! content: inbound substitutes each rule's `fake` with `real` before
//! dispatch; outbound substitutes `real` with `fake` for bidirectional rules
//! and with the response replacement (or the fixed redaction token) for
//! one-way rules. Mapping keys and values are both rewritten; arrays
//! element-wise; non-string scalars pass through unchanged.
//!
//! Rules apply sequentially in configuration order and may compose: the
//! output of rule *k* is the input to rule *k+1*. Overlapping rules are the
//! configuration author's responsibility. Case-insensitive rules match all
//! ASCII case variants and emit the rule's literal replacement.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

use crate::core::replacement::ReplacementError;
use crate::core::replacement::ReplacementRule;
use crate::core::replacement::validate_rules;

// ============================================================================
// SECTION: Anonymizer
// ============================================================================

/// Process-scoped rewriting engine over the loaded replacement rules.
pub struct Anonymizer {
    /// Rules in configuration order.
    rules: Vec<ReplacementRule>,
}

impl Anonymizer {
    /// Builds an anonymizer after validating the rule set.
    ///
    /// # Errors
    ///
    /// Returns [`ReplacementError`] when a rule has an empty `fake` side.
    pub fn new(rules: Vec<ReplacementRule>) -> Result<Self, ReplacementError> {
        validate_rules(&rules)?;
        Ok(Self {
            rules,
        })
    }

    /// Returns the number of loaded rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Rewrites caller arguments inbound: `fake` becomes `real`.
    #[must_use]
    pub fn anonymize(&self, value: &Value) -> Value {
        rewrite_value(value, &|text| self.rewrite_inbound(text))
    }

    /// Rewrites backend replies outbound: `real` becomes `fake` or the
    /// rule's response replacement.
    #[must_use]
    pub fn deanonymize(&self, value: &Value) -> Value {
        rewrite_value(value, &|text| self.rewrite_outbound(text))
    }

    fn rewrite_inbound(&self, text: &str) -> String {
        let mut current = text.to_string();
        for rule in &self.rules {
            current = replace_literal(&current, &rule.fake, &rule.real, rule.case_sensitive);
        }
        current
    }

    fn rewrite_outbound(&self, text: &str) -> String {
        let mut current = text.to_string();
        for rule in &self.rules {
            current = replace_literal(
                &current,
                &rule.real,
                rule.outbound_replacement(),
                rule.case_sensitive,
            );
        }
        current
    }
}

// ============================================================================
// SECTION: Traversal
// ============================================================================

/// Recursively rewrites string content through `rewrite`.
fn rewrite_value(value: &Value, rewrite: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::String(text) => Value::String(rewrite(text)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| rewrite_value(item, rewrite)).collect())
        }
        Value::Object(entries) => {
            let mut rewritten = Map::with_capacity(entries.len());
            for (key, entry) in entries {
                rewritten.insert(rewrite(key), rewrite_value(entry, rewrite));
            }
            Value::Object(rewritten)
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
    }
}

// ============================================================================
// SECTION: Literal Replacement
// ============================================================================

/// Replaces every occurrence of `needle` in `haystack` with `replacement`.
///
/// Case-insensitive matching compares ASCII case variants only; the emitted
/// text is always the rule's literal replacement.
fn replace_literal(
    haystack: &str,
    needle: &str,
    replacement: &str,
    case_sensitive: bool,
) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    if case_sensitive {
        return haystack.replace(needle, replacement);
    }
    let needle_bytes = needle.as_bytes();
    let bytes = haystack.as_bytes();
    let mut output = String::with_capacity(haystack.len());
    let mut index = 0;
    while index < bytes.len() {
        let end = index + needle_bytes.len();
        let matched = end <= bytes.len()
            && haystack.is_char_boundary(index)
            && haystack.is_char_boundary(end)
            && bytes[index..end].eq_ignore_ascii_case(needle_bytes);
        if matched {
            output.push_str(replacement);
            index = end;
        } else {
            // Advance one full character to keep the output valid UTF-8.
            let mut next = index + 1;
            while next < bytes.len() && !haystack.is_char_boundary(next) {
                next += 1;
            }
            output.push_str(&haystack[index..next]);
            index = next;
        }
    }
    output
}

// ============================================================================
// SECTION: Tests
// ============================================================================
