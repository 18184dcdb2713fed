// portero-core/src/core/pattern.rs
// ============================================================================
// Module: Portero Tool Patterns
// Description: Pattern language shared by policy entries and grants.
// Purpose: Provide the anchored `*`/`**` matcher for authorization decisions.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The pattern language is deliberately small: `*` matches any run of
//! characters not containing the namespace separator, `**` matches any
//! characters including the separator, and every other character is literal.
//! A bare `*` matches every tool. Patterns anchor full-string. Production
//! deployments depend on these exact semantics for authorization decisions;
//! the language must not grow character classes or anchors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted pattern length in characters.
pub(crate) const MAX_PATTERN_LENGTH: usize = 512;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while constructing tool patterns.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    /// Pattern text is empty.
    #[error("pattern must not be empty")]
    Empty,
    /// Pattern text exceeds the accepted length.
    #[error("pattern exceeds {MAX_PATTERN_LENGTH} characters")]
    TooLong,
}

// ============================================================================
// SECTION: Tool Pattern
// ============================================================================

/// Anchored tool-name pattern used by policies and grants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolPattern(String);

impl ToolPattern {
    /// Creates a pattern after validating its shape.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the pattern is empty or too long.
    pub fn new(pattern: impl Into<String>) -> Result<Self, PatternError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if pattern.chars().count() > MAX_PATTERN_LENGTH {
            return Err(PatternError::TooLong);
        }
        Ok(Self(pattern))
    }

    /// Returns the pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the pattern matches the full tool name.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        if self.0 == "*" {
            return true;
        }
        let pattern: Vec<char> = self.0.chars().collect();
        let name: Vec<char> = name.chars().collect();
        matches_from(&pattern, &name)
    }
}

impl fmt::Display for ToolPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Recursive anchored matcher over pattern and name characters.
fn matches_from(pattern: &[char], name: &[char]) -> bool {
    let Some(first) = pattern.first() else {
        return name.is_empty();
    };
    if *first == '*' {
        if pattern.get(1) == Some(&'*') {
            let rest = &pattern[2..];
            return (0..=name.len()).any(|skip| matches_from(rest, &name[skip..]));
        }
        let rest = &pattern[1..];
        for skip in 0..=name.len() {
            if matches_from(rest, &name[skip..]) {
                return true;
            }
            if name.get(skip) == Some(&'/') {
                break;
            }
        }
        return false;
    }
    name.first() == Some(first) && matches_from(&pattern[1..], &name[1..])
}

// ============================================================================
// SECTION: Tests
// ============================================================================
