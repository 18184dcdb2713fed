// portero-config/src/env.rs
// ============================================================================
// Module: Portero Placeholder Substitution
// Description: `${VAR}` environment substitution inside config documents.
// Purpose: Resolve per-backend secrets without storing them in documents.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Configuration values may reference environment variables as `${VAR}`.
//! Variable names are `[A-Za-z_][A-Za-z0-9_]*`; anything else, including an
//! unterminated `${`, passes through literally. Substitution reports the
//! first unresolved variable so the loader can skip the owning entry.

// ============================================================================
// SECTION: Substitution
// ============================================================================

/// Substitutes every `${VAR}` placeholder in `input` via `lookup`.
///
/// # Errors
///
/// Returns the name of the first unresolved variable.
pub fn substitute(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<String, String> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match placeholder_name(after) {
            Some(name) => {
                let value = lookup(name).ok_or_else(|| name.to_string())?;
                output.push_str(&value);
                rest = &after[name.len() + 1..];
            }
            None => {
                output.push_str("${");
                rest = after;
            }
        }
    }
    output.push_str(rest);
    Ok(output)
}

/// Returns the variable name when `input` starts with `NAME}`.
fn placeholder_name(input: &str) -> Option<&str> {
    let end = input.find('}')?;
    let name = &input[..end];
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        Some(name)
    } else {
        None
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
