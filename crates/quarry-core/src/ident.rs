//! Identifier validation.
//!
//! Table, schema and column names are interpolated into statement text, so
//! they must be plain `[A-Za-z0-9_$]` words that are not purely numeric.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{FilterError, Result};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_$]+$").expect("Invalid identifier regex"));

static NUMERIC_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9$]*$").expect("Invalid numeric regex"));

/// Returns whether `name` may be interpolated as an identifier.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name) && !NUMERIC_ONLY.is_match(name)
}

/// Validates `name`, returning `FilterError::InvalidIdentifier` on failure.
pub fn validate_identifier(name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(FilterError::InvalidIdentifier(name.to_owned()))
    }
}

/// Wraps an already validated identifier in backticks.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("`{name}`")
}
