//! Attribute value rules that GitLab enforces server-side.
//!
//! Checking them locally turns a late HTTP 400 into a validation error that
//! names the attribute, before any request is sent.

use chrono::NaiveDate;
use reconcile::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// CI/CD variable keys: letters, digits and underscores.
static VARIABLE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_]+$").expect("VARIABLE_NAME_REGEX is a valid regex pattern")
});

/// Scheme followed by a non-empty host.
static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^/\s?#]+").expect("URL_REGEX is a valid regex pattern")
});

/// Maximum length of a variable key.
pub const MAX_VARIABLE_NAME_LENGTH: usize = 255;

/// Check a CI/CD variable key.
pub fn variable_name(attribute: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.len() > MAX_VARIABLE_NAME_LENGTH {
        return Err(Error::validation(
            attribute,
            format!(
                "expected length in the range 1 - {MAX_VARIABLE_NAME_LENGTH}, got {}",
                value.len()
            ),
        ));
    }
    if !VARIABLE_NAME_REGEX.is_match(value) {
        return Err(Error::validation(
            attribute,
            format!("{value:?} is invalid; only A-Z, a-z, 0-9, and _ are allowed"),
        ));
    }
    Ok(())
}

/// Check a `YYYY-MM-DD` date.
pub fn date(attribute: &str, value: &str) -> Result<()> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| Error::validation(attribute, format!("{value:?} is not valid for format YYYY-MM-DD")))
}

/// Check that a value looks like an absolute URL.
pub fn url(attribute: &str, value: &str) -> Result<()> {
    if URL_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(Error::validation(attribute, format!("{value:?} is not a valid URL")))
    }
}

/// Check every item of a list against an allowed set.
pub fn all_in<'a>(attribute: &str, values: impl IntoIterator<Item = &'a str>, allowed: &[&str]) -> Result<()> {
    for value in values {
        if !allowed.contains(&value) {
            return Err(Error::validation(
                attribute,
                format!("{value:?} is not one of: {}", allowed.join(", ")),
            ));
        }
    }
    Ok(())
}
