//! Input checks shared by the services.
//!
//! Account fields come back normalised. Ticket and comment text is checked on
//! its trimmed form but returned exactly as submitted.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 100;
const MAX_PASSWORD_LEN: usize = 256;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;
const MAX_PRIORITY_LEN: usize = 32;
const MAX_COMMENT_LEN: usize = 5_000;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex"))
}

/// Trims and lower-cases an email address after checking its shape.
pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim().to_ascii_lowercase();
    if email.is_empty() {
        return Err(ValidationError::new("Email is required"));
    }
    if email.len() > MAX_EMAIL_LEN || !email_regex().is_match(&email) {
        return Err(ValidationError::new("Email address is not valid"));
    }
    Ok(email)
}

pub fn validate_password(password: &str, min_len: usize) -> Result<(), ValidationError> {
    if password.chars().count() < min_len {
        return Err(ValidationError::new(format!(
            "Password must be at least {min_len} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ValidationError::new(format!(
            "Password must be {MAX_PASSWORD_LEN} bytes or less"
        )));
    }
    Ok(())
}

pub fn validate_name(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(format!("{field} is required")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(format!(
            "{field} must be {MAX_NAME_LEN} characters or less"
        )));
    }
    Ok(trimmed.to_string())
}

/// Optional profile text: surrounding whitespace is dropped and blank
/// becomes `None`.
#[must_use]
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn validate_text(field: &str, value: &str, max_len: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(ValidationError::new(format!(
            "{field} must be {max_len} characters or less"
        )));
    }
    Ok(value.to_string())
}

/// Priority is free-form and kept verbatim; blank falls back to `default`.
pub fn normalize_priority(priority: Option<&str>, default: &str) -> Result<String, ValidationError> {
    let priority = priority.filter(|p| !p.trim().is_empty());
    match priority {
        None => Ok(default.to_string()),
        Some(p) if p.trim().chars().count() > MAX_PRIORITY_LEN => Err(ValidationError::new(format!(
            "Priority must be {MAX_PRIORITY_LEN} characters or less"
        ))),
        Some(p) => Ok(p.to_string()),
    }
}

pub fn validate_comment(content: &str) -> Result<String, ValidationError> {
    validate_text("Comment", content, MAX_COMMENT_LEN)
}
