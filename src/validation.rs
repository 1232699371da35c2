use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AppError;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A required text field: present and non-blank. Returns the trimmed value.
pub fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::Validation(format!("{field} is required"))),
    }
}

/// Like [`required`] but for fields that may be omitted; blank is still rejected.
pub fn optional(value: Option<String>, field: &str) -> Result<Option<String>, AppError> {
    value.map(|v| required(Some(v), field)).transpose()
}
