use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::sanitize::sanitize;

pub const DEFAULT_TEXT_MAX: usize = 500;
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("This field is required")]
    Required,
    #[error("Invalid content detected")]
    InvalidContent,
    #[error("Text must be {max} characters or less")]
    TooLong { max: usize },
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least {min} characters long")]
    TooShort { min: usize },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Required => "required",
            ValidationError::InvalidContent => "invalid-content",
            ValidationError::TooLong { .. } => "too-long",
            ValidationError::InvalidEmail => "invalid-email",
            ValidationError::TooShort { .. } => "too-short",
        }
    }
}

/// Verdict for a sanitized free-text or email field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub sanitized_value: String,
    pub error: Option<ValidationError>,
}

impl ValidationResult {
    fn ok(sanitized_value: String) -> Self {
        Self {
            is_valid: true,
            sanitized_value,
            error: None,
        }
    }

    fn fail(sanitized_value: String, error: ValidationError) -> Self {
        Self {
            is_valid: false,
            sanitized_value,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordCheck {
    pub is_valid: bool,
    pub error: Option<ValidationError>,
}

/// Required free text, sanitized, at most `max_length` characters after sanitizing.
pub fn validate_text(text: &str, max_length: usize) -> ValidationResult {
    if text.is_empty() {
        return ValidationResult::fail(String::new(), ValidationError::Required);
    }

    let sanitized = sanitize(text);
    if sanitized.is_empty() {
        return ValidationResult::fail(sanitized, ValidationError::InvalidContent);
    }

    if sanitized.chars().count() > max_length {
        return ValidationResult::fail(sanitized, ValidationError::TooLong { max: max_length });
    }

    ValidationResult::ok(sanitized)
}

pub fn validate_email(email: &str) -> ValidationResult {
    let sanitized = sanitize(email);
    if !EMAIL.is_match(&sanitized) {
        return ValidationResult::fail(sanitized, ValidationError::InvalidEmail);
    }
    ValidationResult::ok(sanitized)
}

/// Passwords are checked as typed; they are never sanitized or echoed back.
pub fn validate_password(password: &str) -> PasswordCheck {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return PasswordCheck {
            is_valid: false,
            error: Some(ValidationError::TooShort {
                min: MIN_PASSWORD_LEN,
            }),
        };
    }
    PasswordCheck {
        is_valid: true,
        error: None,
    }
}

/// Per-field failures of one submitted form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, ValidationError>);

impl FieldErrors {
    /// Records the failure, if any, and hands back the sanitized value.
    pub fn check(&mut self, field: &'static str, result: ValidationResult) -> String {
        if let Some(error) = result.error {
            self.0.insert(field, error);
        }
        result.sanitized_value
    }

    pub fn check_password(&mut self, field: &'static str, check: PasswordCheck) {
        if let Some(error) = check.error {
            self.0.insert(field, error);
        }
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&ValidationError> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ValidationError)> + '_ {
        self.0.iter().map(|(field, error)| (*field, error))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {error}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}
