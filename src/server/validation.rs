//! Request validation utilities for the RetailEase licensing API.

use std::fmt;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a UUID format (used for `license_id`, `counter_id`, etc.).
pub fn validate_uuid(value: &str, field_name: &str) -> ValidationResult<()> {
    let uuid_regex = regex::Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    )
    .unwrap();

    if uuid_regex.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "invalid UUID format (expected: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx)".to_string(),
        })
    }
}

/// Validate the `REP-XXXXXXXX-<base64>` license code shape.
///
/// This is a cheap structural check only — it does not verify the
/// signature, which `LicenseVerifier::verify` does separately.
pub fn validate_license_code(value: &str, field_name: &str) -> ValidationResult<()> {
    let code_regex = regex::Regex::new(r"^REP-[0-9A-F]{8}-[A-Za-z0-9+/=]+$").unwrap();

    if code_regex.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "invalid license code format (expected: REP-XXXXXXXX-<base64>)".to_string(),
        })
    }
}

/// Validate a device/machine id. RetailEase devices supply a freeform
/// identifier (not necessarily a hash) so this only bounds the length.
pub fn validate_machine_id(value: &str, field_name: &str) -> ValidationResult<()> {
    validate_length(value, 1, 64, field_name)
}

pub fn validate_not_empty(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "cannot be empty".to_string(),
        })
    } else {
        Ok(())
    }
}

pub fn validate_length(value: &str, min: usize, max: usize, field_name: &str) -> ValidationResult<()> {
    let len = value.chars().count();
    if len < min {
        Err(ValidationError {
            field: field_name.to_string(),
            message: format!("must be at least {min} characters"),
        })
    } else if len > max {
        Err(ValidationError {
            field: field_name.to_string(),
            message: format!("must be at most {max} characters"),
        })
    } else {
        Ok(())
    }
}

pub fn validate_optional_not_empty(value: Option<&str>, field_name: &str) -> ValidationResult<()> {
    if let Some(v) = value {
        validate_not_empty(v, field_name)
    } else {
        Ok(())
    }
}

/// Validate an email address with a pragmatic (not RFC 5322-complete) check.
pub fn validate_email(value: &str, field_name: &str) -> ValidationResult<()> {
    let email_regex = regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();

    if email_regex.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "invalid email address".to_string(),
        })
    }
}
