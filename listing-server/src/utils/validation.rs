//! Input validation helpers
//!
//! Centralized text length constants and validation functions.
//! SQLite TEXT has no built-in length enforcement.

use crate::utils::AppError;

// ── Text length limits ──────────────────────────────────────────────

/// Listing titles
pub const MAX_TITLE_LEN: usize = 200;

/// Free-form descriptions
pub const MAX_DESCRIPTION_LEN: usize = 10_000;

/// Short identifiers: property type, listing type, zip code, state, etc.
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Addresses and city names
pub const MAX_ADDRESS_LEN: usize = 500;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Validate that a number is finite and not negative.
pub fn validate_non_negative(value: f64, field: &str) -> Result<(), AppError> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::validation(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert!(validate_required_text("Loft", "title", MAX_TITLE_LEN).is_ok());
        assert!(validate_required_text("   ", "title", MAX_TITLE_LEN).is_err());
        assert!(validate_required_text(&"x".repeat(201), "title", MAX_TITLE_LEN).is_err());
    }

    #[test]
    fn test_non_negative() {
        assert!(validate_non_negative(0.0, "price").is_ok());
        assert!(validate_non_negative(-1.0, "price").is_err());
        assert!(validate_non_negative(f64::NAN, "price").is_err());
    }
}
