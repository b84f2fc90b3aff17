//! Validation Utilities

use thiserror::Error;

/// Longest storage key an extension may use, in characters
pub const MAX_STORAGE_KEY_LEN: usize = 256;

/// Validation error types
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Field required: {0}")]
    Required(String),
}

impl From<ValidationError> for docplus_core::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidKey(msg) => docplus_core::Error::InvalidKey(msg),
            other => docplus_core::Error::Other(other.to_string()),
        }
    }
}

/// Validate an extension ID
///
/// Valid IDs are:
/// - 1-128 characters
/// - Lowercase alphanumeric with hyphens and underscores
/// - Must start with a letter
pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    let Some(first) = id.chars().next() else {
        return Err(ValidationError::Required("ID cannot be empty".into()));
    };

    if id.len() > 128 {
        return Err(ValidationError::InvalidId(
            "ID must be 128 characters or less".into(),
        ));
    }

    if !first.is_ascii_lowercase() {
        return Err(ValidationError::InvalidId(
            "ID must start with a lowercase letter".into(),
        ));
    }

    for (i, c) in id.chars().enumerate() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
            return Err(ValidationError::InvalidId(format!(
                "Invalid character '{}' at position {}",
                c, i
            )));
        }
    }

    if id.ends_with('-') || id.ends_with('_') {
        return Err(ValidationError::InvalidId(
            "ID cannot end with hyphen or underscore".into(),
        ));
    }

    Ok(())
}

/// Validate a logical storage key
///
/// Keys are 1-256 characters with no control characters.
pub fn validate_storage_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::InvalidKey("key cannot be empty".into()));
    }

    if key.chars().count() > MAX_STORAGE_KEY_LEN {
        return Err(ValidationError::InvalidKey(format!(
            "key must be {} characters or less",
            MAX_STORAGE_KEY_LEN
        )));
    }

    if let Some(pos) = key.chars().position(char::is_control) {
        return Err(ValidationError::InvalidKey(format!(
            "control character at position {}",
            pos
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("summarizer").is_ok());
        assert!(validate_id("ai-translate").is_ok());
        assert!(validate_id("email_v2").is_ok());

        assert!(validate_id("").is_err());
        assert!(validate_id("Summarizer").is_err());
        assert!(validate_id("1st").is_err());
        assert!(validate_id("has space").is_err());
        assert!(validate_id("trailing-").is_err());
        assert!(validate_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_storage_key() {
        assert!(validate_storage_key("draft").is_ok());
        assert!(validate_storage_key("history:2024/01").is_ok());
        assert!(validate_storage_key("中文键").is_ok());
        assert!(validate_storage_key(&"k".repeat(MAX_STORAGE_KEY_LEN)).is_ok());

        assert!(validate_storage_key("").is_err());
        assert!(validate_storage_key(&"k".repeat(MAX_STORAGE_KEY_LEN + 1)).is_err());
        assert!(validate_storage_key("line\nbreak").is_err());
        assert!(validate_storage_key("nul\0").is_err());
    }

    #[test]
    fn test_invalid_key_converts_to_core_error() {
        let err: docplus_core::Error = validate_storage_key("").unwrap_err().into();
        assert!(matches!(err, docplus_core::Error::InvalidKey(_)));
    }
}
