//! SDK Utilities
//!
//! Common utilities for the SDK.

mod validation;

pub use validation::{MAX_STORAGE_KEY_LEN, ValidationError, validate_id, validate_storage_key};
