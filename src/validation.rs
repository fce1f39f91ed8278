//! Input validation for the serving layer.
//!
//! Bounds requests before they reach the engine. An empty body is valid
//! input (masking an empty string is defined and returns no entities);
//! only size violations are rejected here.

use crate::errors::{AppError, Result};

/// Default cap on accepted email bodies; configurable via
/// MAILGUARD_MAX_EMAIL_BYTES.
pub const DEFAULT_MAX_EMAIL_BYTES: usize = 50_000;

/// Validate an email body against the configured size cap.
pub fn validate_email_body(body: &str, max_bytes: usize) -> Result<()> {
    if body.len() > max_bytes {
        return Err(AppError::ContentTooLarge {
            size: body.len(),
            max: max_bytes,
        });
    }
    Ok(())
}
