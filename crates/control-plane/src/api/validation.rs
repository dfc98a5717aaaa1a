// Input size limits for the REST API
//
// Last-resort limits to guard the service from oversized payloads.
// These are hard limits, not configurable. Field-level rules (non-empty
// names, URL shape, known event names) live in the services.

use super::common::ErrorResponse;
use axum::http::StatusCode;
use axum::Json;

// =============================================================================
// Input Size Limits
// =============================================================================

/// Maximum size for any name field (users, projects, categories, templates).
pub const MAX_NAME_BYTES: usize = 2 * 1024; // 2 KB

/// Maximum size for description fields.
pub const MAX_DESCRIPTION_BYTES: usize = 10 * 1024; // 10 KB

/// Maximum size for a template subject line.
pub const MAX_SUBJECT_BYTES: usize = 2 * 1024; // 2 KB

/// Maximum size for template HTML and text bodies.
pub const MAX_BODY_BYTES: usize = 1024 * 1024; // 1 MB

/// Maximum size for a webhook URL or secret.
pub const MAX_WEBHOOK_FIELD_BYTES: usize = 2 * 1024; // 2 KB

/// Generic validation error message returned to clients.
/// Intentionally vague to avoid leaking which field exceeded limits.
pub const VALIDATION_ERROR_MESSAGE: &str = "Input exceeds allowed limits";

// =============================================================================
// Validation Functions
// =============================================================================

/// Validation error - returns generic message to avoid leaking details
#[derive(Debug)]
pub struct ValidationError;

impl From<ValidationError> for (StatusCode, Json<ErrorResponse>) {
    fn from(_: ValidationError) -> Self {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(VALIDATION_ERROR_MESSAGE)),
        )
    }
}

fn check(field: &str, value: Option<&str>, max: usize) -> Result<(), ValidationError> {
    if let Some(value) = value {
        if value.len() > max {
            tracing::warn!(
                field,
                size = value.len(),
                max,
                "Input exceeds size limit"
            );
            return Err(ValidationError);
        }
    }
    Ok(())
}

pub fn validate_name(name: Option<&str>) -> Result<(), ValidationError> {
    check("name", name, MAX_NAME_BYTES)
}

pub fn validate_description(description: Option<&str>) -> Result<(), ValidationError> {
    check("description", description, MAX_DESCRIPTION_BYTES)
}

/// Validate the provided template fields
pub fn validate_template_input(
    name: Option<&str>,
    subject: Option<&str>,
    html_body: Option<&str>,
    text_body: Option<&str>,
) -> Result<(), ValidationError> {
    validate_name(name)?;
    check("subject", subject, MAX_SUBJECT_BYTES)?;
    check("html_body", html_body, MAX_BODY_BYTES)?;
    check("text_body", text_body, MAX_BODY_BYTES)?;
    Ok(())
}

pub fn validate_webhook_input(
    url: Option<&str>,
    secret: Option<&str>,
) -> Result<(), ValidationError> {
    check("url", url, MAX_WEBHOOK_FIELD_BYTES)?;
    check("secret", secret, MAX_WEBHOOK_FIELD_BYTES)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_limit() {
        assert!(validate_name(None).is_ok());
        assert!(validate_name(Some("Invoices")).is_ok());
        assert!(validate_name(Some(&"x".repeat(MAX_NAME_BYTES))).is_ok());
        assert!(validate_name(Some(&"x".repeat(MAX_NAME_BYTES + 1))).is_err());
    }

    #[test]
    fn test_description_limit() {
        assert!(validate_description(Some(&"x".repeat(MAX_DESCRIPTION_BYTES))).is_ok());
        assert!(validate_description(Some(&"x".repeat(MAX_DESCRIPTION_BYTES + 1))).is_err());
    }

    #[test]
    fn test_template_limits() {
        let body = "x".repeat(MAX_BODY_BYTES);
        assert!(validate_template_input(Some("t"), Some("s"), Some(&body), Some(&body)).is_ok());

        let too_big = "x".repeat(MAX_BODY_BYTES + 1);
        assert!(validate_template_input(None, None, Some(&too_big), None).is_err());
        assert!(validate_template_input(None, None, None, Some(&too_big)).is_err());
        assert!(
            validate_template_input(None, Some(&"x".repeat(MAX_SUBJECT_BYTES + 1)), None, None)
                .is_err()
        );
    }

    #[test]
    fn test_webhook_limits() {
        assert!(validate_webhook_input(Some("https://x.test/hook"), Some("s3cret")).is_ok());
        let long_url = "x".repeat(MAX_WEBHOOK_FIELD_BYTES + 1);
        assert!(validate_webhook_input(Some(&long_url), None).is_err());
    }
}
