// Error types for the notification pipeline and the domain services around it

use thiserror::Error;

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, DomainError>;

/// Errors surfaced to API callers
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input (bad URL, empty event set, unknown event name, ...)
    #[error("{0}")]
    Validation(String),

    /// Unknown entity id
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Caller is neither the owner nor a privileged principal
    #[error("{0}")]
    Forbidden(String),

    /// Uniqueness violation (e.g. duplicate email)
    #[error("{0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        DomainError::NotFound { entity, id }
    }

    /// Create a forbidden error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        DomainError::Forbidden(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        DomainError::Conflict(msg.into())
    }
}

/// Failure of a single outbound webhook delivery.
///
/// Never converted into [`DomainError`]: delivery failures are logged at the
/// point of occurrence and never reach the emitting operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Subscriber answered with a non-2xx status
    #[error("subscriber responded with status {0}")]
    Status(u16),

    /// No response within the configured timeout
    #[error("delivery timed out")]
    Timeout,

    /// Connection, DNS, TLS or other transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = DomainError::not_found("Subscription", 42);
        assert_eq!(err.to_string(), "Subscription not found: 42");
    }

    #[test]
    fn test_internal_from_anyhow() {
        let err: DomainError = anyhow::anyhow!("disk on fire").into();
        assert!(matches!(err, DomainError::Internal(_)));
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_delivery_error_display() {
        assert_eq!(
            DeliveryError::Status(500).to_string(),
            "subscriber responded with status 500"
        );
        assert_eq!(DeliveryError::Timeout.to_string(), "delivery timed out");
    }
}
