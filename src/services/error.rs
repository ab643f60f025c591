//! Service error type
//!
//! Every service returns [`ServiceResult`]. The variants map one-to-one onto
//! the error codes clients see, both in GraphQL `extensions.code` and in the
//! JSON body of HTTP errors.

use crate::db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Payment error: {0}")]
    Payment(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("You are not allowed to perform this action".to_string())
    }

    pub fn unauthenticated() -> Self {
        Self::Unauthorized("Authentication required".to_string())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::Payment(_) => "PAYMENT_ERROR",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to clients; internal details stay in the logs
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(collection) => {
                ServiceError::Conflict(format!("A record with the same key already exists in {}", collection))
            }
            other => ServiceError::Internal(anyhow::Error::new(other)),
        }
    }
}

/// Shorthand for `Option` lookups that must exist
pub trait OrNotFound<T> {
    fn or_not_found(self, what: &str) -> ServiceResult<T>;
}

impl<T> OrNotFound<T> for Option<T> {
    fn or_not_found(self, what: &str) -> ServiceResult<T> {
        self.ok_or_else(|| ServiceError::not_found(what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_public_messages() {
        assert_eq!(ServiceError::not_found("Campaign").to_string(), "Campaign not found");
        assert_eq!(ServiceError::not_found("Campaign").code(), "NOT_FOUND");

        let internal = ServiceError::Internal(anyhow::anyhow!("connection reset by peer"));
        assert_eq!(internal.code(), "INTERNAL_ERROR");
        assert_eq!(internal.public_message(), "Internal server error");
    }

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let err: ServiceError = StoreError::Duplicate("users").into();
        assert_eq!(err.code(), "CONFLICT");

        let err: ServiceError = StoreError::Serialization("bad".into()).into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
