//! Error taxonomy shared by every machine.
//!
//! Errors live inside state variants (`AuthState::Error`, `SignInState::Error`,
//! `CredentialStoreState::Error`), so everything here is `Clone` and
//! comparable. Underlying service failures arrive already flattened to a
//! `code` + `message` pair at the provider boundary.

use thiserror::Error;

/// Failures of the secret store collaborator.
///
/// A missing item is *not* an error: `fetch` returns `None` and a load
/// resolves to empty [`crate::Credentials`]. These variants cover actual
/// faults - the backing store refusing access, or a stored blob that no
/// longer decodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("secret store access failed: {0}")]
    Access(String),
    #[error("stored value for {kind} could not be decoded: {message}")]
    Decode { kind: String, message: String },
    #[error("legacy store migration failed: {0}")]
    Migration(String),
}

impl StoreError {
    pub fn access(message: impl Into<String>) -> Self {
        Self::Access(message.into())
    }

    pub fn decode(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// The user-facing error taxonomy.
///
/// `Internal` is reserved for invariant violations (malformed event
/// payloads); it is deliberately distinct from the recoverable kinds so a
/// caller never mistakes a bug for a retryable condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("auth is not configured: {0}")]
    Configuration(String),
    #[error("{code}: {message}")]
    Service { code: String, message: String },
    #[error("invalid value for `{field}`: {message}")]
    Validation { field: String, message: String },
    #[error("operation not allowed in the current state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for the variants a caller can act on by correcting input and
    /// retrying; false for configuration and internal faults.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Service { .. } | Self::Validation { .. } | Self::Store(_)
        )
    }
}

/// Configuration rejected at the validation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one of user_pool or identity_pool must be configured")]
    NothingConfigured,
    #[error("user pool `{0}` must not be empty")]
    EmptyUserPoolField(&'static str),
    #[error("identity pool `{0}` must not be empty")]
    EmptyIdentityPoolField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::{AuthError, StoreError};

    #[test]
    fn store_errors_convert_into_auth_errors() {
        let err: AuthError = StoreError::access("keychain locked").into();
        assert!(matches!(err, AuthError::Store(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn internal_errors_are_not_retryable() {
        assert!(!AuthError::internal("missing payload").is_retryable());
        assert!(!AuthError::configuration("no user pool").is_retryable());
    }

    #[test]
    fn display_includes_the_offending_field() {
        let err = AuthError::validation("username", "must not be empty");
        assert_eq!(
            err.to_string(),
            "invalid value for `username`: must not be empty"
        );
    }
}
