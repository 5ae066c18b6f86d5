//! Provider error shapes.

use thiserror::Error;

use gatehouse_types::AuthError;

/// Typed failures from either RPC surface.
///
/// The common service errors get their own variants so engine code and
/// tests can match on them; anything else arrives as `Service` with the
/// provider's own code carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("user not found")]
    UserNotFound,
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("invalid password: {0}")]
    InvalidPassword(String),
    #[error("code mismatch")]
    CodeMismatch,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("too many requests")]
    TooManyRequests,
    #[error("request timed out")]
    Timeout,
    #[error("{code}: {message}")]
    Service { code: String, message: String },
}

impl ProviderError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Stable error code, mirrored into [`AuthError::Service`].
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::UserNotFound => "UserNotFoundException",
            Self::NotAuthorized(_) => "NotAuthorizedException",
            Self::InvalidPassword(_) => "InvalidPasswordException",
            Self::CodeMismatch => "CodeMismatchException",
            Self::InvalidParameter(_) => "InvalidParameterException",
            Self::ResourceNotFound(_) => "ResourceNotFoundException",
            Self::TooManyRequests => "TooManyRequestsException",
            Self::Timeout => "TimeoutError",
            Self::Service { code, .. } => code,
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        AuthError::service(err.code().to_string(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthError, ProviderError};

    #[test]
    fn converts_to_service_error_with_code() {
        let err: AuthError = ProviderError::UserNotFound.into();
        match err {
            AuthError::Service { code, message } => {
                assert_eq!(code, "UserNotFoundException");
                assert_eq!(message, "user not found");
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn custom_service_codes_pass_through() {
        let err = ProviderError::service("LimitExceededException", "slow down");
        assert_eq!(err.code(), "LimitExceededException");
    }
}
