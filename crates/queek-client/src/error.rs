//! Client error types.

use queek_storage::StorageError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Message carried by the error raised when a refresh fails mid-request.
pub(crate) const UNAUTHENTICATED_MESSAGE: &str = "Authentication required. Please login again.";

/// Error codes reported by the backend.
///
/// Unknown codes are preserved verbatim in [`ErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidPhone,
    OtpSendFailed,
    InvalidOtp,
    ExpiredOtp,
    ClientNotAllowed,
    InvalidRefreshToken,
    RefreshTokenExpired,
    Unauthenticated,
    AccountNotFound,
    TooManyRequests,
    UnknownError,
    Other(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::InvalidPhone => "invalid_phone",
            ErrorCode::OtpSendFailed => "otp_send_failed",
            ErrorCode::InvalidOtp => "invalid_otp",
            ErrorCode::ExpiredOtp => "expired_otp",
            ErrorCode::ClientNotAllowed => "client_not_allowed",
            ErrorCode::InvalidRefreshToken => "invalid_refresh_token",
            ErrorCode::RefreshTokenExpired => "refresh_token_expired",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::AccountNotFound => "account_not_found",
            ErrorCode::TooManyRequests => "too_many_requests",
            ErrorCode::UnknownError => "unknown_error",
            ErrorCode::Other(code) => code,
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "invalid_phone" => ErrorCode::InvalidPhone,
            "otp_send_failed" => ErrorCode::OtpSendFailed,
            "invalid_otp" => ErrorCode::InvalidOtp,
            "expired_otp" => ErrorCode::ExpiredOtp,
            "client_not_allowed" => ErrorCode::ClientNotAllowed,
            "invalid_refresh_token" => ErrorCode::InvalidRefreshToken,
            "refresh_token_expired" => ErrorCode::RefreshTokenExpired,
            "unauthenticated" => ErrorCode::Unauthenticated,
            "account_not_found" => ErrorCode::AccountNotFound,
            "too_many_requests" => ErrorCode::TooManyRequests,
            "unknown_error" => ErrorCode::UnknownError,
            other => ErrorCode::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error reported by the backend (non-2xx response).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable message from the backend.
    pub message: String,
    /// Backend error code.
    pub code: ErrorCode,
    /// HTTP status of the response.
    pub status: u16,
    /// The body's `data` field, or the whole body when `data` is absent.
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(message: impl Into<String>, code: ErrorCode, status: u16) -> Self {
        Self {
            message: message.into(),
            code,
            status,
            details: None,
        }
    }
}

/// Client error type.
///
/// `Clone` so a single refresh outcome can be handed to every caller waiting
/// on it.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Invalid client configuration (raised at construction)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend answered with a non-2xx status
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A 401 could not be recovered because the token refresh failed.
    /// The session has been cleared.
    #[error("{}", UNAUTHENTICATED_MESSAGE)]
    Unauthenticated {
        #[source]
        cause: Box<ClientError>,
    },

    /// The request never produced an HTTP response
    #[error("Network error: {0}")]
    Network(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// A 2xx body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    /// A request body could not be serialized
    #[error("Failed to encode request body: {0}")]
    Encode(#[source] Arc<serde_json::Error>),

    /// Token storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ClientError {
    /// Wrap an arbitrary transport failure.
    pub fn network<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ClientError::Network(Arc::new(err))
    }

    pub(crate) fn unauthenticated(cause: ClientError) -> Self {
        ClientError::Unauthenticated {
            cause: Box::new(cause),
        }
    }

    /// Backend-style error code. Local failures report `unknown_error`.
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Api(api) => api.code.clone(),
            ClientError::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            _ => ErrorCode::UnknownError,
        }
    }

    /// HTTP status, when the error corresponds to one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api(api) => Some(api.status),
            ClientError::Unauthenticated { .. } => Some(401),
            _ => None,
        }
    }

    /// Error details reported by the backend, if any.
    pub fn details(&self) -> Option<&Value> {
        match self {
            ClientError::Api(api) => api.details.as_ref(),
            _ => None,
        }
    }

    /// Returns true for a backend response with status exactly 401.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Api(api) if api.status == 401)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::network(err)
    }
}

/// Result type alias using ClientError.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_round_trips_known_codes() {
        for code in [
            "invalid_phone",
            "client_not_allowed",
            "invalid_refresh_token",
            "unauthenticated",
            "too_many_requests",
        ] {
            assert_eq!(ErrorCode::from(code).as_str(), code);
        }
    }

    #[test]
    fn test_error_code_preserves_unknown() {
        let code = ErrorCode::from("vendor_suspended");
        assert_eq!(code, ErrorCode::Other("vendor_suspended".to_string()));
        assert_eq!(code.to_string(), "vendor_suspended");
    }

    #[test]
    fn test_api_error_accessors() {
        let err = ClientError::from(ApiError::new("Forbidden", ErrorCode::ClientNotAllowed, 403));
        assert_eq!(err.code(), ErrorCode::ClientNotAllowed);
        assert_eq!(err.status(), Some(403));
        assert!(!err.is_unauthorized());
        assert_eq!(err.to_string(), "Forbidden");
    }

    #[test]
    fn test_unauthenticated_wraps_cause() {
        let cause = ClientError::from(ApiError::new(
            "Refresh token is invalid.",
            ErrorCode::InvalidRefreshToken,
            401,
        ));
        let err = ClientError::unauthenticated(cause);

        assert_eq!(err.code(), ErrorCode::Unauthenticated);
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), UNAUTHENTICATED_MESSAGE);

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "Refresh token is invalid.");
    }

    #[test]
    fn test_local_errors_have_no_status() {
        let err = ClientError::Config("missing".to_string());
        assert_eq!(err.status(), None);
        assert_eq!(err.code(), ErrorCode::UnknownError);
        assert!(err.details().is_none());
    }
}
