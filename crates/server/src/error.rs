use axum::response::{IntoResponse, Response};
use hyper::StatusCode;
use thiserror::Error;

use crate::response::ApiResponse;

/// Failures of the credential codec.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign access token: {0}")]
    Signing(String),
    #[error("Entropy source failed: {0}")]
    Entropy(String),
    #[error("Malformed token: {0}")]
    Malformed(String),
    #[error("Token signature does not match")]
    BadSignature,
    #[error("Token has expired")]
    Expired,
    #[error("Token was signed with an unexpected algorithm")]
    WrongAlgorithm,
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
    #[error("Session store command failed: {0}")]
    Command(String),
}

impl From<redis::RedisError> for SessionStoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            SessionStoreError::Unavailable(err.to_string())
        } else {
            SessionStoreError::Command(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("A user with this {0} already exists")]
    Duplicate(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Failures talking to the federated identity provider.
///
/// `Network` covers transport problems (connect, TLS, timeout) so callers can
/// tell them apart from the provider actively rejecting a request.
#[derive(Debug, Error)]
pub enum FederationError {
    #[error("Network error talking to identity provider: {0}")]
    Network(String),
    #[error("Identity provider rejected the authorization code (HTTP {status})")]
    ExchangeFailed { status: StatusCode },
    #[error("Identity provider token response could not be decoded: {0}")]
    ExchangeDecodeFailed(String),
    #[error("Identity provider profile request failed (HTTP {status})")]
    ProfileFetchFailed { status: StatusCode },
    #[error("Identity provider profile could not be decoded: {0}")]
    ProfileDecodeFailed(String),
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Authorization header is required")]
    Missing,
    #[error("Authorization header must use the Bearer scheme")]
    Malformed,
    #[error("Token has been revoked")]
    Revoked,
    #[error(transparent)]
    Invalid(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

/// Errors of the session manager flows.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("User already exists")]
    AlreadyExists,
    #[error("User not found")]
    NotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Refresh token is invalid or expired")]
    Expired,
    #[error("Refresh token does not match")]
    Mismatch,
    #[error("Login state is unknown or already used")]
    StateMismatch,
    #[error("Logout failed: {0}")]
    LogoutFailed(#[source] SessionStoreError),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
    #[error(transparent)]
    Users(UserStoreError),
    #[error(transparent)]
    Federation(#[from] FederationError),
}

impl From<UserStoreError> for SessionError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::Duplicate(_) => SessionError::AlreadyExists,
            other => SessionError::Users(other),
        }
    }
}

/// Boundary error, mapped one-to-one onto an HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Store(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AlreadyExists => ApiError::Conflict("User already exists".into()),
            // Unknown email and wrong password are indistinguishable to clients.
            SessionError::NotFound | SessionError::InvalidCredentials => {
                ApiError::Authentication("Invalid credentials".into())
            }
            SessionError::Expired | SessionError::Mismatch => {
                ApiError::Authentication("Invalid or expired refresh token".into())
            }
            SessionError::StateMismatch => ApiError::Validation("Invalid state".into()),
            SessionError::Federation(FederationError::ExchangeFailed { status })
                if status.is_client_error() =>
            {
                tracing::warn!(error = %err, "authorization code rejected by provider");
                ApiError::Authentication("Invalid authorization code".into())
            }
            SessionError::Federation(ref inner) => {
                tracing::error!(error = %inner, "identity provider failure");
                ApiError::Upstream("Identity provider request failed".into())
            }
            SessionError::LogoutFailed(ref inner) => {
                tracing::error!(error = %inner, "logout failed");
                ApiError::Store("Logout failed".into())
            }
            other => {
                tracing::error!(error = %other, "internal error");
                ApiError::Store("Internal server error".into())
            }
        }
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Missing | GuardError::Malformed | GuardError::Revoked => {
                ApiError::Authentication(err.to_string())
            }
            GuardError::Invalid(TokenError::Expired) => {
                ApiError::Authentication("Token has expired".into())
            }
            GuardError::Invalid(_) => ApiError::Authentication("Invalid token".into()),
            GuardError::Store(inner) => {
                tracing::error!(error = %inner, "blacklist lookup failed");
                ApiError::Store("Internal server error".into())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        ApiResponse::<()>::failure(status, self.to_string()).into_response()
    }
}
