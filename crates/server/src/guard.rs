//! Bearer-token gate for protected routes.
//!
//! Use the [`Authenticated`] extractor in a handler signature; a request that
//! fails any check is rejected before the handler body runs.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

use crate::api::AppState;
use crate::error::{ApiError, GuardError};
use crate::session::SessionStore;
use crate::token::TokenCodec;
use crate::users::UserId;

/// Identity of the caller of a protected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject {
    pub user_id: UserId,
    /// The raw bearer token, needed to revoke it on logout.
    pub access_token: String,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct AccessGuard {
    store: Arc<dyn SessionStore>,
    codec: Arc<TokenCodec>,
}

impl AccessGuard {
    pub fn new(store: Arc<dyn SessionStore>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn authorize(
        &self,
        header: Option<&str>,
    ) -> Result<AuthenticatedSubject, GuardError> {
        let header = header.ok_or(GuardError::Missing)?;
        let token = match header.strip_prefix("Bearer ") {
            Some(token) if !token.is_empty() => token,
            _ => return Err(GuardError::Malformed),
        };

        // Revocation wins over a still-valid signature.
        if self.store.is_blacklisted(token).await? {
            return Err(GuardError::Revoked);
        }

        let verified = self.codec.verify_access_token(token)?;
        Ok(AuthenticatedSubject {
            user_id: verified.user_id,
            access_token: token.to_owned(),
            expires_at: verified.expires_at,
        })
    }
}

/// Extractor yielding the [`AuthenticatedSubject`] of the request.
///
/// ```ignore
/// async fn handler(Authenticated(subject): Authenticated) -> impl IntoResponse {
///     format!("Hello, user {}", subject.user_id)
/// }
/// ```
pub struct Authenticated(pub AuthenticatedSubject);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // A header that is not valid ASCII cannot hold a bearer token.
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| GuardError::Malformed)?),
            None => None,
        };

        let subject = state.guard.authorize(header).await.map_err(|e| {
            tracing::debug!(error = %e, "request rejected by access guard");
            ApiError::from(e)
        })?;
        Ok(Authenticated(subject))
    }
}
