//! Credential codec: signed access tokens and opaque refresh tokens.
//!
//! Access tokens are HS256 JWTs carrying only the subject (`user_id`) and the
//! issue/expiry timestamps. Refresh tokens are 256 bits of OS randomness in
//! URL-safe base64; they carry no information and are only meaningful next to
//! the entry kept in the session store.

use base64::Engine;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;

use crate::error::TokenError;
use crate::users::UserId;

const REFRESH_TOKEN_BYTES: usize = 32;

/// Claims embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub iat: i64,
    pub exp: i64,
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: UserId,
    /// Expiry as unix seconds.
    pub expires_at: i64,
}

impl VerifiedToken {
    /// Time left until the token stops verifying, zero if it already has.
    ///
    /// Validation runs on whole seconds with no leeway, so a token is still
    /// accepted during its `exp` second and stops at `exp + 1`.
    pub fn remaining(&self) -> Duration {
        let now = OffsetDateTime::now_utc();
        let whole = self
            .expires_at
            .saturating_add(1)
            .saturating_sub(now.unix_timestamp());
        let left = time::Duration::seconds(whole)
            - time::Duration::nanoseconds(i64::from(now.nanosecond()));
        Duration::try_from(left).unwrap_or(Duration::ZERO)
    }
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Lifetime of access tokens and of the refresh token entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue_access_token(&self, user_id: UserId) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AccessClaims {
            user_id,
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs() as i64),
        };
        self.sign(&claims)
    }

    pub(crate) fn sign(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn issue_refresh_token(&self) -> Result<String, TokenError> {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        getrandom::fill(&mut bytes).map_err(|e| TokenError::Entropy(e.to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn verify_access_token(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::WrongAlgorithm
                }
                _ => TokenError::Malformed(e.to_string()),
            })?;

        Ok(VerifiedToken {
            user_id: data.claims.user_id,
            expires_at: data.claims.exp,
        })
    }
}
