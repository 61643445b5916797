//! Session flows: register, login, logout, refresh and federated login.
//!
//! The manager owns no state of its own. Identities live in the [`UserStore`],
//! refresh tokens, revocations and login nonces in the [`SessionStore`].

use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;

use crate::error::SessionError;
use crate::federation::IdentityProvider;
use crate::password::{hash_password_blocking, verify_password_blocking};
use crate::response::{IdentitySummary, TokenPair};
use crate::session::SessionStore;
use crate::token::TokenCodec;
use crate::users::{NewUser, ProviderLink, User, UserId, UserStore};

/// Lifetime of an OAuth `state` nonce between redirect and callback.
pub const LOGIN_STATE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserStore>,
    store: Arc<dyn SessionStore>,
    codec: Arc<TokenCodec>,
    provider: Arc<dyn IdentityProvider>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserStore>,
        store: Arc<dyn SessionStore>,
        codec: Arc<TokenCodec>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            users,
            store,
            codec,
            provider,
        }
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Issue a fresh token pair for `user_id` and remember the refresh token,
    /// replacing any earlier one.
    async fn issue_session(&self, user_id: UserId) -> Result<TokenPair, SessionError> {
        let access_token = self.codec.issue_access_token(user_id)?;
        let refresh_token = self.codec.issue_refresh_token()?;
        self.store
            .set_refresh_token(user_id, &refresh_token, self.codec.ttl())
            .await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    #[tracing::instrument(skip(self, password), fields(user_id = tracing::field::Empty))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<TokenPair, SessionError> {
        let email = normalize_email(email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(SessionError::AlreadyExists);
        }

        let password_hash = hash_password_blocking(password.to_owned()).await?;
        // A concurrent registration can still win between the lookup and the
        // insert; the unique index turns that into AlreadyExists as well.
        let user = self
            .users
            .create(NewUser {
                email,
                name: name.to_owned(),
                password_hash: Some(password_hash),
                provider: None,
            })
            .await?;
        tracing::Span::current().record("user_id", user.id);

        let pair = self.issue_session(user.id).await?;
        tracing::info!("user registered");
        Ok(pair)
    }

    #[tracing::instrument(skip(self, password), fields(user_id = tracing::field::Empty))]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, SessionError> {
        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(SessionError::NotFound)?;
        tracing::Span::current().record("user_id", user.id);

        let Some(hash) = user.password_hash.clone() else {
            return Err(SessionError::InvalidCredentials);
        };
        if !verify_password_blocking(password.to_owned(), hash).await {
            tracing::debug!("password mismatch");
            return Err(SessionError::InvalidCredentials);
        }

        self.issue_session(user.id).await
    }

    /// Revoke `access_token` for the rest of its lifetime and drop the
    /// refresh token of `user_id`.
    #[tracing::instrument(skip(self, access_token))]
    pub async fn logout(&self, user_id: UserId, access_token: &str) -> Result<(), SessionError> {
        // The entry must outlive the token: it covers the whole expiry second.
        let ttl = match self.codec.verify_access_token(access_token) {
            Ok(verified) => verified.remaining(),
            Err(e) => {
                tracing::debug!(error = %e, "cannot read token expiry, using configured ttl");
                self.codec.ttl()
            }
        };

        self.store
            .blacklist_access_token(access_token, user_id, ttl)
            .await
            .map_err(SessionError::LogoutFailed)?;
        self.store
            .delete_refresh_token(user_id)
            .await
            .map_err(SessionError::LogoutFailed)?;

        tracing::info!("user logged out");
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token. The refresh
    /// token itself stays valid until its own TTL runs out.
    ///
    /// A token that is absent or cannot be looked up counts as expired.
    #[tracing::instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, user_id: UserId, refresh_token: &str) -> Result<String, SessionError> {
        let stored = match self.store.get_refresh_token(user_id).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Err(SessionError::Expired),
            Err(e) => {
                tracing::warn!(error = %e, "refresh token lookup failed");
                return Err(SessionError::Expired);
            }
        };
        if !bool::from(stored.as_bytes().ct_eq(refresh_token.as_bytes())) {
            tracing::warn!("refresh token mismatch");
            return Err(SessionError::Mismatch);
        }
        Ok(self.codec.issue_access_token(user_id)?)
    }

    /// Start a federated login: store a fresh `state` nonce and return the
    /// provider URL the browser should be sent to.
    #[tracing::instrument(skip(self))]
    pub async fn begin_federated_login(&self) -> Result<String, SessionError> {
        let state = self.codec.issue_refresh_token()?;
        self.store.store_login_state(&state, LOGIN_STATE_TTL).await?;
        Ok(self.provider.authorization_url(&state))
    }

    /// Consume a `state` nonce returned by the provider. Each nonce is
    /// accepted once.
    #[tracing::instrument(skip_all)]
    pub async fn verify_login_state(&self, state: &str) -> Result<(), SessionError> {
        if state.is_empty() || !self.store.consume_login_state(state).await? {
            return Err(SessionError::StateMismatch);
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(provider = self.provider.name(), user_id = tracing::field::Empty))]
    pub async fn federated_login(
        &self,
        code: &str,
    ) -> Result<(TokenPair, IdentitySummary), SessionError> {
        let profile = self.provider.exchange_and_fetch_profile(code).await?;
        let provider = self.provider.name().to_owned();

        let user: User = match self
            .users
            .find_by_provider(&provider, &profile.provider_id)
            .await?
        {
            Some(user) => user,
            None => {
                tracing::info!("creating identity for new federated account");
                self.users
                    .create(NewUser {
                        email: normalize_email(&profile.email),
                        name: profile.name.clone(),
                        password_hash: None,
                        provider: Some(ProviderLink {
                            provider,
                            provider_id: profile.provider_id.clone(),
                        }),
                    })
                    .await?
            }
        };
        tracing::Span::current().record("user_id", user.id);

        let pair = self.issue_session(user.id).await?;
        Ok((
            pair,
            IdentitySummary {
                email: user.email,
                name: user.name,
            },
        ))
    }
}
