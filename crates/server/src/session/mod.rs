//! Session state: live refresh tokens and revoked access tokens.
//!
//! Expiry is enforced by the backing store (Redis TTLs, or lazy eviction in
//! the in-memory store); nothing in this crate sweeps entries actively.

mod memory;
mod redis_store;

pub use memory::MemorySessionStore;
pub use redis_store::RedisSessionStore;

use async_trait::async_trait;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::error::SessionStoreError;
use crate::users::UserId;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store the refresh token of `user_id`, replacing any previous one.
    async fn set_refresh_token(
        &self,
        user_id: UserId,
        token: &str,
        ttl: Duration,
    ) -> Result<(), SessionStoreError>;

    async fn get_refresh_token(&self, user_id: UserId)
    -> Result<Option<String>, SessionStoreError>;

    async fn delete_refresh_token(&self, user_id: UserId) -> Result<(), SessionStoreError>;

    async fn blacklist_access_token(
        &self,
        token: &str,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), SessionStoreError>;

    async fn is_blacklisted(&self, token: &str) -> Result<bool, SessionStoreError>;

    /// Remember an OAuth `state` nonce handed to the browser.
    async fn store_login_state(&self, state: &str, ttl: Duration)
    -> Result<(), SessionStoreError>;

    /// Remove a `state` nonce, returning whether it was present. A nonce can
    /// only be consumed once.
    async fn consume_login_state(&self, state: &str) -> Result<bool, SessionStoreError>;
}

pub(crate) fn refresh_token_key(user_id: UserId) -> String {
    format!("user:{user_id}:refresh_token")
}

/// Revocation entries are keyed by a digest so raw bearer tokens never end up
/// in the store.
pub(crate) fn blacklist_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!(
        "blacklist:{}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
    )
}

pub(crate) fn login_state_key(state: &str) -> String {
    format!("oauth_state:{state}")
}
