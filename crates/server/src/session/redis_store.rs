use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

use super::{SessionStore, blacklist_key, login_state_key, refresh_token_key};
use crate::error::SessionStoreError;
use crate::users::UserId;

/// Session store backed by Redis. Every entry is written with a TTL so Redis
/// takes care of expiry.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

/// Redis refuses a zero expiry, so sub-millisecond TTLs are rounded up.
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect and verify the server answers before returning.
    #[tracing::instrument(skip(url))]
    pub async fn connect(url: &str) -> Result<Self, SessionStoreError> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!("connected to redis");
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    #[tracing::instrument(level = "debug", skip(self, token))]
    async fn set_refresh_token(
        &self,
        user_id: UserId,
        token: &str,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .pset_ex(refresh_token_key(user_id), token, ttl_millis(ttl))
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_refresh_token(
        &self,
        user_id: UserId,
    ) -> Result<Option<String>, SessionStoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(refresh_token_key(user_id)).await?)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_refresh_token(&self, user_id: UserId) -> Result<(), SessionStoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(refresh_token_key(user_id)).await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, token))]
    async fn blacklist_access_token(
        &self,
        token: &str,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .pset_ex(blacklist_key(token), user_id, ttl_millis(ttl))
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn is_blacklisted(&self, token: &str) -> Result<bool, SessionStoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(blacklist_key(token)).await?)
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn store_login_state(
        &self,
        state: &str,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .pset_ex(login_state_key(state), 1u8, ttl_millis(ttl))
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn consume_login_state(&self, state: &str) -> Result<bool, SessionStoreError> {
        let mut conn = self.conn.clone();
        // DEL is atomic, so two callbacks racing on the same nonce cannot both win.
        let removed: i64 = conn.del(login_state_key(state)).await?;
        Ok(removed == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_never_zero() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2_000);
    }
}
