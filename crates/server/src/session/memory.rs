use async_trait::async_trait;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::SessionStore;
use crate::error::SessionStoreError;
use crate::users::UserId;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Map whose entries disappear once their TTL has passed. Expired entries are
/// hidden on read and swept at most once per `CLEANUP_INTERVAL`.
#[derive(Debug)]
struct ExpiringMap<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, Expiring<V>>,
    last_cleanup: Mutex<Instant>,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
            last_cleanup: Mutex::new(Instant::now()),
        }
    }

    fn maybe_cleanup(&self) {
        if let Ok(mut last_cleanup) = self.last_cleanup.try_lock() {
            if last_cleanup.elapsed() >= CLEANUP_INTERVAL {
                *last_cleanup = Instant::now();
                drop(last_cleanup);
                self.entries.retain(|_, entry| !entry.is_expired());
            }
        }
    }

    fn insert(&self, key: K, value: V, ttl: Duration) {
        self.maybe_cleanup();
        self.entries.insert(key, Expiring::new(value, ttl));
    }

    fn get(&self, key: &K) -> Option<V> {
        self.maybe_cleanup();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    /// Remove the entry, returning it only if it had not expired yet.
    fn take(&self, key: &K) -> Option<V> {
        self.entries
            .remove(key)
            .map(|(_, entry)| entry)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value)
    }
}

/// In-process session store for development and tests.
///
/// State is lost on restart and not shared between replicas; production
/// deployments use [`super::RedisSessionStore`].
#[derive(Clone, Debug)]
pub struct MemorySessionStore {
    refresh_tokens: Arc<ExpiringMap<UserId, String>>,
    revoked: Arc<ExpiringMap<String, UserId>>,
    login_states: Arc<ExpiringMap<String, ()>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            refresh_tokens: Arc::new(ExpiringMap::new()),
            revoked: Arc::new(ExpiringMap::new()),
            login_states: Arc::new(ExpiringMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn set_refresh_token(
        &self,
        user_id: UserId,
        token: &str,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        self.refresh_tokens.insert(user_id, token.to_string(), ttl);
        Ok(())
    }

    async fn get_refresh_token(
        &self,
        user_id: UserId,
    ) -> Result<Option<String>, SessionStoreError> {
        Ok(self.refresh_tokens.get(&user_id))
    }

    async fn delete_refresh_token(&self, user_id: UserId) -> Result<(), SessionStoreError> {
        self.refresh_tokens.take(&user_id);
        Ok(())
    }

    async fn blacklist_access_token(
        &self,
        token: &str,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        self.revoked.insert(super::blacklist_key(token), user_id, ttl);
        Ok(())
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, SessionStoreError> {
        Ok(self.revoked.get(&super::blacklist_key(token)).is_some())
    }

    async fn store_login_state(
        &self,
        state: &str,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        self.login_states.insert(state.to_string(), (), ttl);
        Ok(())
    }

    async fn consume_login_state(&self, state: &str) -> Result<bool, SessionStoreError> {
        Ok(self.login_states.take(&state.to_string()).is_some())
    }
}
