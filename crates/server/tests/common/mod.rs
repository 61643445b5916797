//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use auth_token_service::error::{FederationError, SessionStoreError};
use auth_token_service::federation::{IdentityProvider, ProviderProfile};
use auth_token_service::manager::SessionManager;
use auth_token_service::session::{MemorySessionStore, SessionStore};
use auth_token_service::token::TokenCodec;
use auth_token_service::users::{DbUserStore, UserId};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECRET: &[u8] = b"integration-test-secret-0123456789";

/// Create an in-memory SQLite database with the `users` table.
pub async fn create_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password TEXT NULL,
            name TEXT NOT NULL,
            provider TEXT NULL,
            provider_id TEXT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(provider, provider_id)
        );"#,
    ))
    .await
    .expect("create users table");
    db
}

/// Session store operations that [`FaultyStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    SetRefresh,
    GetRefresh,
    DeleteRefresh,
    Blacklist,
    IsBlacklisted,
    StoreState,
    ConsumeState,
}

/// In-memory session store whose operations can be switched to fail.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemorySessionStore,
    failing: Mutex<HashSet<StoreOp>>,
}

impl FaultyStore {
    pub fn fail(&self, op: StoreOp) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn check(&self, op: StoreOp) -> Result<(), SessionStoreError> {
        if self.failing.lock().unwrap().contains(&op) {
            return Err(SessionStoreError::Unavailable(format!("{op:?} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FaultyStore {
    async fn set_refresh_token(
        &self,
        user_id: UserId,
        token: &str,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        self.check(StoreOp::SetRefresh)?;
        self.inner.set_refresh_token(user_id, token, ttl).await
    }

    async fn get_refresh_token(
        &self,
        user_id: UserId,
    ) -> Result<Option<String>, SessionStoreError> {
        self.check(StoreOp::GetRefresh)?;
        self.inner.get_refresh_token(user_id).await
    }

    async fn delete_refresh_token(&self, user_id: UserId) -> Result<(), SessionStoreError> {
        self.check(StoreOp::DeleteRefresh)?;
        self.inner.delete_refresh_token(user_id).await
    }

    async fn blacklist_access_token(
        &self,
        token: &str,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        self.check(StoreOp::Blacklist)?;
        self.inner.blacklist_access_token(token, user_id, ttl).await
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, SessionStoreError> {
        self.check(StoreOp::IsBlacklisted)?;
        self.inner.is_blacklisted(token).await
    }

    async fn store_login_state(
        &self,
        state: &str,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        self.check(StoreOp::StoreState)?;
        self.inner.store_login_state(state, ttl).await
    }

    async fn consume_login_state(&self, state: &str) -> Result<bool, SessionStoreError> {
        self.check(StoreOp::ConsumeState)?;
        self.inner.consume_login_state(state).await
    }
}

/// Identity provider double returning a fixed profile and counting calls.
pub struct FakeProvider {
    pub profile: ProviderProfile,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            profile: ProviderProfile {
                provider_id: "google-123".into(),
                email: "jane@example.com".into(),
                name: "Jane".into(),
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.example.test/auth?client_id=test&state={state}")
    }

    async fn exchange_and_fetch_profile(
        &self,
        code: &str,
    ) -> Result<ProviderProfile, FederationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if code == "bad-code" {
            return Err(FederationError::ExchangeFailed {
                status: hyper::StatusCode::BAD_REQUEST,
            });
        }
        Ok(self.profile.clone())
    }
}

pub struct Harness {
    pub manager: SessionManager,
    pub store: Arc<FaultyStore>,
    pub provider: Arc<FakeProvider>,
    pub codec: Arc<TokenCodec>,
    pub db: Arc<DatabaseConnection>,
}

pub async fn harness_with_ttl(ttl: Duration) -> Harness {
    let db = Arc::new(create_test_db().await);
    let store = Arc::new(FaultyStore::default());
    let provider = Arc::new(FakeProvider::new());
    let codec = Arc::new(TokenCodec::new(SECRET, ttl));
    let manager = SessionManager::new(
        Arc::new(DbUserStore::new(db.clone())),
        store.clone() as Arc<dyn SessionStore>,
        codec.clone(),
        provider.clone(),
    );
    Harness {
        manager,
        store,
        provider,
        codec,
        db,
    }
}

pub async fn harness() -> Harness {
    harness_with_ttl(Duration::from_secs(3600)).await
}
