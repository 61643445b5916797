//! Persistent identities, consulted by the session manager.
//!
//! The manager only needs lookups by email and by provider identity plus a
//! create; anything else about users lives outside this service.

mod db;

pub use db::DbUserStore;

use async_trait::async_trait;

use crate::entity::user;
use crate::error::UserStoreError;

/// Subject identifier carried in access tokens.
pub type UserId = i64;

/// Provider name stored on identities created by a Google login.
pub const GOOGLE_PROVIDER: &str = "google";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            password_hash: model.password,
            provider: model.provider,
            provider_id: model.provider_id,
        }
    }
}

/// Link between a local identity and the provider account it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLink {
    pub provider: String,
    pub provider_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub provider: Option<ProviderLink>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError>;

    async fn find_by_provider(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<User>, UserStoreError>;

    /// Persist a new identity. Returns `UserStoreError::Duplicate` when the
    /// email or provider identity is already taken.
    async fn create(&self, new_user: NewUser) -> Result<User, UserStoreError>;
}
