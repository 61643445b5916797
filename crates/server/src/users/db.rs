use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, SqlErr,
};
use std::sync::Arc;
use time::OffsetDateTime;

use super::{NewUser, User, UserStore};
use crate::entity::user;
use crate::error::UserStoreError;

/// `UserStore` backed by the `users` table through SeaORM.
#[derive(Clone, Debug)]
pub struct DbUserStore {
    db: Arc<DatabaseConnection>,
}

impl DbUserStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn map_insert_error(err: DbErr) -> UserStoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            if detail.contains("provider") {
                UserStoreError::Duplicate("provider identity".into())
            } else {
                UserStoreError::Duplicate("email".into())
            }
        }
        _ => UserStoreError::Database(err),
    }
}

#[async_trait]
impl UserStore for DbUserStore {
    #[tracing::instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        let found = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await?;
        Ok(found.map(User::from))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_provider(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<User>, UserStoreError> {
        let found = user::Entity::find()
            .filter(user::Column::Provider.eq(provider))
            .filter(user::Column::ProviderId.eq(provider_id))
            .one(self.db.as_ref())
            .await?;
        Ok(found.map(User::from))
    }

    #[tracing::instrument(skip(self, new_user), fields(email = %new_user.email))]
    async fn create(&self, new_user: NewUser) -> Result<User, UserStoreError> {
        let (provider, provider_id) = match new_user.provider {
            Some(link) => (Some(link.provider), Some(link.provider_id)),
            None => (None, None),
        };
        let model = user::ActiveModel {
            email: Set(new_user.email),
            password: Set(new_user.password_hash),
            name: Set(new_user.name),
            provider: Set(provider),
            provider_id: Set(provider_id),
            created_at: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        };

        let inserted = model.insert(self.db.as_ref()).await.map_err(map_insert_error)?;
        tracing::info!(user_id = inserted.id, "created user");
        Ok(inserted.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::ProviderLink;
    use sea_orm::{ConnectionTrait, Database, DbBackend, Statement};

    async fn setup_test_db() -> Arc<DatabaseConnection> {
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
        Arc::new(db)
    }

    fn password_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Test User".to_string(),
            password_hash: Some("$argon2id$fake".to_string()),
            provider: None,
        }
    }

    #[tokio::test]
    async fn create_then_find_by_email() {
        let store = DbUserStore::new(setup_test_db().await);

        let created = store.create(password_user("a@x.com")).await.unwrap();
        assert!(created.id > 0);

        let found = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(store.find_by_email("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let store = DbUserStore::new(setup_test_db().await);
        store.create(password_user("a@x.com")).await.unwrap();

        let err = store.create(password_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, UserStoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn find_by_provider_identity() {
        let store = DbUserStore::new(setup_test_db().await);
        let created = store
            .create(NewUser {
                email: "g@gmail.com".into(),
                name: "G".into(),
                password_hash: None,
                provider: Some(ProviderLink {
                    provider: "google".into(),
                    provider_id: "1234".into(),
                }),
            })
            .await
            .unwrap();

        let found = store
            .find_by_provider("google", "1234")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert!(found.password_hash.is_none());
        assert!(
            store
                .find_by_provider("google", "9999")
                .await
                .unwrap()
                .is_none()
        );
    }
}
