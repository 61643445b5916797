//! Session manager flows against the in-memory session store and SQLite.

mod common;

use auth_token_service::error::SessionError;
use auth_token_service::session::SessionStore;
use auth_token_service::token::AccessClaims;
use auth_token_service::users::{DbUserStore, UserStore};
use common::{StoreOp, harness, harness_with_ttl};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use std::time::Duration;
use time::OffsetDateTime;

#[tokio::test]
async fn register_then_login_yields_subject_of_identity() {
    let h = harness().await;
    let registered = h
        .manager
        .register("a@x.com", "hunter2", "Alice")
        .await
        .expect("register");
    let logged_in = h.manager.login("a@x.com", "hunter2").await.expect("login");

    let user = DbUserStore::new(h.db.clone())
        .find_by_email("a@x.com")
        .await
        .unwrap()
        .expect("identity persisted");
    assert!(user.password_hash.as_deref().unwrap().starts_with("$argon2"));

    for token in [&registered.access_token, &logged_in.access_token] {
        let verified = h.codec.verify_access_token(token).unwrap();
        assert_eq!(verified.user_id, user.id);
    }
}

#[tokio::test]
async fn email_is_case_insensitive() {
    let h = harness().await;
    h.manager.register(" Bob@X.com", "pw", "Bob").await.unwrap();
    h.manager.login("bob@x.com", "pw").await.unwrap();
    assert!(matches!(
        h.manager.register("BOB@x.com", "pw", "Bob").await,
        Err(SessionError::AlreadyExists)
    ));
}

#[tokio::test]
async fn duplicate_registration_creates_nothing() {
    let h = harness().await;
    let first = h.manager.register("a@x.com", "one", "A").await.unwrap();
    assert!(matches!(
        h.manager.register("a@x.com", "two", "B").await,
        Err(SessionError::AlreadyExists)
    ));

    // The original password still works and the original refresh token is
    // still the stored one.
    let user_id = h.codec.verify_access_token(&first.access_token).unwrap().user_id;
    assert_eq!(
        h.store.get_refresh_token(user_id).await.unwrap().as_deref(),
        Some(first.refresh_token.as_str())
    );
    assert!(h.manager.login("a@x.com", "two").await.is_err());
}

#[tokio::test]
async fn login_errors_distinguish_unknown_and_wrong_password() {
    let h = harness().await;
    h.manager.register("a@x.com", "right", "A").await.unwrap();

    assert!(matches!(
        h.manager.login("nobody@x.com", "right").await,
        Err(SessionError::NotFound)
    ));
    assert!(matches!(
        h.manager.login("a@x.com", "wrong").await,
        Err(SessionError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn second_login_invalidates_first_refresh_token() {
    let h = harness().await;
    h.manager.register("a@x.com", "pw", "A").await.unwrap();
    let first = h.manager.login("a@x.com", "pw").await.unwrap();
    let second = h.manager.login("a@x.com", "pw").await.unwrap();
    let user_id = h.codec.verify_access_token(&second.access_token).unwrap().user_id;

    assert!(matches!(
        h.manager.refresh(user_id, &first.refresh_token).await,
        Err(SessionError::Mismatch)
    ));
    assert!(h.manager.refresh(user_id, &second.refresh_token).await.is_ok());
}

#[tokio::test]
async fn refresh_issues_token_for_same_subject_without_rotation() {
    let h = harness().await;
    let pair = h.manager.register("a@x.com", "pw", "A").await.unwrap();
    let user_id = h.codec.verify_access_token(&pair.access_token).unwrap().user_id;

    let renewed = h.manager.refresh(user_id, &pair.refresh_token).await.unwrap();
    assert_eq!(h.codec.verify_access_token(&renewed).unwrap().user_id, user_id);

    // Not rotated: the same refresh token keeps working.
    h.manager.refresh(user_id, &pair.refresh_token).await.unwrap();
}

#[tokio::test]
async fn refresh_without_stored_token_is_expired() {
    let h = harness().await;
    assert!(matches!(
        h.manager.refresh(404, "anything").await,
        Err(SessionError::Expired)
    ));
}

#[tokio::test]
async fn logout_revokes_token_and_refresh() {
    let h = harness().await;
    let pair = h.manager.register("a@x.com", "pw", "A").await.unwrap();
    let user_id = h.codec.verify_access_token(&pair.access_token).unwrap().user_id;

    h.manager.logout(user_id, &pair.access_token).await.unwrap();

    // Signature and expiry are still fine, only the blacklist says otherwise.
    assert!(h.codec.verify_access_token(&pair.access_token).is_ok());
    assert!(h.store.is_blacklisted(&pair.access_token).await.unwrap());
    assert!(matches!(
        h.manager.refresh(user_id, &pair.refresh_token).await,
        Err(SessionError::Expired)
    ));
}

#[tokio::test]
async fn logout_with_expired_token_falls_back_to_configured_ttl() {
    let h = harness_with_ttl(Duration::from_secs(60)).await;
    let pair = h.manager.register("a@x.com", "pw", "A").await.unwrap();
    let user_id = h.codec.verify_access_token(&pair.access_token).unwrap().user_id;

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let stale = encode(
        &Header::new(Algorithm::HS256),
        &AccessClaims {
            user_id,
            iat: now - 120,
            exp: now - 60,
        },
        &EncodingKey::from_secret(common::SECRET),
    )
    .unwrap();

    h.manager.logout(user_id, &stale).await.unwrap();
    assert!(h.store.is_blacklisted(&stale).await.unwrap());
    assert_eq!(h.store.get_refresh_token(user_id).await.unwrap(), None);
}

#[tokio::test]
async fn federated_login_creates_identity_once() {
    let h = harness().await;
    let (first, user) = h.manager.federated_login("good-code").await.unwrap();
    assert_eq!(user.email, "jane@example.com");
    assert_eq!(user.name, "Jane");

    let (second, _) = h.manager.federated_login("good-code").await.unwrap();
    let a = h.codec.verify_access_token(&first.access_token).unwrap();
    let b = h.codec.verify_access_token(&second.access_token).unwrap();
    assert_eq!(a.user_id, b.user_id);

    let stored = DbUserStore::new(h.db.clone())
        .find_by_provider("google", "google-123")
        .await
        .unwrap()
        .expect("linked identity");
    assert_eq!(stored.password_hash, None);
    assert_eq!(h.provider.calls(), 2);
}

#[tokio::test]
async fn federated_login_with_taken_email_conflicts() {
    let h = harness().await;
    h.manager
        .register("jane@example.com", "pw", "Jane")
        .await
        .unwrap();
    assert!(matches!(
        h.manager.federated_login("good-code").await,
        Err(SessionError::AlreadyExists)
    ));
}

#[tokio::test]
async fn rejected_code_surfaces_federation_error() {
    let h = harness().await;
    assert!(matches!(
        h.manager.federated_login("bad-code").await,
        Err(SessionError::Federation(_))
    ));
}

#[tokio::test]
async fn refresh_lookup_failure_counts_as_expired() {
    let h = harness().await;
    let pair = h.manager.register("a@x.com", "pw", "A").await.unwrap();
    let user_id = h.codec.verify_access_token(&pair.access_token).unwrap().user_id;

    h.store.fail(StoreOp::GetRefresh);
    assert!(matches!(
        h.manager.refresh(user_id, &pair.refresh_token).await,
        Err(SessionError::Expired)
    ));
}

#[tokio::test]
async fn logout_fails_when_revocation_cannot_be_written() {
    let h = harness().await;
    let pair = h.manager.register("a@x.com", "pw", "A").await.unwrap();
    let user_id = h.codec.verify_access_token(&pair.access_token).unwrap().user_id;

    h.store.fail(StoreOp::Blacklist);
    assert!(matches!(
        h.manager.logout(user_id, &pair.access_token).await,
        Err(SessionError::LogoutFailed(_))
    ));

    // Nothing after the failed write ran.
    h.store.heal();
    assert!(!h.store.is_blacklisted(&pair.access_token).await.unwrap());
    assert_eq!(
        h.store.get_refresh_token(user_id).await.unwrap().as_deref(),
        Some(pair.refresh_token.as_str())
    );
}

#[tokio::test]
async fn logout_fails_when_refresh_cannot_be_deleted() {
    let h = harness().await;
    let pair = h.manager.register("a@x.com", "pw", "A").await.unwrap();
    let user_id = h.codec.verify_access_token(&pair.access_token).unwrap().user_id;

    h.store.fail(StoreOp::DeleteRefresh);
    assert!(matches!(
        h.manager.logout(user_id, &pair.access_token).await,
        Err(SessionError::LogoutFailed(_))
    ));

    // Not transactional: the revocation stays, the refresh token dangles.
    h.store.heal();
    assert!(h.store.is_blacklisted(&pair.access_token).await.unwrap());
    assert_eq!(
        h.store.get_refresh_token(user_id).await.unwrap().as_deref(),
        Some(pair.refresh_token.as_str())
    );
}
