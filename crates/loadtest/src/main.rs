use goose::prelude::*;
use goose::goose::GooseResponse;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};

const PASSWORD: &str = "load-test-password";

static NEXT_USER: AtomicUsize = AtomicUsize::new(0);

/// Per-user credentials and the tokens of the current session.
struct Session {
    email: String,
    access_token: String,
    refresh_token: String,
}

/// Pull `data.access_token` / `data.refresh_token` out of a login-like response.
async fn read_tokens(goose: GooseResponse) -> Option<(String, String)> {
    let body: Value = goose.response.ok()?.json().await.ok()?;
    let data = body.get("data")?;
    Some((
        data.get("access_token")?.as_str()?.to_string(),
        data.get("refresh_token")?.as_str()?.to_string(),
    ))
}

async fn register(user: &mut GooseUser) -> TransactionResult {
    let email = format!(
        "load-{}-{}@example.test",
        std::process::id(),
        NEXT_USER.fetch_add(1, Ordering::Relaxed)
    );
    let body = json!({"email": email, "password": PASSWORD, "name": "Load Test"});
    let goose = user.post_json("/api/auth/register", &body).await?;

    if let Some((access_token, refresh_token)) = read_tokens(goose).await {
        user.set_session_data(Session {
            email,
            access_token,
            refresh_token,
        });
    }
    Ok(())
}

async fn login(user: &mut GooseUser) -> TransactionResult {
    let Some(email) = user.get_session_data::<Session>().map(|s| s.email.clone()) else {
        return Ok(());
    };
    let body = json!({"email": email, "password": PASSWORD});
    let goose = user.post_json("/api/auth/login", &body).await?;

    if let Some((access_token, refresh_token)) = read_tokens(goose).await {
        user.set_session_data(Session {
            email,
            access_token,
            refresh_token,
        });
    }
    Ok(())
}

async fn refresh(user: &mut GooseUser) -> TransactionResult {
    let Some((access, refresh)) = user
        .get_session_data::<Session>()
        .map(|s| (s.access_token.clone(), s.refresh_token.clone()))
    else {
        return Ok(());
    };

    let request_builder = user
        .get_request_builder(&GooseMethod::Post, "/api/auth/refresh")?
        .bearer_auth(access)
        .json(&json!({"refresh_token": refresh}));
    let goose_request = GooseRequest::builder()
        .set_request_builder(request_builder)
        .build();
    let _goose_metrics = user.request(goose_request).await?;
    Ok(())
}

/// Log out, then log straight back in so the next iteration has a session.
async fn logout(user: &mut GooseUser) -> TransactionResult {
    let Some(access) = user
        .get_session_data::<Session>()
        .map(|s| s.access_token.clone())
    else {
        return Ok(());
    };

    let request_builder = user
        .get_request_builder(&GooseMethod::Post, "/api/auth/logout")?
        .bearer_auth(access);
    let goose_request = GooseRequest::builder()
        .set_request_builder(request_builder)
        .build();
    let _goose_metrics = user.request(goose_request).await?;

    login(user).await
}

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    GooseAttack::initialize()?
        .register_scenario(
            scenario!("SessionLifecycle")
                .register_transaction(transaction!(register).set_on_start())
                .register_transaction(transaction!(login).set_weight(2)?)
                .register_transaction(transaction!(refresh).set_weight(5)?)
                .register_transaction(transaction!(logout)),
        )
        .execute()
        .await?;

    Ok(())
}
