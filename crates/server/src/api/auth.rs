//! Authentication endpoints mounted under `/api/auth`:
//! - `/register`, `/login` - password accounts
//! - `/login/google`, `/login/google/callback` - OAuth2 authorization-code flow
//! - `/logout`, `/refresh` - bearer-protected session maintenance

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    response::Redirect,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::AppState;
use crate::error::ApiError;
use crate::guard::Authenticated;
use crate::response::{ApiResponse, FederatedLogin, RefreshedToken, TokenPair};

/// Tag for OpenAPI documentation.
pub const AUTH_TAG: &str = "Authentication";

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Authorization code issued by the provider.
    code: Option<String>,
    /// Nonce handed out by `/login/google`.
    state: Option<String>,
}

pub fn router(state: AppState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(register))
        .routes(routes!(login))
        .routes(routes!(google_login))
        .routes(routes!(google_callback))
        .routes(routes!(logout))
        .routes(routes!(refresh))
        .with_state(state)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::Validation(e.body_text()))
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_email(email: &str) -> Result<(), ApiError> {
    require("email", email)?;
    if !email.contains('@') {
        return Err(ApiError::Validation("email is invalid".into()));
    }
    Ok(())
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/register",
    operation_id = "Register",
    tag = AUTH_TAG,
    summary = "Create a password account",
    description = "Creates an account and starts a session for it. The returned access token \
                   is a short-lived JWT; the refresh token can be traded for new access tokens \
                   at `/api/auth/refresh`.",
    request_body(content = RegisterRequest, description = "Account details"),
    responses(
        (status = 200, description = "Account created", content_type = "application/json",
            example = json!({"error": false, "code": 200, "message": "Registration successful",
                "data": {"access_token": "eyJ...", "refresh_token": "q1n..."}})),
        (status = 400, description = "Invalid request body", content_type = "application/json"),
        (status = 409, description = "Email already registered", content_type = "application/json"),
        (status = 500, description = "Internal server error", content_type = "application/json")
    )
)]
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiResponse<TokenPair>, ApiError> {
    let body = json_body(payload)?;
    require_email(&body.email)?;
    require("password", &body.password)?;
    require("name", &body.name)?;

    let pair = state
        .sessions
        .register(&body.email, &body.password, body.name.trim())
        .await?;
    Ok(ApiResponse::success("Registration successful", pair))
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/login",
    operation_id = "Login",
    tag = AUTH_TAG,
    summary = "Log in with email and password",
    description = "Starts a new session. Any refresh token issued earlier for the account \
                   stops working.",
    request_body(content = LoginRequest, description = "Credentials"),
    responses(
        (status = 200, description = "Logged in", content_type = "application/json",
            example = json!({"error": false, "code": 200, "message": "Login successful",
                "data": {"access_token": "eyJ...", "refresh_token": "q1n..."}})),
        (status = 400, description = "Invalid request body", content_type = "application/json"),
        (status = 401, description = "Invalid credentials", content_type = "application/json")
    )
)]
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ApiResponse<TokenPair>, ApiError> {
    let body = json_body(payload)?;
    require_email(&body.email)?;
    require("password", &body.password)?;

    let pair = state.sessions.login(&body.email, &body.password).await?;
    Ok(ApiResponse::success("Login successful", pair))
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/login/google",
    operation_id = "Google Login",
    tag = AUTH_TAG,
    summary = "Start a Google login",
    description = "Redirects the browser to Google's consent page with a single-use `state` nonce.",
    responses(
        (status = 307, description = "Redirect to Google"),
        (status = 500, description = "Internal server error", content_type = "application/json")
    )
)]
async fn google_login(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let url = state.sessions.begin_federated_login().await?;
    Ok(Redirect::temporary(&url))
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/login/google/callback",
    operation_id = "Google Callback",
    tag = AUTH_TAG,
    summary = "Complete a Google login",
    description = "Checks the `state` nonce, exchanges the authorization code with Google and \
                   starts a session for the linked account, creating it on first login.",
    params(CallbackParams),
    responses(
        (status = 200, description = "Logged in", content_type = "application/json",
            example = json!({"error": false, "code": 200, "message": "Login successful",
                "data": {"access_token": "eyJ...", "refresh_token": "q1n...",
                    "user": {"email": "jane@example.com", "name": "Jane"}}})),
        (status = 400, description = "Invalid state or missing code", content_type = "application/json"),
        (status = 401, description = "Authorization code rejected", content_type = "application/json"),
        (status = 502, description = "Google request failed", content_type = "application/json")
    )
)]
async fn google_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<ApiResponse<FederatedLogin>, ApiError> {
    // State first: a forged callback must never reach the provider.
    state
        .sessions
        .verify_login_state(params.state.as_deref().unwrap_or_default())
        .await?;

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing authorization code".into()))?;

    let (pair, user) = state.sessions.federated_login(&code).await?;
    Ok(ApiResponse::success(
        "Login successful",
        FederatedLogin {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user,
        },
    ))
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/logout",
    operation_id = "Logout",
    tag = AUTH_TAG,
    summary = "End the current session",
    description = "Revokes the presented access token for the rest of its lifetime and \
                   discards the account's refresh token.",
    responses(
        (status = 200, description = "Logged out", content_type = "application/json",
            example = json!({"error": false, "code": 200, "message": "Logout successful"})),
        (status = 401, description = "Missing, invalid or revoked token", content_type = "application/json"),
        (status = 500, description = "Logout failed", content_type = "application/json")
    ),
    security(("Authorization" = []))
)]
async fn logout(
    State(state): State<AppState>,
    Authenticated(subject): Authenticated,
) -> Result<ApiResponse<()>, ApiError> {
    state
        .sessions
        .logout(subject.user_id, &subject.access_token)
        .await?;
    Ok(ApiResponse::empty("Logout successful"))
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/refresh",
    operation_id = "Refresh",
    tag = AUTH_TAG,
    summary = "Get a new access token",
    description = "Trades the refresh token of the current session for a new access token. \
                   The refresh token is not rotated.",
    request_body(content = RefreshRequest, description = "Refresh token from login"),
    responses(
        (status = 200, description = "New access token", content_type = "application/json",
            example = json!({"error": false, "code": 200, "message": "Token refreshed successfully",
                "data": {"token": "eyJ..."}})),
        (status = 400, description = "Invalid request body", content_type = "application/json"),
        (status = 401, description = "Invalid or expired refresh token", content_type = "application/json")
    ),
    security(("Authorization" = []))
)]
async fn refresh(
    State(state): State<AppState>,
    Authenticated(subject): Authenticated,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<ApiResponse<RefreshedToken>, ApiError> {
    let body = json_body(payload)?;
    require("refresh_token", &body.refresh_token)?;

    let token = state
        .sessions
        .refresh(subject.user_id, &body.refresh_token)
        .await?;
    Ok(ApiResponse::success(
        "Token refreshed successfully",
        RefreshedToken { token },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_needs_at_sign() {
        assert!(require_email("a@x.com").is_ok());
        assert!(matches!(require_email("ax.com"), Err(ApiError::Validation(_))));
        assert!(matches!(require_email("  "), Err(ApiError::Validation(_))));
    }
}
