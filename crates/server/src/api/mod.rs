//! HTTP surface of the service.
//!
//! - `auth` - authentication endpoints (/api/auth/*)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod auth;
pub mod openapi;

pub use auth::AUTH_TAG;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_redoc::{Redoc, Servable};

use crate::guard::AccessGuard;
use crate::manager::SessionManager;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub guard: AccessGuard,
}

impl AppState {
    pub fn new(sessions: SessionManager) -> Self {
        let guard = AccessGuard::new(sessions.store().clone(), sessions.codec().clone());
        Self {
            sessions: Arc::new(sessions),
            guard,
        }
    }
}

/// Full application router including the Redoc page at `/api-docs`.
pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/api/auth", auth::router(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server on `0.0.0.0:{port}`.
#[tracing::instrument(skip(state))]
pub async fn start_webserver(state: AppState, port: u16) -> color_eyre::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server running");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
