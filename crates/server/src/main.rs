use auth_token_service::api::{AppState, start_webserver};
use auth_token_service::config::{SessionBackend, load_config_or_panic};
use auth_token_service::federation::GoogleProvider;
use auth_token_service::manager::SessionManager;
use auth_token_service::session::{MemorySessionStore, RedisSessionStore, SessionStore};
use auth_token_service::token::TokenCodec;
use auth_token_service::users::DbUserStore;
use color_eyre::eyre::WrapErr;
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "auth_token_service=info,tower_http=info,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    // A missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();
    initialize_tracing();

    let config = load_config_or_panic();

    let ring_provider = crypto::ring::default_provider();
    if CryptoProvider::install_default(ring_provider).is_err() {
        tracing::warn!("a rustls crypto provider was already installed");
    }

    let db = Arc::new(
        Database::connect(config.database_url()?)
            .await
            .wrap_err("Failed to connect to database")?,
    );

    let store: Arc<dyn SessionStore> = match config.session_backend {
        SessionBackend::Redis => Arc::new(
            RedisSessionStore::connect(&config.redis_url())
                .await
                .wrap_err("Failed to connect to redis")?,
        ),
        SessionBackend::Memory => {
            tracing::warn!("using in-memory session store; sessions are lost on restart");
            Arc::new(MemorySessionStore::new())
        }
    };

    let codec = Arc::new(TokenCodec::new(
        config.jwt_secret.as_bytes(),
        config.token_ttl(),
    ));
    let provider = Arc::new(
        GoogleProvider::new(config.google()).wrap_err("Failed to set up Google client")?,
    );
    let sessions = SessionManager::new(Arc::new(DbUserStore::new(db)), store, codec, provider);

    tracing::info!(
        port = config.port,
        token_ttl = ?config.token_ttl(),
        backend = ?config.session_backend,
        "starting auth token service"
    );
    start_webserver(AppState::new(sessions), config.port).await
}
