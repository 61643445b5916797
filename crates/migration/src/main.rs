use config::Config;
use sea_orm_migration::prelude::*;
use std::env;

/// Assemble a Postgres URL from the `DB_*` variables the server also accepts.
fn url_from_parts() -> Option<String> {
    let host = env::var("DB_HOST").ok()?;
    let name = env::var("DB_NAME").ok()?;
    let user = env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
    let port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let credentials = match env::var("DB_PASSWORD") {
        Ok(password) if !password.is_empty() => format!("{user}:{password}"),
        _ => user,
    };
    Some(format!("postgres://{credentials}@{host}:{port}/{name}"))
}

#[tokio::main]
async fn main() {
    // Try to get DB URL from CLI arg or env first
    if env::var("DATABASE_URL").is_err() {
        let from_file = Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .build()
            .ok()
            .and_then(|settings| settings.get_string("database_url").ok());
        if let Some(url) = from_file.or_else(url_from_parts) {
            env::set_var("DATABASE_URL", url);
        }
    }
    cli::run_cli(migration::Migrator).await;
}
