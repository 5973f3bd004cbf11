use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use companion_booking::config::AppConfig;
use companion_booking::db;
use companion_booking::handlers;
use companion_booking::services::notify::email::EmailRelayNotifier;
use companion_booking::services::notify::{LogNotifier, Notifier};
use companion_booking::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let notifier: Arc<dyn Notifier> = if config.email_relay_url.is_empty() {
        tracing::info!("EMAIL_RELAY_URL not set, notifications will only be logged");
        Arc::new(LogNotifier)
    } else {
        tracing::info!("using email relay at {}", config.email_relay_url);
        Arc::new(EmailRelayNotifier::new(
            config.email_relay_url.clone(),
            config.email_relay_token.clone(),
        ))
    };

    if config.gateway_token == "changeme" {
        tracing::warn!("GATEWAY_TOKEN is the default value, set it before exposing the service");
    }

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier,
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
