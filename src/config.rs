use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Shared secret the fronting auth gateway presents on every request.
    pub gateway_token: String,
    /// Email relay endpoint; empty means notifications are only logged.
    pub email_relay_url: String,
    pub email_relay_token: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "booking.db".to_string()),
            gateway_token: env::var("GATEWAY_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            email_relay_url: env::var("EMAIL_RELAY_URL").unwrap_or_default(),
            email_relay_token: env::var("EMAIL_RELAY_TOKEN").unwrap_or_default(),
        }
    }
}
