use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    /// Secure attribute on the session cookie; enabled for production.
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:data/notes.db?mode=rwc".into());
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")?,
            secure_cookies: std::env::var("APP_ENV")
                .map(|v| v == "production")
                .unwrap_or(false),
        };
        Ok(Self {
            database_url,
            session,
        })
    }
}
