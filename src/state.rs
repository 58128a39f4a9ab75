use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        ensure_parent_dir(&config.database_url)?;

        let db = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run database migrations")?;

        Ok(Self { db, config })
    }

    #[cfg(test)]
    pub async fn test() -> Self {
        use crate::config::SessionConfig;

        // Each in-memory connection is its own database, so keep the pool at one.
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory sqlite");
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .expect("apply migrations");

        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            session: SessionConfig {
                secret: "test-session-secret".into(),
                secure_cookies: false,
            },
        });

        Self { db, config }
    }
}

/// The default store lives in a file under `data/`; create the directory on
/// first start so the sqlite driver can create the database itself.
fn ensure_parent_dir(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = database_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.starts_with(':') {
        return Ok(());
    }
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).context("create database directory")?;
        }
    }
    Ok(())
}
