//! Runtime configuration.
//!
//! Every setting is read from the environment exactly once at startup and
//! handed to the router state as a value. Nothing reads `std::env` after
//! boot.

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_env: String,
    pub bind: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub cors_allowed_origins: Vec<String>,
    pub data_folder: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "changeme".to_string());

        if app_env == "production" && jwt_secret == "changeme" {
            bail!("JWT_SECRET must be set in production");
        }

        let origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Settings {
            app_env,
            bind: std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL env var missing")?,
            jwt_secret,
            access_token_expire_minutes: std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            cors_allowed_origins: origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            data_folder: std::env::var("DATA_FOLDER").unwrap_or_else(|_| "data".to_string()),
        })
    }
}
