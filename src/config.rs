//! Server configuration from environment variables

use std::env;

use crate::error::{AppError, Result};

/// Sweeps more frequent than this are refused; the sweeper is a bulk
/// UPDATE and date-granular, nothing is gained below a minute.
pub const MIN_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub files_dir: String,
    pub download_url_secret: String,
    pub sweep_interval_secs: u64,
    pub bootstrap_admin_username: Option<String>,
    pub env: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| AppError::Internal("PORT must be a valid port number".to_string()))?;
        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "keygate.db".to_string());
        let files_dir = env::var("FILES_DIR").unwrap_or_else(|_| "files".to_string());
        let download_url_secret = env::var("DOWNLOAD_URL_SECRET")
            .map_err(|_| AppError::Internal("DOWNLOAD_URL_SECRET must be set".to_string()))?;
        if download_url_secret.len() < 16 {
            return Err(AppError::Internal(
                "DOWNLOAD_URL_SECRET must be at least 16 characters".to_string(),
            ));
        }

        let sweep_interval_secs = env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS)
            .max(MIN_SWEEP_INTERVAL_SECS);

        let bootstrap_admin_username = env::var("BOOTSTRAP_ADMIN_USERNAME")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let env_name = env::var("KEYGATE_ENV").unwrap_or_else(|_| "production".to_string());

        Ok(Config {
            host,
            port,
            database_path,
            files_dir,
            download_url_secret,
            sweep_interval_secs,
            bootstrap_admin_username,
            env: env_name,
        })
    }

    pub fn is_dev(&self) -> bool {
        self.env == "dev" || self.env == "development"
    }
}
