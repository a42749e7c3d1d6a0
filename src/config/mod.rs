//! Typed configuration.
//!
//! Connection settings and secrets come from environment variables, loaded
//! once at startup and failing fast if required vars are missing. Sensitive
//! values are wrapped in secrecy::SecretString to prevent log leaks.
//!
//! Queue and broadcast tuning lives in an optional TOML file
//! (`JOINQ_SETTINGS`), see [`Settings`].

pub mod secrets;
pub mod settings;

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::transport::telegram::DEFAULT_API_URL;
use secrecy::SecretString;

pub use settings::Settings;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub bot_token: SecretString,
    pub api_url: String,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub settings_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// In production, systemd EnvironmentFile provides the vars.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            bot_token: SecretString::from(required_var("BOT_TOKEN")?),
            api_url: std::env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            settings_path: std::env::var_os("JOINQ_SETTINGS").map(PathBuf::from),
        })
    }

    /// Tuning settings: the TOML file if one is configured, defaults otherwise.
    pub fn settings(&self) -> Result<Settings> {
        match self.settings_path {
            Some(ref path) => Settings::load(path),
            None => Ok(Settings::default()),
        }
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}
