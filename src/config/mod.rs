//! Configuration management for Quotebox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! Secrets (`HCAPTCHA_SECRET`, `EMAIL_USER`, `EMAIL_PASS`, `EMAIL_TO`) are only
//! ever read from the environment.
//!
//! # Usage
//!
//! ```no_run
//! use quotebox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `QUOTEBOX__<section>__<key>`
//!
//! Examples:
//! - `QUOTEBOX__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `QUOTEBOX__MAIL__PROVIDER=smtp`
//! - `QUOTEBOX__CAPTCHA__TIMEOUT_SECS=5`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/quotebox.toml`.
//! This can be overridden using the `QUOTEBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    ApiLimits, CaptchaConfig, ClientConfig, Config, MailConfig, MailProvider, ServerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment + secrets)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation
    /// fails (SMTP without credentials, bad URLs, zero limits).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, without environment secrets
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
