use std::fs;
use tracing::{debug, error, info};

use crate::types::server_config::{AppConfig, ConfigError};

/// A week. Anything longer defeats the point of asking for a recent sign-in.
const MAX_REAUTH_WINDOW_MINUTES: u64 = 7 * 24 * 60;
/// A leap year.
const MAX_SESSION_LIFETIME_HOURS: u64 = 366 * 24;

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    parse_config(&contents)
}

/// Parse and validate a config document already in memory.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(contents)?;

    info!("Configuration loaded successfully");

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.database.path.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "database.path cannot be empty".into(),
        ));
    }

    let auth = &config.auth;

    if auth.reauth_window_minutes == 0 {
        return Err(ConfigError::InvalidConfig(
            "reauth_window_minutes must be greater than 0".into(),
        ));
    }

    if auth.session_lifetime_hours == 0 {
        return Err(ConfigError::InvalidConfig(
            "session_lifetime_hours must be greater than 0".into(),
        ));
    }

    if auth.reauth_window_minutes > MAX_REAUTH_WINDOW_MINUTES {
        return Err(ConfigError::InvalidConfig(format!(
            "reauth_window_minutes cannot exceed {}",
            MAX_REAUTH_WINDOW_MINUTES
        )));
    }

    if auth.session_lifetime_hours > MAX_SESSION_LIFETIME_HOURS {
        return Err(ConfigError::InvalidConfig(format!(
            "session_lifetime_hours cannot exceed {}",
            MAX_SESSION_LIFETIME_HOURS
        )));
    }

    if auth.provider_timeout_ms == 0 || auth.store_timeout_ms == 0 {
        return Err(ConfigError::InvalidConfig(
            "provider_timeout_ms and store_timeout_ms must be greater than 0".into(),
        ));
    }

    if auth.cookie_name.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "cookie_name cannot be empty".into(),
        ));
    }

    // Checked here so a bad secret is rejected at start-up rather than at the
    // first sign-in.
    match auth.resolved_session_secret() {
        None => {
            return Err(ConfigError::InvalidConfig(
                "session_secret must be set via the SESSION_SECRET env var or auth.session_secret config field"
                    .into(),
            ));
        }
        Some(secret) if secret.len() < 32 => {
            return Err(ConfigError::InvalidConfig(
                "session_secret must be at least 32 characters long".into(),
            ));
        }
        _ => {}
    }

    let identity = &config.identity;

    if identity.issuer.trim().is_empty() || identity.audience.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "identity.issuer and identity.audience are required".into(),
        ));
    }

    match (identity.resolved_hmac_secret(), identity.public_key_path()) {
        (None, None) => Err(ConfigError::InvalidConfig(
            "identity needs either hmac_secret (IDENTITY_HMAC_SECRET) or public_key_pem".into(),
        )),
        (Some(_), Some(_)) => Err(ConfigError::InvalidConfig(
            "identity.hmac_secret and identity.public_key_pem are mutually exclusive".into(),
        )),
        _ => Ok(()),
    }
}
