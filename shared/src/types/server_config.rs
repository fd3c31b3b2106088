use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite file holding posts and revocation markers.
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Oldest sign-in (by the identity token's `auth_time`) that may still
    /// be exchanged for a session.
    #[serde(default = "default_reauth_window")]
    pub reauth_window_minutes: u64,

    /// Absolute session lifetime, also used as the cookie `Max-Age`.
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime_hours: u64,

    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    #[serde(default)]
    pub cookie_secure: bool,

    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_ms: u64,

    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// HMAC key used to sign and verify session credentials.
    ///
    /// Prefer loading this via the `SESSION_SECRET` environment variable.
    /// Rotating it invalidates every outstanding session.
    ///
    /// **Minimum length:** 32 characters.
    pub session_secret: Option<String>,
}

/// Where identity tokens come from and how to check their signature.
///
/// Exactly one of `hmac_secret` (HS256) or `public_key_pem` (RS256, path to
/// a PEM file) must be resolvable.
#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    pub issuer: String,
    pub audience: String,
    pub hmac_secret: Option<String>,
    pub public_key_pem: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub identity: IdentityConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"127.0.0.1:8080"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl AuthConfig {
    pub fn reauth_window(&self) -> Duration {
        Duration::from_secs(self.reauth_window_minutes.saturating_mul(60))
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_lifetime_hours.saturating_mul(60 * 60))
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Resolve the session secret with `SESSION_SECRET` env-var taking
    /// priority over the config file field.
    pub fn resolved_session_secret(&self) -> Option<String> {
        std::env::var("SESSION_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.session_secret.clone())
            .filter(|s| !s.is_empty())
    }
}

impl IdentityConfig {
    /// `IDENTITY_HMAC_SECRET` wins over the config field.
    pub fn resolved_hmac_secret(&self) -> Option<String> {
        std::env::var("IDENTITY_HMAC_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.hmac_secret.clone())
            .filter(|s| !s.is_empty())
    }

    pub fn public_key_path(&self) -> Option<&str> {
        self.public_key_pem.as_deref().filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_port() -> u16 {
    8080
}

pub fn default_reauth_window() -> u64 {
    60
}

pub fn default_session_lifetime() -> u64 {
    24
}

pub fn default_cookie_name() -> String {
    "session".to_string()
}

pub fn default_provider_timeout() -> u64 {
    3000
}

pub fn default_store_timeout() -> u64 {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(minutes: u64, hours: u64) -> AuthConfig {
        AuthConfig {
            reauth_window_minutes: minutes,
            session_lifetime_hours: hours,
            cookie_name: default_cookie_name(),
            cookie_secure: false,
            provider_timeout_ms: 1500,
            store_timeout_ms: 250,
            session_secret: None,
        }
    }

    #[test]
    fn durations_are_derived_from_config_units() {
        let a = auth(60, 24);
        assert_eq!(a.reauth_window(), Duration::from_secs(3600));
        assert_eq!(a.session_lifetime(), Duration::from_secs(86_400));
        assert_eq!(a.provider_timeout(), Duration::from_millis(1500));
        assert_eq!(a.store_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn addr_joins_bind_and_port() {
        let s = ServerConfig {
            bind: "0.0.0.0".to_string(),
            port: 9000,
        };
        assert_eq!(s.addr(), "0.0.0.0:9000");
    }

    #[test]
    fn empty_public_key_path_is_ignored() {
        let id = IdentityConfig {
            issuer: "iss".into(),
            audience: "aud".into(),
            hmac_secret: None,
            public_key_pem: Some(String::new()),
        };
        assert!(id.public_key_path().is_none());
    }
}
