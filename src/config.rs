//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};

use crate::data::OAuthProvider;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub oauth: OAuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "auth.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the public base URL of this service
    ///
    /// # Returns
    /// Full URL like "https://auth.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Session and credential configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
    /// Interval of the expired-session sweep in seconds (0 disables it)
    #[serde(default = "default_session_cleanup_interval")]
    pub session_cleanup_interval_seconds: u64,
    #[serde(default)]
    pub password: PasswordHashConfig,
}

fn default_session_cleanup_interval() -> u64 {
    3600
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordHashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// OAuth login configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Front-end origin; successful logins land on `{frontend_url}/callback`
    pub frontend_url: String,
    /// Lifetime of the anti-forgery state cookie in seconds
    pub state_max_age: i64,
    /// Timeout applied to every provider request
    pub request_timeout_seconds: u64,
    pub google: Option<ProviderConfig>,
    pub github: Option<ProviderConfig>,
    pub linkedin: Option<ProviderConfig>,
}

impl OAuthConfig {
    /// Configured providers with their settings
    pub fn providers(&self) -> Vec<(OAuthProvider, &ProviderConfig)> {
        [
            (OAuthProvider::Google, self.google.as_ref()),
            (OAuthProvider::GitHub, self.github.as_ref()),
            (OAuthProvider::LinkedIn, self.linkedin.as_ref()),
        ]
        .into_iter()
        .filter_map(|(provider, config)| config.map(|config| (provider, config)))
        .collect()
    }
}

/// Per-provider OAuth client configuration
///
/// Endpoint fields default to the provider's public endpoints and only
/// need to be set when pointing at a different host.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
    /// GitHub only: email-list endpoint used when the profile hides the email
    pub emails_url: Option<String>,
    pub scopes: Option<Vec<String>>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub fn filter_directives(&self) -> String {
        format!("authhub={},tower_http=debug", self.level.to_ascii_lowercase())
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (AUTHHUB__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost:8080")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/authhub.db")?
            .set_default("auth.session_max_age", 604800)?
            .set_default("auth.session_cleanup_interval_seconds", 3600)?
            .set_default("oauth.frontend_url", "http://localhost:5173")?
            .set_default("oauth.state_max_age", 600)?
            .set_default("oauth.request_timeout_seconds", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (AUTHHUB__*)
            .add_source(
                Environment::with_prefix("AUTHHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.auth.session_max_age <= 0 {
            return Err(AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.oauth.state_max_age <= 0 {
            return Err(AppError::Config(
                "oauth.state_max_age must be greater than 0".to_string(),
            ));
        }

        if self.oauth.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "oauth.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        let password = &self.auth.password;
        argon2::Params::new(
            password.memory_kib,
            password.iterations,
            password.parallelism,
            None,
        )
        .map_err(|e| AppError::Config(format!("auth.password is invalid: {e}")))?;

        for (provider, provider_config) in self.oauth.providers() {
            if provider_config.client_id.trim().is_empty()
                || provider_config.client_secret.trim().is_empty()
            {
                return Err(AppError::Config(format!(
                    "oauth.{provider}.client_id and oauth.{provider}.client_secret must not be empty"
                )));
            }
        }

        url::Url::parse(&self.oauth.frontend_url).map_err(|e| {
            AppError::Config(format!("oauth.frontend_url is not a valid URL: {e}"))
        })?;

        self.logging
            .level
            .parse::<tracing::Level>()
            .map_err(|e| AppError::Config(format!("logging.level is invalid: {e}")))?;

        if self.should_use_secure_cookies() && !self.server.protocol.eq_ignore_ascii_case("https")
        {
            return Err(AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
