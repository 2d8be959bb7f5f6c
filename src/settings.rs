use anyhow::{bail, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::utils::crypto::generate_encryption_key;

/// ID token signing algorithms the validator can verify
pub const SUPPORTED_ID_TOKEN_ALGORITHMS: [&str; 4] = ["RS256", "RS384", "RS512", "ES256"];

/// Upper bound for token cookie lifetimes, one year
pub const MAX_COOKIE_MAX_AGE_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OAuthAgentSettings {
    pub application: ApplicationSettings,
    pub oauth: OAuthSettings,
    pub cookies: CookieSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Public URL of the agent itself; an `http://` value disables the Secure cookie flag
    pub base_url: String,
    /// Mount point of the agent endpoints, e.g. `/oauth-agent`
    pub endpoints_prefix: String,
    /// Comma separated list of SPA origins allowed to call the agent
    pub trusted_web_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub post_logout_redirect_uri: String,
    pub scope: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    pub end_session_endpoint: String,
    pub issuer: String,
    pub id_token_algorithm: String,
    pub clock_skew_seconds: u64,
    pub jwks_cache_duration_seconds: u64,
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub name_prefix: String,
    /// Standard base64 encoding of 32 random bytes
    pub encryption_key: String,
    /// Path the access token cookie is scoped to, usually the API route prefix
    pub api_cookie_base_path: String,
    pub max_age_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            endpoints_prefix: "/oauth-agent".to_string(),
            trusted_web_origins: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: String::new(),
            post_logout_redirect_uri: String::new(),
            scope: "openid profile".to_string(),
            authorize_endpoint: String::new(),
            token_endpoint: String::new(),
            jwks_uri: String::new(),
            end_session_endpoint: String::new(),
            issuer: String::new(),
            id_token_algorithm: "RS256".to_string(),
            clock_skew_seconds: 10,
            jwks_cache_duration_seconds: 3600,
            http_timeout_seconds: 10,
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name_prefix: "oauth-agent".to_string(),
            encryption_key: String::new(), // Will be generated if empty
            api_cookie_base_path: "/api".to_string(),
            max_age_hours: 24,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl OAuthAgentSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read
    /// - TOML parsing fails
    pub fn load() -> Result<Self> {
        Self::load_env_file();

        let secrets_dir = std::env::var("OAUTH_AGENT_SECRETS_DIR").ok();
        let mut settings =
            Self::load_base_settings(Path::new("Settings.toml"), secrets_dir.as_deref().map(Path::new))?;

        Self::apply_env_overrides(&mut settings);
        Self::initialize_logging(&settings.logging.level);
        settings.ensure_encryption_key();

        Ok(settings)
    }

    /// Initialize `env_logger` with the configured level as default filter
    ///
    /// `RUST_LOG` still takes precedence when present.
    fn initialize_logging(level: &str) {
        let env = env_logger::Env::default().default_filter_or(level);
        if env_logger::Builder::from_env(env).try_init().is_err() {
            debug!("Logger already initialized");
        }
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `OAUTH_AGENT_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read
    /// - TOML parsing fails
    pub fn load_base_settings(default_path: &Path, secrets_dir: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();

        if default_path.exists() {
            let toml_content = fs::read_to_string(default_path)?;
            settings = basic_toml::from_str(&toml_content)?;
            println!("✓ Loaded base settings from {}", default_path.display());
        }

        if let Some(secrets_dir) = secrets_dir {
            let secrets_path = secrets_dir.join("Settings.toml");
            if secrets_path.exists() {
                let secrets_toml_content = fs::read_to_string(&secrets_path)?;
                settings = basic_toml::from_str(&secrets_toml_content)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ OAUTH_AGENT_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_oauth_env_overrides(&mut settings.oauth);
        Self::apply_cookie_env_overrides(&mut settings.cookies);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        Self::apply_string_env_override("AGENT_BASE_URL", &mut app_settings.base_url);
        Self::apply_string_env_override("ENDPOINTS_PREFIX", &mut app_settings.endpoints_prefix);
        Self::apply_string_env_override(
            "TRUSTED_WEB_ORIGINS",
            &mut app_settings.trusted_web_origins,
        );
    }

    fn apply_oauth_env_overrides(oauth: &mut OAuthSettings) {
        Self::apply_string_env_override("OAUTH_CLIENT_ID", &mut oauth.client_id);
        Self::apply_string_env_override("OAUTH_REDIRECT_URI", &mut oauth.redirect_uri);
        Self::apply_string_env_override(
            "OAUTH_POST_LOGOUT_REDIRECT_URI",
            &mut oauth.post_logout_redirect_uri,
        );
        Self::apply_string_env_override("OAUTH_SCOPE", &mut oauth.scope);
        Self::apply_string_env_override("OAUTH_AUTHORIZE_ENDPOINT", &mut oauth.authorize_endpoint);
        Self::apply_string_env_override("OAUTH_TOKEN_ENDPOINT", &mut oauth.token_endpoint);
        Self::apply_string_env_override("OAUTH_JWKS_URI", &mut oauth.jwks_uri);
        Self::apply_string_env_override(
            "OAUTH_END_SESSION_ENDPOINT",
            &mut oauth.end_session_endpoint,
        );
        Self::apply_string_env_override("OAUTH_ISSUER", &mut oauth.issuer);
        Self::apply_string_env_override("OAUTH_ID_TOKEN_ALGORITHM", &mut oauth.id_token_algorithm);
    }

    fn apply_cookie_env_overrides(cookie_settings: &mut CookieSettings) {
        Self::apply_string_env_override("COOKIE_NAME_PREFIX", &mut cookie_settings.name_prefix);
        Self::apply_string_env_override(
            "COOKIE_ENCRYPTION_KEY",
            &mut cookie_settings.encryption_key,
        );
        Self::apply_string_env_override(
            "API_COOKIE_BASE_PATH",
            &mut cookie_settings.api_cookie_base_path,
        );
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        Self::apply_string_env_override("RUST_LOG", &mut logging_settings.level);
    }

    /// Helper function to apply non-empty string environment variable overrides
    fn apply_string_env_override(env_var: &str, target: &mut String) {
        if let Ok(value) = std::env::var(env_var) {
            if !value.is_empty() {
                *target = value;
            }
        }
    }

    /// Generate a random cookie encryption key when none was configured
    ///
    /// Cookies issued with a generated key do not survive a restart.
    pub fn ensure_encryption_key(&mut self) {
        if self.cookies.encryption_key.is_empty() {
            self.cookies.encryption_key = generate_encryption_key();
            warn!("⚠️  Using an auto-generated cookie encryption key");
            warn!("🔒 Set COOKIE_ENCRYPTION_KEY or cookies.encryption_key in Settings.toml for production use");
            warn!("💡 Existing cookies become unreadable on each restart unless a key is configured");
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Check that the settings describe a usable agent
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing or malformed value
    pub fn validate(&self) -> Result<()> {
        let oauth = &self.oauth;
        let required = [
            ("oauth.client_id", &oauth.client_id),
            ("oauth.redirect_uri", &oauth.redirect_uri),
            ("oauth.authorize_endpoint", &oauth.authorize_endpoint),
            ("oauth.token_endpoint", &oauth.token_endpoint),
            ("oauth.jwks_uri", &oauth.jwks_uri),
            ("oauth.end_session_endpoint", &oauth.end_session_endpoint),
            ("oauth.issuer", &oauth.issuer),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                bail!("Missing required setting {name}");
            }
        }

        let urls = [
            ("application.base_url", &self.application.base_url),
            ("oauth.redirect_uri", &oauth.redirect_uri),
            ("oauth.authorize_endpoint", &oauth.authorize_endpoint),
            ("oauth.token_endpoint", &oauth.token_endpoint),
            ("oauth.jwks_uri", &oauth.jwks_uri),
            ("oauth.end_session_endpoint", &oauth.end_session_endpoint),
        ];
        for (name, value) in urls {
            if url::Url::parse(value).is_err() {
                bail!("Setting {name} is not an absolute URL: {value}");
            }
        }

        if !SUPPORTED_ID_TOKEN_ALGORITHMS.contains(&oauth.id_token_algorithm.as_str()) {
            bail!(
                "Unsupported oauth.id_token_algorithm '{}', expected one of {SUPPORTED_ID_TOKEN_ALGORITHMS:?}",
                oauth.id_token_algorithm
            );
        }

        if !self.application.endpoints_prefix.starts_with('/') {
            bail!(
                "Setting application.endpoints_prefix must start with '/': {}",
                self.application.endpoints_prefix
            );
        }

        if self.cookies.name_prefix.trim().is_empty() {
            bail!("Missing required setting cookies.name_prefix");
        }

        if !(1..=MAX_COOKIE_MAX_AGE_HOURS).contains(&self.cookies.max_age_hours) {
            bail!(
                "Setting cookies.max_age_hours must be between 1 and {MAX_COOKIE_MAX_AGE_HOURS}: {}",
                self.cookies.max_age_hours
            );
        }

        info!("✅ Settings validated for client '{}'", oauth.client_id);
        Ok(())
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get trusted web origins as a vector of strings
    #[must_use]
    pub fn get_trusted_web_origins(&self) -> Vec<String> {
        self.application
            .trusted_web_origins
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Endpoints prefix without a trailing slash
    #[must_use]
    pub fn endpoints_prefix(&self) -> &str {
        self.application.endpoints_prefix.trim_end_matches('/')
    }

    /// Cookies are marked Secure unless the agent is served over plain HTTP
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        !self
            .application
            .base_url
            .trim()
            .to_ascii_lowercase()
            .starts_with("http://")
    }
}
