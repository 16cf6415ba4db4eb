//! Configuration for the Flowie server.
//!
//! Settings are layered:
//! 1. `flowie.toml` (missing file means defaults)
//! 2. Environment variables (a `.env` file is loaded first when present)
//! 3. CLI arguments
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! cors_permissive = false
//! static_dir = "frontend/dist"
//!
//! [database]
//! path = "data/flowie.db"
//!
//! [auth]
//! jwt_secret = "change-me"
//! issuer = "flowie"
//! access_token_minutes = 15
//! refresh_token_days = 7
//!
//! [rate_limit]
//! enabled = true
//! max_requests = 10
//! window_seconds = 60
//!
//! [logging]
//! level = "info"
//! json = false
//! directory = "logs"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "flowie.toml";
pub const DEFAULT_JWT_SECRET: &str = "flowie-development-secret-change-me";

/// Upper bounds for configured lifetimes; larger values are clamped.
pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 24 * 60;
pub const MAX_REFRESH_TOKEN_DAYS: i64 = 365;
pub const MAX_WINDOW_SECONDS: u64 = 24 * 60 * 60;

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow any origin (local frontend development)
    #[serde(default)]
    pub cors_permissive: bool,
    /// Directory with the built single-page frontend, served as fallback
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: false,
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/flowie.db")
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Token signing and lifetimes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSection {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_issuer() -> String {
    "flowie".to_string()
}

fn default_access_token_minutes() -> i64 {
    15
}

fn default_refresh_token_days() -> i64 {
    7
}

impl AuthSection {
    /// Access token lifetime, clamped to 1 minute ..= 1 day.
    pub fn access_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_minutes.clamp(1, MAX_ACCESS_TOKEN_MINUTES))
    }

    /// Refresh token lifetime, clamped to 1 ..= 365 days.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_days.clamp(1, MAX_REFRESH_TOKEN_DAYS))
    }
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            issuer: default_issuer(),
            access_token_minutes: default_access_token_minutes(),
            refresh_token_days: default_refresh_token_days(),
        }
    }
}

/// Limits applied to the `/auth` endpoints, per client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitSection {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_max_requests() -> u32 {
    10
}

fn default_window_seconds() -> u64 {
    60
}

impl RateLimitSection {
    /// Window length, clamped to 1 second ..= 1 day.
    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_seconds.clamp(1, MAX_WINDOW_SECONDS) as i64)
    }
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Write a daily-rolling log file here in addition to stderr
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

/// The complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlowieConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Values given on the command line; `None` keeps the lower layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub dev: bool,
}

impl FlowieConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse flowie.toml")
    }

    /// Load the file if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the full layered configuration (file → env → CLI).
    pub fn resolve(path: &Path, cli: &CliOverrides) -> Result<Self> {
        // A missing .env is normal; anything else is worth knowing about.
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            return Err(e).context("Failed to load .env file");
        }

        let mut config = Self::load_or_default(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_cli(cli);
        Ok(config)
    }

    /// Apply environment overrides. `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("FLOWIE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("FLOWIE_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid FLOWIE_PORT '{}'", port))?;
        }
        if let Some(path) = lookup("FLOWIE_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(secret) = lookup("FLOWIE_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(level) = lookup("FLOWIE_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(path) = &cli.db_path {
            self.database.path = path.clone();
        }
        if cli.dev {
            self.server.cors_permissive = true;
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize flowie.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.auth.jwt_secret == DEFAULT_JWT_SECRET {
            warnings.push(
                "auth.jwt_secret uses the built-in development secret; set FLOWIE_JWT_SECRET"
                    .to_string(),
            );
        } else if self.auth.jwt_secret.len() < 32 {
            warnings.push("auth.jwt_secret is shorter than 32 bytes".to_string());
        }
        if !(1..=MAX_ACCESS_TOKEN_MINUTES).contains(&self.auth.access_token_minutes) {
            warnings.push(format!(
                "auth.access_token_minutes must be between 1 and {}, got {} (clamped)",
                MAX_ACCESS_TOKEN_MINUTES, self.auth.access_token_minutes
            ));
        }
        if !(1..=MAX_REFRESH_TOKEN_DAYS).contains(&self.auth.refresh_token_days) {
            warnings.push(format!(
                "auth.refresh_token_days must be between 1 and {}, got {} (clamped)",
                MAX_REFRESH_TOKEN_DAYS, self.auth.refresh_token_days
            ));
        }
        if self.rate_limit.enabled && self.rate_limit.max_requests == 0 {
            warnings.push("rate_limit is enabled but max_requests is 0".to_string());
        }
        if !(1..=MAX_WINDOW_SECONDS).contains(&self.rate_limit.window_seconds) {
            warnings.push(format!(
                "rate_limit.window_seconds must be between 1 and {}, got {} (clamped)",
                MAX_WINDOW_SECONDS, self.rate_limit.window_seconds
            ));
        }
        if let Some(dir) = &self.server.static_dir
            && !dir.join("index.html").exists()
        {
            warnings.push(format!(
                "server.static_dir '{}' has no index.html",
                dir.display()
            ));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = FlowieConfig::parse("").unwrap();
        assert_eq!(config, FlowieConfig::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.access_token_minutes, 15);
        assert_eq!(config.rate_limit.max_requests, 10);
    }

    #[test]
    fn test_parse_sections() {
        let config = FlowieConfig::parse(
            r#"
            [server]
            port = 9000
            cors_permissive = true

            [database]
            path = "/var/lib/flowie/flowie.db"

            [auth]
            jwt_secret = "0123456789abcdef0123456789abcdef"
            refresh_token_days = 30

            [logging]
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.server.cors_permissive);
        assert_eq!(config.database.path, PathBuf::from("/var/lib/flowie/flowie.db"));
        assert_eq!(config.auth.refresh_token_days, 30);
        assert_eq!(config.auth.access_token_minutes, 15);
        assert!(config.logging.json);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_invalid_toml_fails() {
        assert!(FlowieConfig::parse("[server\nport = ").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("FLOWIE_PORT", "7000"),
            ("FLOWIE_DB_PATH", "/tmp/env.db"),
            ("FLOWIE_JWT_SECRET", "from-env"),
        ]
        .into_iter()
        .collect();
        let mut config = FlowieConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.database.path, PathBuf::from("/tmp/env.db"));
        assert_eq!(config.auth.jwt_secret, "from-env");
    }

    #[test]
    fn test_invalid_env_port_is_an_error() {
        let mut config = FlowieConfig::default();
        let result = config.apply_env(|key| (key == "FLOWIE_PORT").then(|| "http".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = FlowieConfig::default();
        config
            .apply_env(|key| (key == "FLOWIE_PORT").then(|| "7000".to_string()))
            .unwrap();
        config.apply_cli(&CliOverrides {
            port: Some(7100),
            db_path: None,
            dev: true,
        });
        assert_eq!(config.server.port, 7100);
        assert!(config.server.cors_permissive);
        assert_eq!(config.database.path, default_db_path());
    }

    #[test]
    fn test_validate_warns_about_default_secret() {
        let warnings = FlowieConfig::default().validate();
        assert!(warnings.iter().any(|w| w.contains("jwt_secret")));
    }

    #[test]
    fn test_out_of_range_lifetimes_are_clamped() {
        let mut config = FlowieConfig::default();
        config.auth.access_token_minutes = i64::MAX;
        config.auth.refresh_token_days = -5;
        config.rate_limit.window_seconds = u64::MAX;

        assert_eq!(config.auth.access_ttl(), Duration::days(1));
        assert_eq!(config.auth.refresh_ttl(), Duration::days(1));
        assert_eq!(config.rate_limit.window(), Duration::days(1));

        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("access_token_minutes")));
        assert!(warnings.iter().any(|w| w.contains("refresh_token_days")));
        assert!(warnings.iter().any(|w| w.contains("window_seconds")));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flowie.toml");
        let mut config = FlowieConfig::default();
        config.server.port = 4321;
        config.save(&path).unwrap();

        let loaded = FlowieConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = FlowieConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, FlowieConfig::default());
    }
}
