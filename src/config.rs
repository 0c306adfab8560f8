use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub encryption: EncryptionConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    /// Lower values reduce memory usage but decrease GPU resistance.
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for access tokens. Required in production; a random
    /// per-process secret is generated in development when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in minutes (default: 60)
    pub access_token_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_ttl_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Master key for encrypting stored API keys. Required in production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Key-derivation salt. Required in production alongside the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// Shared provider API key used for accounts without their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub base_url: String,

    pub model: String,

    /// Request timeout in seconds (default: 60)
    pub request_timeout_seconds: u32,

    /// Maximum accepted code length in characters (default: 10000)
    pub max_code_length: usize,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.gemini.example.com/v1".to_string(),
            model: "gemini-1.5-flash".to_string(),
            request_timeout_seconds: 60,
            max_code_length: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "revu".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Deployment environment: "development" or "production".
    /// Overridable with the APP_ENV variable.
    pub environment: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/revu.db".to_string(),
            log_level: "info".to_string(),
            environment: "development".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
            auth: AuthConfig::default(),
            encryption: EncryptionConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                let mut config = Self::load_from_path(path)?;
                config.apply_env_overrides();
                return Ok(config);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Environment variables win over the config file so secrets can stay
    /// out of it.
    fn apply_env_overrides(&mut self) {
        if let Ok(env) = std::env::var("APP_ENV")
            && !env.is_empty()
        {
            self.general.environment = env;
        }
        if let Ok(secret) = std::env::var("REVU_JWT_SECRET")
            && !secret.is_empty()
        {
            self.auth.jwt_secret = Some(secret);
        }
        if let Ok(key) = std::env::var("REVU_ENCRYPTION_KEY")
            && !key.is_empty()
        {
            self.encryption.key = Some(key);
        }
        if let Ok(salt) = std::env::var("REVU_ENCRYPTION_SALT")
            && !salt.is_empty()
        {
            self.encryption.salt = Some(salt);
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY")
            && !key.is_empty()
        {
            self.gemini.api_key = Some(key);
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("revu").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".revu").join("config.toml"));
        }

        paths
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.general.environment.eq_ignore_ascii_case("production")
    }

    /// Fails fast on misconfigurations that would otherwise silently weaken
    /// a production deployment.
    pub fn validate(&self) -> Result<()> {
        if self.is_production() {
            if self.auth.jwt_secret.is_none() {
                anyhow::bail!("auth.jwt_secret (or REVU_JWT_SECRET) is required in production");
            }
            if self.encryption.key.is_none() || self.encryption.salt.is_none() {
                anyhow::bail!(
                    "encryption.key and encryption.salt (or REVU_ENCRYPTION_KEY / \
                     REVU_ENCRYPTION_SALT) are required in production"
                );
            }
        }

        if self.auth.access_token_ttl_minutes <= 0 {
            anyhow::bail!("auth.access_token_ttl_minutes must be > 0");
        }

        if self.gemini.max_code_length == 0 {
            anyhow::bail!("gemini.max_code_length must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.access_token_ttl_minutes, 60);
        assert_eq!(config.security.argon2_time_cost, 3);
        assert_eq!(config.gemini.max_code_length, 10_000);
        assert!(!config.is_production());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[gemini]"));
        assert!(toml_str.contains("[security]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [gemini]
            model = "gemini-1.5-pro"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.gemini.model, "gemini-1.5-pro");

        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_production_requires_secrets() {
        let mut config = Config::default();
        config.general.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = Some("secret".to_string());
        config.encryption.key = Some("master-key".to_string());
        config.encryption.salt = Some("salt".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ttl_must_be_positive() {
        let mut config = Config::default();
        config.auth.access_token_ttl_minutes = 0;
        assert!(config.validate().is_err());
    }
}
