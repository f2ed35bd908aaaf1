//! Configuration loading and resolution
//!
//! Bootstrap settings are resolved in priority order:
//! 1. Command-line argument (highest priority, passed in as overrides)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Built-in default (fallback)
//!
//! The TOML file is optional. An explicitly requested file must exist; the
//! platform default location is only read when present.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Default bind address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default generative model identifier
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default generative API base URL
pub const DEFAULT_GENERATIVE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default cache time-to-live in days
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 30;

/// Default transport-level cap on analysis input length (characters)
pub const DEFAULT_MAX_TEXT_CHARS: usize = 20_000;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "CCA_CONFIG";

/// Environment variable holding the generative API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable overriding the generative model
pub const MODEL_ENV: &str = "CCA_GEMINI_MODEL";

/// Config file as written on disk; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub bind_address: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Path to SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Upper bound on `text` accepted by the HTTP layer
    #[serde(default)]
    pub max_text_chars: Option<usize>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub generative: GenerativeConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub entities: EntitiesConfig,

    #[serde(default)]
    pub cors: CorsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Generative backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerativeConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// Analysis cache settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub ttl_days: Option<i64>,
}

/// Entity detection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitiesConfig {
    /// Extra lexicon entries merged over the built-in gazetteer
    #[serde(default)]
    pub lexicon_path: Option<PathBuf>,
}

/// CORS settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// Values supplied on the command line (clap also folds in their env vars)
#[derive(Debug, Clone, Default)]
pub struct BootstrapOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Fully resolved generative backend settings
#[derive(Debug, Clone)]
pub struct GenerativeSettings {
    /// `None` when no key is configured; backend calls then fail fast
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
    pub temperature: f32,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub max_text_chars: usize,
    pub log_level: String,
    pub generative: GenerativeSettings,
    pub cache_ttl_days: i64,
    pub lexicon_path: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
}

impl ServiceConfig {
    /// Merge command-line overrides, environment, TOML and defaults
    pub fn resolve(overrides: BootstrapOverrides, toml_config: TomlConfig) -> Result<Self> {
        let database_path = match overrides.database_path.or(toml_config.database_path) {
            Some(path) => path,
            None => default_database_path()?,
        };

        let cache_ttl_days = toml_config.cache.ttl_days.unwrap_or(DEFAULT_CACHE_TTL_DAYS);
        if cache_ttl_days <= 0 {
            return Err(Error::Config(format!(
                "cache.ttl_days must be positive (got {})",
                cache_ttl_days
            )));
        }

        let max_text_chars = toml_config.max_text_chars.unwrap_or(DEFAULT_MAX_TEXT_CHARS);
        if max_text_chars == 0 {
            return Err(Error::Config("max_text_chars must be positive".to_string()));
        }

        let generative = resolve_generative(&toml_config.generative)?;

        Ok(Self {
            bind_address: overrides
                .bind_address
                .or(toml_config.bind_address)
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            port: overrides.port.or(toml_config.port).unwrap_or(DEFAULT_PORT),
            database_path,
            max_text_chars,
            log_level: overrides.log_level.unwrap_or(toml_config.logging.level),
            generative,
            cache_ttl_days,
            lexicon_path: toml_config.entities.lexicon_path,
            allowed_origins: toml_config.cors.allowed_origins,
        })
    }
}

fn resolve_generative(config: &GenerativeConfig) -> Result<GenerativeSettings> {
    let requests_per_minute = config.requests_per_minute.unwrap_or(60);
    if requests_per_minute == 0 {
        return Err(Error::Config(
            "generative.requests_per_minute must be positive".to_string(),
        ));
    }

    Ok(GenerativeSettings {
        api_key: resolve_api_key(config),
        model: std::env::var(MODEL_ENV)
            .ok()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| config.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        base_url: config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_GENERATIVE_BASE_URL.to_string()),
        timeout_secs: config.timeout_secs.unwrap_or(60),
        requests_per_minute,
        temperature: config.temperature.unwrap_or(0.7),
    })
}

/// Resolve the generative API key
///
/// **Priority:** ENV → TOML. Blank values count as unset.
pub fn resolve_api_key(config: &GenerativeConfig) -> Option<String> {
    let env_key = std::env::var(API_KEY_ENV).ok().filter(|k| is_valid_key(k));
    let toml_key = config.api_key.clone().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "Generative API key found in both {} and TOML config. Using environment (higher priority).",
            API_KEY_ENV
        );
    }

    if env_key.is_some() {
        info!("Generative API key loaded from environment variable");
        return env_key;
    }
    if toml_key.is_some() {
        info!("Generative API key loaded from TOML config");
        return toml_key;
    }
    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Load the TOML config file
///
/// An explicit path (argument or `CCA_CONFIG`) must exist. Without one, the
/// platform default location is tried and defaults are used if it is absent.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                debug!("No config file found, using built-in defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Platform config file location, e.g. `~/.config/cca/cca-analyzer.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cca").join("cca-analyzer.toml"))
}

/// Platform data location for the database, e.g. `~/.local/share/cca/cca.db`
pub fn default_database_path() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|d| d.join("cca").join("cca.db"))
        .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn overrides_with_db(path: &str) -> BootstrapOverrides {
        BootstrapOverrides {
            database_path: Some(PathBuf::from(path)),
            ..Default::default()
        }
    }

    #[test]
    #[serial]
    fn test_resolve_defaults() {
        std::env::remove_var(API_KEY_ENV);
        std::env::remove_var(MODEL_ENV);

        let config = ServiceConfig::resolve(overrides_with_db("/tmp/cca.db"), TomlConfig::default())
            .unwrap();

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.cache_ttl_days, 30);
        assert_eq!(config.max_text_chars, DEFAULT_MAX_TEXT_CHARS);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.generative.model, DEFAULT_MODEL);
        assert!(config.generative.api_key.is_none());
        assert_eq!(config.allowed_origins, vec!["*".to_string()]);
    }

    #[test]
    #[serial]
    fn test_cli_overrides_beat_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            port = 6000
            bind_address = "0.0.0.0"
            [logging]
            level = "warn"
            "#,
        )
        .unwrap();

        let overrides = BootstrapOverrides {
            port: Some(7000),
            log_level: Some("debug".to_string()),
            ..overrides_with_db("/tmp/cca.db")
        };

        let config = ServiceConfig::resolve(overrides, toml_config).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_api_key_env_beats_toml() {
        std::env::set_var(API_KEY_ENV, "env-key");
        let config = GenerativeConfig {
            api_key: Some("toml-key".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&config), Some("env-key".to_string()));

        std::env::remove_var(API_KEY_ENV);
        assert_eq!(resolve_api_key(&config), Some("toml-key".to_string()));
    }

    #[test]
    #[serial]
    fn test_blank_api_key_is_unset() {
        std::env::set_var(API_KEY_ENV, "   ");
        let config = GenerativeConfig {
            api_key: Some("".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&config), None);
        std::env::remove_var(API_KEY_ENV);
    }

    #[test]
    #[serial]
    fn test_rejects_non_positive_ttl() {
        let toml_config: TomlConfig = toml::from_str("[cache]\nttl_days = 0\n").unwrap();
        let result = ServiceConfig::resolve(overrides_with_db("/tmp/cca.db"), toml_config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cca-analyzer.toml");
        std::fs::write(
            &path,
            r#"
            port = 5999
            [generative]
            model = "gemini-test"
            requests_per_minute = 10
            [entities]
            lexicon_path = "/etc/cca/lexicon.toml"
            "#,
        )
        .unwrap();

        let config = load_toml_config(Some(&path)).unwrap();
        assert_eq!(config.port, Some(5999));
        assert_eq!(config.generative.model.as_deref(), Some("gemini-test"));
        assert_eq!(config.generative.requests_per_minute, Some(10));
        assert_eq!(
            config.entities.lexicon_path,
            Some(PathBuf::from("/etc/cca/lexicon.toml"))
        );
    }

    #[test]
    #[serial]
    fn test_load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(load_toml_config(Some(&missing)), Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_load_malformed_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        assert!(matches!(load_toml_config(Some(&path)), Err(Error::Config(_))));
    }
}
