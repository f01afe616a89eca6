//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SITECACHE_*)
//! 2. TOML config file (if SITECACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Changing `manifest` without bumping `generation` leaves the old entries in
//! place: the generation tag is the only invalidation trigger.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::manifest::Manifest;
use crate::worker::GenerationConfig;

mod validation;

pub use validation::ConfigError;

/// Which [`CacheStorage`](crate::storage::CacheStorage) backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Persistent SQLite database at `db_path`.
    Sqlite,
    /// Process-local maps; nothing survives a restart.
    Memory,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SITECACHE_*)
/// 2. TOML config file (if SITECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation identifier; also the name of the cache container.
    ///
    /// Set via SITECACHE_GENERATION environment variable.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Root-relative paths pre-cached at install time.
    ///
    /// Set via SITECACHE_MANIFEST (e.g. `["/a.css","/b.js"]`) or the TOML file.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Site origin that root-relative paths resolve against.
    ///
    /// Set via SITECACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Storage backend.
    ///
    /// Set via SITECACHE_STORAGE environment variable (`sqlite` or `memory`).
    #[serde(default = "default_storage")]
    pub storage: StorageBackend,

    /// Path to SQLite cache database.
    ///
    /// Set via SITECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SITECACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SITECACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SITECACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Promote a new generation as soon as it installs.
    ///
    /// Set via SITECACHE_SKIP_WAITING environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Take control of already-open clients on activation.
    ///
    /// Set via SITECACHE_CLAIM_CLIENTS environment variable.
    #[serde(default = "default_true")]
    pub claim_clients: bool,
}

fn default_generation() -> String {
    "site-v1".into()
}

fn default_manifest() -> Vec<String> {
    [
        "/assets/css/styles.css",
        "/assets/js/main.js",
        "/assets/includes/navbar-professional.html",
        "/assets/includes/navbar-personal.html",
        "/assets/includes/darkmode.html",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_storage() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sitecache.sqlite")
}

fn default_user_agent() -> String {
    "sitecache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generation: default_generation(),
            manifest: default_manifest(),
            origin: default_origin(),
            storage: default_storage(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            skip_waiting: true,
            claim_clients: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SITECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SITECACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if `origin` does not parse.
    pub fn origin_url(&self) -> Result<Url, Error> {
        Url::parse(&self.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.origin)))
    }

    /// The generation this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest or origin is invalid.
    pub fn generation_config(&self) -> Result<GenerationConfig, Error> {
        let manifest = Manifest::new(self.manifest.iter().cloned())?;
        let mut config = GenerationConfig::new(self.generation.clone(), manifest, self.origin_url()?);
        config.skip_waiting = self.skip_waiting;
        config.claim_clients = self.claim_clients;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.generation, "site-v1");
        assert_eq!(config.manifest.len(), 5);
        assert_eq!(config.manifest[0], "/assets/css/styles.css");
        assert_eq!(config.origin, "http://localhost:8080/");
        assert_eq!(config.storage, StorageBackend::Sqlite);
        assert_eq!(config.db_path, PathBuf::from("./sitecache.sqlite"));
        assert_eq!(config.user_agent, "sitecache/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert!(config.skip_waiting);
        assert!(config.claim_clients);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_generation_config() {
        let config = AppConfig { skip_waiting: false, ..Default::default() };
        let generation = config.generation_config().unwrap();
        assert_eq!(generation.generation, "site-v1");
        assert_eq!(generation.manifest.len(), 5);
        assert_eq!(generation.origin.as_str(), "http://localhost:8080/");
        assert!(!generation.skip_waiting);
        assert!(generation.claim_clients);
    }

    #[test]
    fn test_generation_config_rejects_relative_manifest() {
        let config = AppConfig { manifest: vec!["assets/js/main.js".into()], ..Default::default() };
        assert!(matches!(config.generation_config(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "sitecache.toml",
                r#"
                generation = "site-v7"
                manifest = ["/assets/css/styles.css"]
                storage = "memory"
                "#,
            )?;
            jail.set_env("SITECACHE_CONFIG_FILE", "sitecache.toml");
            jail.set_env("SITECACHE_GENERATION", "site-v8");
            jail.set_env("SITECACHE_TIMEOUT_MS", "5000");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.generation, "site-v8");
            assert_eq!(config.manifest, vec!["/assets/css/styles.css".to_string()]);
            assert_eq!(config.storage, StorageBackend::Memory);
            assert_eq!(config.timeout_ms, 5000);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("sitecache.toml", r#"generation = """#)?;
            jail.set_env("SITECACHE_CONFIG_FILE", "sitecache.toml");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { ref field, .. }) if field == "generation"));
            Ok(())
        });
    }
}
