//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Plain environment variables `SECRET_KEY`, `DATABASE_URL`, `UPLOAD_FOLDER`
//! 2. Environment variables prefixed with BOOKSHELF_
//! 3. Config file (config.toml)
//! 4. Default values
//!
//! Secrets like the session signing key should be kept in environment
//! variables, not in the config file.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    /// Address the HTTP server binds to.
    pub bind: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Bookshelf".to_string(),
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string (env var DATABASE_URL)
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://bookshelf.db?mode=rwc".to_string(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding cover files (env var UPLOAD_FOLDER)
    pub upload_dir: String,
    /// Maximum upload size in MB
    pub max_upload_size_mb: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "./uploads".to_string(),
            max_upload_size_mb: 10,
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Session cookie signing key (env var SECRET_KEY).
    /// Must be at least 64 bytes; a random key is used otherwise.
    #[serde(default)]
    pub secret_key: String,
    /// Session lifetime in hours
    pub session_ttl_hours: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            session_ttl_hours: 24 * 14,
        }
    }
}

/// Content limits configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub books_per_page: u32,
    pub reviews_per_page: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            books_per_page: 10,
            reviews_per_page: 10,
        }
    }
}

/// Demo data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Number of synthetic books generated into an empty catalog.
    pub book_count: u32,
    /// Placeholder image source; `{seed}` is replaced per request.
    pub cover_source_url: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            book_count: 40,
            cover_source_url: "https://picsum.photos/seed/{seed}/300/450".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub limits: LimitsConfig,
    pub seed: SeedConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g., BOOKSHELF_SITE_BIND, BOOKSHELF_SEED_BOOK_COUNT
            .add_source(
                Environment::with_prefix("BOOKSHELF")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = config.try_deserialize()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies the unprefixed variables every deployment of this app has
    /// historically used.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(key) = lookup("SECRET_KEY") {
            self.security.secret_key = key;
        }
        if let Some(dir) = lookup("UPLOAD_FOLDER") {
            self.storage.upload_dir = dir;
        }
    }

    /// Maximum accepted multipart upload in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.storage.max_upload_size_mb as usize * 1024 * 1024
    }
}

/// Initialize application configuration
///
/// This triggers the lazy loading of the config file and logs the result.
/// Should be called early in application startup.
pub fn init() {
    let config = get_config();
    log::info!(
        "Configuration loaded: site.name = {}, database = {}",
        config.site.name,
        config.database.url
    );
}

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

/// Get storage configuration
pub fn storage() -> StorageConfig {
    get_config().storage
}

/// Get limits configuration
pub fn limits() -> LimitsConfig {
    get_config().limits
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.site.name, "Bookshelf");
        assert_eq!(config.limits.books_per_page, 10);
        assert_eq!(config.limits.reviews_per_page, 10);
        assert_eq!(config.seed.book_count, 40);
        assert_eq!(config.storage.upload_dir, "./uploads");
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[site]
name = "Test Library"

[storage]
upload_dir = "/srv/covers"

[seed]
book_count = 5
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.site.name, "Test Library");
        assert_eq!(config.seed.book_count, 5);
        // Defaults should still apply for unspecified values
        assert_eq!(config.limits.books_per_page, 10);
        assert_eq!(config.site.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.site.name, "Bookshelf");
        assert_eq!(config.storage.max_upload_size_mb, 10);
    }

    #[test]
    fn test_plain_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgres://localhost/library"),
            ("UPLOAD_FOLDER", "/tmp/covers"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.url, "postgres://localhost/library");
        assert_eq!(config.storage.upload_dir, "/tmp/covers");
        assert!(config.security.secret_key.is_empty());
    }
}
