//! Application configuration management.
//!
//! Handles loading, saving, and accessing application configuration: where
//! the local store lives, logging, password hashing cost, the simulated
//! support chat, media storage and demo seeding. Configuration is persisted
//! as TOML on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{BrError, BrResult};
use crate::platform::Platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Password hashing settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Simulated support chat settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Local media storage settings.
    #[serde(default)]
    pub media: MediaConfig,

    /// First-run seeding settings.
    #[serde(default)]
    pub seed: SeedConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. If empty, uses default location.
    #[serde(default)]
    pub path: String,

    /// Enable WAL (Write-Ahead Logging) mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Run integrity check on startup.
    #[serde(default = "default_true")]
    pub integrity_check_on_startup: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

/// Argon2 cost parameters and legacy password handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_argon_memory")]
    pub memory_kib: u32,

    /// Number of passes.
    #[serde(default = "default_argon_iterations")]
    pub iterations: u32,

    /// Degree of parallelism.
    #[serde(default = "default_argon_parallelism")]
    pub parallelism: u32,

    /// Rehash plaintext rows after a successful login.
    #[serde(default = "default_true")]
    pub upgrade_legacy_passwords: bool,
}

/// Support chat simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Delay before the synthetic support reply is inserted.
    #[serde(default = "default_reply_delay")]
    pub reply_delay_ms: u64,

    /// Username of the account that answers support chats.
    #[serde(default = "default_support_username")]
    pub support_username: String,

    /// User id used when the support username cannot be resolved.
    #[serde(default = "default_support_fallback")]
    pub support_fallback_user_id: i64,

    /// Body of the synthetic reply.
    #[serde(default = "default_reply_text")]
    pub reply_text: String,
}

/// Local media storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory picked images are copied into. If empty, uses default location.
    #[serde(default)]
    pub photo_dir: String,
}

/// First-run seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Insert demo photos, users and a welcome alert when the store is empty.
    #[serde(default = "default_true")]
    pub demo_data: bool,
}

// Default value functions for serde

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_argon_memory() -> u32 {
    19 * 1024
}

fn default_argon_iterations() -> u32 {
    2
}

fn default_argon_parallelism() -> u32 {
    1
}

fn default_reply_delay() -> u64 {
    constants::DEFAULT_REPLY_DELAY_MS
}

fn default_support_username() -> String {
    constants::SUPPORT_USERNAME.to_string()
}

fn default_support_fallback() -> i64 {
    constants::SUPPORT_FALLBACK_USER_ID
}

fn default_reply_text() -> String {
    "Gracias por escribirnos. Un operador revisará tu mensaje a la brevedad.".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            wal_mode: true,
            pool_size: default_pool_size(),
            integrity_check_on_startup: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_argon_memory(),
            iterations: default_argon_iterations(),
            parallelism: default_argon_parallelism(),
            upgrade_legacy_passwords: true,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reply_delay_ms: default_reply_delay(),
            support_username: default_support_username(),
            support_fallback_user_id: default_support_fallback(),
            reply_text: default_reply_text(),
        }
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self { demo_data: true }
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> BrResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> BrResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> BrResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| BrError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> BrResult<PathBuf> {
        Ok(Platform::config_dir()?.join("config.toml"))
    }

    /// Get the effective database path, using the configured path or the default.
    pub fn effective_db_path(&self) -> BrResult<PathBuf> {
        if self.database.path.is_empty() {
            Ok(Platform::data_dir()?.join("brigada.db"))
        } else {
            Ok(PathBuf::from(&self.database.path))
        }
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> BrResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(Platform::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Get the effective photo directory, using the configured path or the default.
    pub fn effective_photo_dir(&self) -> BrResult<PathBuf> {
        if self.media.photo_dir.is_empty() {
            Ok(Platform::data_dir()?.join("photos"))
        } else {
            Ok(PathBuf::from(&self.media.photo_dir))
        }
    }

    /// Configuration rooted entirely inside `dir`. Used by tests and the CLI `--data-dir` flag.
    pub fn rooted_at(dir: &Path) -> Self {
        let mut config = Self::default();
        config.database.path = dir.join("brigada.db").to_string_lossy().into_owned();
        config.logging.directory = dir.join("logs").to_string_lossy().into_owned();
        config.media.photo_dir = dir.join("photos").to_string_lossy().into_owned();
        config
    }
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }
}
