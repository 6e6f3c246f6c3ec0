//! Configuration file management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use numpool_alloc::Windows;
use numpool_types::{DEFAULT_BLACKLIST_WINDOW_DAYS, DEFAULT_POOL_WINDOW_DAYS};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Allocation windows.
    #[serde(default)]
    pub allocation: AllocationConfig,
    /// IPC settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Database file. Empty = $data_dir/numpool.db.
    #[serde(default)]
    pub path: String,
    /// SQLite connections to keep open.
    #[serde(default = "default_connections")]
    pub connections: usize,
}

/// Allocation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Only numbers imported within this many days are sold.
    #[serde(default = "default_pool_window")]
    pub pool_window_days: u32,
    /// A sold number is not resold within this many days.
    #[serde(default = "default_blacklist_window")]
    pub blacklist_window_days: u32,
}

/// IPC configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unix socket path. Empty = $data_dir/numpool.sock.
    #[serde(default)]
    pub socket_path: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_connections() -> usize {
    4
}

fn default_pool_window() -> u32 {
    DEFAULT_POOL_WINDOW_DAYS
}

fn default_blacklist_window() -> u32 {
    DEFAULT_BLACKLIST_WINDOW_DAYS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            path: String::new(),
            connections: default_connections(),
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            pool_window_days: default_pool_window(),
            blacklist_window_days: default_blacklist_window(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl AllocationConfig {
    /// Windows handed to the allocator.
    pub fn windows(&self) -> Windows {
        Windows {
            pool_days: self.pool_window_days,
            blacklist_days: self.blacklist_window_days,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.database.connections == 0 {
            anyhow::bail!("database.connections must be at least 1");
        }
        if self.allocation.pool_window_days == 0 || self.allocation.blacklist_window_days == 0 {
            anyhow::bail!("allocation windows must be at least one day");
        }
        Ok(())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.database.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.database.data_dir)
        }
    }

    /// Get the database file path.
    pub fn database_path(&self) -> PathBuf {
        if self.database.path.is_empty() {
            self.data_dir().join("numpool.db")
        } else {
            PathBuf::from(&self.database.path)
        }
    }

    /// Get the IPC socket path.
    pub fn socket_path(&self) -> PathBuf {
        if self.server.socket_path.is_empty() {
            self.data_dir().join("numpool.sock")
        } else {
            PathBuf::from(&self.server.socket_path)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Default data directory: `$NUMPOOL_DATA_DIR`, else `~/.numpool`.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("NUMPOOL_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".numpool"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/numpool"))
    }
}
