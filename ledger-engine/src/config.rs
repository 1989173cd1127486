//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Persistence configuration
    pub persistence: PersistenceConfig,

    /// Writer actor configuration
    pub actor: ActorConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "ledger-engine".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            persistence: PersistenceConfig::default(),
            actor: ActorConfig::default(),
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Keep the log in RocksDB; when false the ledger lives in memory only
    pub enabled: bool,

    /// fsync every append before acknowledging it
    pub sync_writes: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_writes: true,
        }
    }
}

/// Writer actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure on writers)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Level 0 file num compaction trigger
    pub level0_file_num_compaction_trigger: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            level0_file_num_compaction_trigger: 4,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Non-durable preset (tests, demos)
    pub fn in_memory() -> Self {
        let mut config = Config::default();
        config.persistence.enabled = false;
        config
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(enabled) = std::env::var("LEDGER_PERSISTENCE") {
            config.persistence.enabled = enabled.parse().map_err(|_| {
                crate::Error::Config(format!("LEDGER_PERSISTENCE must be true or false, got {enabled}"))
            })?;
        }

        if let Ok(capacity) = std::env::var("LEDGER_MAILBOX_CAPACITY") {
            config.actor.mailbox_capacity = capacity.parse().map_err(|_| {
                crate::Error::Config(format!("LEDGER_MAILBOX_CAPACITY must be a number, got {capacity}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the ledger unusable
    pub fn validate(&self) -> crate::Result<()> {
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be greater than zero".to_string(),
            ));
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
        assert_eq!(config.service_name, "ledger-engine");
        assert!(config.persistence.enabled);
        assert_eq!(config.actor.mailbox_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_in_memory_preset() {
        let config = Config::in_memory();
        assert!(!config.persistence.enabled);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/var/lib/ledger"

[persistence]
sync_writes = false

[actor]
mailbox_capacity = 16
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/ledger"));
        assert!(config.persistence.enabled);
        assert!(!config.persistence.sync_writes);
        assert_eq!(config.actor.mailbox_capacity, 16);
    }

    #[test]
    fn test_from_file_rejects_zero_mailbox() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "[actor]\nmailbox_capacity = 0\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_from_file_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "data_dir = [").unwrap();

        assert!(matches!(
            Config::from_file(&path),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_from_env_overlays() {
        const VARS: [&str; 3] = [
            "LEDGER_DATA_DIR",
            "LEDGER_PERSISTENCE",
            "LEDGER_MAILBOX_CAPACITY",
        ];

        std::env::set_var("LEDGER_DATA_DIR", "/tmp/ledger-env");
        std::env::set_var("LEDGER_PERSISTENCE", "false");
        std::env::set_var("LEDGER_MAILBOX_CAPACITY", "8");
        let config = Config::from_env();

        std::env::set_var("LEDGER_PERSISTENCE", "maybe");
        let bad_bool = Config::from_env();
        std::env::set_var("LEDGER_PERSISTENCE", "true");
        std::env::set_var("LEDGER_MAILBOX_CAPACITY", "0");
        let zero_mailbox = Config::from_env();
        std::env::set_var("LEDGER_MAILBOX_CAPACITY", "lots");
        let bad_number = Config::from_env();

        for var in VARS {
            std::env::remove_var(var);
        }
        let defaults = Config::from_env().unwrap();

        let config = config.unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ledger-env"));
        assert!(!config.persistence.enabled);
        assert_eq!(config.actor.mailbox_capacity, 8);

        assert!(matches!(bad_bool, Err(crate::Error::Config(_))));
        assert!(matches!(zero_mailbox, Err(crate::Error::Config(_))));
        assert!(matches!(bad_number, Err(crate::Error::Config(_))));

        assert_eq!(defaults.data_dir, PathBuf::from("./data/ledger"));
        assert!(defaults.persistence.enabled);
        assert_eq!(defaults.actor.mailbox_capacity, 1000);
    }
}
