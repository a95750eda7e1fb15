use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use questlog_storage::{SqliteStore, StorageError};

use crate::error::EngineError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestlogConfig {
    pub engine: EngineConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Listen for changes made by other sessions.
    pub subscribe: bool,
    /// Upper bound on how long `settle` waits for in-flight writes.
    pub settle_timeout_ms: u64,
    /// Remote notices handled per `sync` call; the rest wait for the next one.
    pub max_notices_per_sync: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            subscribe: true,
            settle_timeout_ms: 5000,
            max_notices_per_sync: 64,
        }
    }
}

impl EngineConfig {
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file. In-memory when unset.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
        }
    }
}

impl StoreConfig {
    pub fn open(&self) -> Result<SqliteStore, StorageError> {
        match &self.path {
            Some(path) => SqliteStore::open_with_timeout(path, self.busy_timeout_ms),
            None => SqliteStore::open_in_memory(),
        }
    }
}

impl QuestlogConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.engine.max_notices_per_sync == 0 {
            return Err(EngineError::Config(
                "engine.max_notices_per_sync must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = QuestlogConfig::from_toml_str("").unwrap();
        assert_eq!(config, QuestlogConfig::default());
        assert!(config.engine.subscribe);
        assert_eq!(config.engine.settle_timeout(), Duration::from_secs(5));
        assert!(config.store.path.is_none());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = QuestlogConfig::from_toml_str(
            r#"
            [engine]
            subscribe = false

            [store]
            path = "/var/lib/questlog/ledger.db"
            "#,
        )
        .unwrap();
        assert!(!config.engine.subscribe);
        assert_eq!(config.engine.max_notices_per_sync, 64);
        assert_eq!(config.store.busy_timeout_ms, 5000);
        assert_eq!(
            config.store.path.as_deref(),
            Some(Path::new("/var/lib/questlog/ledger.db"))
        );
    }

    #[test]
    fn malformed_config_is_rejected() {
        assert!(matches!(
            QuestlogConfig::from_toml_str("[engine]\nsubscribe = \"yes\""),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            QuestlogConfig::from_toml_str("[engine]\nmax_notices_per_sync = 0"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questlog.toml");
        std::fs::write(&path, "[engine]\nsettle_timeout_ms = 250\n").unwrap();
        let config = QuestlogConfig::load(&path).unwrap();
        assert_eq!(config.engine.settle_timeout_ms, 250);
        assert!(QuestlogConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
