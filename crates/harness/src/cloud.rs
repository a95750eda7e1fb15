use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;

use questlog_core::{Catalog, SessionId, UserId};
use questlog_engine::{Engine, EngineConfig, EngineError, StoreConfig};
use questlog_storage::{RemoteStore, RemoteWrite, Snapshot, SqliteStore, StorageError};

use crate::{FaultyStore, TestDevice};

/// One remote store shared by any number of devices.
pub struct TestCloud {
    store: Arc<FaultyStore>,
    catalog: Arc<Catalog>,
}

impl TestCloud {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_store_config(&StoreConfig::default())
    }

    /// On-disk store at `path`; reopening the same path sees earlier data.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        Self::with_store_config(&StoreConfig {
            path: Some(path.to_path_buf()),
            ..StoreConfig::default()
        })
    }

    pub fn with_store_config(config: &StoreConfig) -> Result<Self, StorageError> {
        crate::init_tracing();
        let inner = Arc::new(config.open()?);
        Ok(Self {
            store: Arc::new(FaultyStore::new(inner)),
            catalog: Arc::new(Catalog::builtin()),
        })
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn store(&self) -> &Arc<FaultyStore> {
        &self.store
    }

    pub fn sqlite(&self) -> &Arc<SqliteStore> {
        self.store.inner()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn fail_writes(&self, fail: bool) {
        self.store.set_fail_writes(fail);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.store.set_fail_reads(fail);
    }

    pub async fn device(&self, user: UserId, today: NaiveDate) -> Result<TestDevice, EngineError> {
        self.device_with_config(user, today, EngineConfig::default())
            .await
    }

    pub async fn device_with_config(
        &self,
        user: UserId,
        today: NaiveDate,
        config: EngineConfig,
    ) -> Result<TestDevice, EngineError> {
        let store: Arc<dyn RemoteStore> = self.store.clone();
        let engine = Engine::open(user, Arc::clone(&self.catalog), config, store, today).await?;
        Ok(TestDevice::new(engine, today))
    }

    /// What the store durably holds for `user`, bypassing fault injection.
    pub fn stored(&self, user: UserId) -> Result<Option<Snapshot>, StorageError> {
        self.sqlite().read_snapshot(user)
    }

    /// Write directly to the store as some other, unnamed session.
    pub fn write_as_stranger(
        &self,
        user: UserId,
        writes: &[RemoteWrite],
    ) -> Result<(), StorageError> {
        self.sqlite().write_batch(user, SessionId::new(), writes)
    }
}
