use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use questlog_core::{SessionId, UserId};
use questlog_storage::{
    EntityRef, RemoteRecord, RemoteStore, RemoteWrite, Snapshot, SqliteStore, StorageError,
    Subscription,
};

/// A `SqliteStore` whose reads and writes can be switched off to simulate an
/// unreachable backend.
#[derive(Debug)]
pub struct FaultyStore {
    inner: Arc<SqliteStore>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    writes_applied: AtomicU64,
    writes_rejected: AtomicU64,
    /// Delay between a batch committing and `apply` returning.
    ack_delay_ms: AtomicU64,
}

impl FaultyStore {
    pub fn new(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            writes_applied: AtomicU64::new(0),
            writes_rejected: AtomicU64::new(0),
            ack_delay_ms: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<SqliteStore> {
        &self.inner
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Hold back acknowledgements: writes commit (and notify) right away,
    /// but the writer only hears about it after `delay`.
    pub fn set_ack_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.ack_delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Batches that reached the database.
    pub fn writes_applied(&self) -> u64 {
        self.writes_applied.load(Ordering::SeqCst)
    }

    pub fn writes_rejected(&self) -> u64 {
        self.writes_rejected.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<(), StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FaultyStore {
    async fn load_snapshot(&self, user: UserId) -> Result<Option<Snapshot>, StorageError> {
        self.check_reads()?;
        self.inner.load_snapshot(user).await
    }

    async fn fetch(
        &self,
        user: UserId,
        entity: &EntityRef,
    ) -> Result<Option<RemoteRecord>, StorageError> {
        self.check_reads()?;
        self.inner.fetch(user, entity).await
    }

    async fn apply(
        &self,
        user: UserId,
        origin: SessionId,
        writes: &[RemoteWrite],
    ) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            self.writes_rejected.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("writes disabled".into()));
        }
        self.inner.apply(user, origin, writes).await?;
        self.writes_applied.fetch_add(1, Ordering::SeqCst);
        let delay = self.ack_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(())
    }

    fn subscribe(&self, user: UserId) -> Subscription {
        self.inner.subscribe(user)
    }
}
