use async_trait::async_trait;
use tokio::sync::broadcast;

use questlog_core::ids::{SessionId, UserId};

use crate::error::StorageError;
use crate::records::{EntityRef, RemoteRecord, RemoteWrite, Snapshot};

/// Pushed by the store after a batch of writes commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub user: UserId,
    /// Session that issued the writes, so a client can drop its own echoes.
    pub origin: SessionId,
    pub entities: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChange {
    Notice(ChangeNotice),
    /// The subscriber fell behind and `n` notices were dropped. Anything may
    /// have changed.
    Lagged(u64),
}

/// Durable per-user storage with change notification.
///
/// `apply` is all-or-nothing: either every write in the batch lands or none
/// does. Fetching an entity that does not exist returns `Ok(None)`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn load_snapshot(&self, user: UserId) -> Result<Option<Snapshot>, StorageError>;

    async fn fetch(
        &self,
        user: UserId,
        entity: &EntityRef,
    ) -> Result<Option<RemoteRecord>, StorageError>;

    async fn apply(
        &self,
        user: UserId,
        origin: SessionId,
        writes: &[RemoteWrite],
    ) -> Result<(), StorageError>;

    fn subscribe(&self, user: UserId) -> Subscription;
}

/// A user-scoped view of a store's change feed.
pub struct Subscription {
    user: UserId,
    rx: broadcast::Receiver<ChangeNotice>,
}

impl Subscription {
    pub fn new(user: UserId, rx: broadcast::Receiver<ChangeNotice>) -> Self {
        Self { user, rx }
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    /// Next pending change without waiting. `None` when nothing is queued or
    /// the feed has closed.
    pub fn try_next(&mut self) -> Option<RemoteChange> {
        loop {
            match self.rx.try_recv() {
                Ok(notice) if notice.user == self.user => return Some(RemoteChange::Notice(notice)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(RemoteChange::Lagged(n));
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next change. `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<RemoteChange> {
        loop {
            match self.rx.recv().await {
                Ok(notice) if notice.user == self.user => return Some(RemoteChange::Notice(notice)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => return Some(RemoteChange::Lagged(n)),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("user", &self.user).finish()
    }
}
