//! Background persistence. Each session owns one writer task that applies
//! batches to the store strictly in the order they were issued and reports
//! every outcome back to the engine.

use std::sync::Arc;

use tokio::sync::mpsc;

use questlog_core::{SessionId, UserId};
use questlog_storage::{EntityRef, RemoteStore, RemoteWrite, StorageError};

use crate::pending::Ticket;

#[derive(Debug)]
pub(crate) struct WriteJob {
    pub ticket: Ticket,
    pub op: &'static str,
    pub writes: Vec<RemoteWrite>,
}

#[derive(Debug)]
pub(crate) struct WriteOutcome {
    pub ticket: Ticket,
    pub result: Result<(), StorageError>,
}

pub(crate) fn spawn_writer(
    store: Arc<dyn RemoteStore>,
    user: UserId,
    session: SessionId,
) -> (
    mpsc::UnboundedSender<WriteJob>,
    mpsc::UnboundedReceiver<WriteOutcome>,
) {
    let (job_tx, mut job_rx) = mpsc::unbounded_channel::<WriteJob>();
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(job) = job_rx.recv().await {
            let result = store.apply(user, session, &job.writes).await;
            match &result {
                Ok(()) => tracing::debug!(ticket = job.ticket, op = job.op, "remote write landed"),
                Err(error) => {
                    tracing::warn!(ticket = job.ticket, op = job.op, %error, "remote write failed");
                }
            }
            if outcome_tx
                .send(WriteOutcome {
                    ticket: job.ticket,
                    result,
                })
                .is_err()
            {
                break;
            }
        }
        tracing::debug!(%session, "writer exiting");
    });

    (job_tx, outcome_rx)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A failed write was rolled back to the store's value.
    Reloaded(EntityRef),
    /// A failed write could not be rolled back either; local state for this
    /// entity is not saved.
    Unsaved(EntityRef),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: Vec<SyncOutcome>,
    /// Entities refreshed from other sessions' changes.
    pub merged: Vec<EntityRef>,
    pub failed_writes: usize,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed_writes == 0 && self.outcomes.is_empty()
    }

    pub fn reloaded(&self) -> impl Iterator<Item = &EntityRef> {
        self.outcomes.iter().filter_map(|o| match o {
            SyncOutcome::Reloaded(e) => Some(e),
            SyncOutcome::Unsaved(_) => None,
        })
    }

    pub fn unsaved(&self) -> impl Iterator<Item = &EntityRef> {
        self.outcomes.iter().filter_map(|o| match o {
            SyncOutcome::Unsaved(e) => Some(e),
            SyncOutcome::Reloaded(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Clean,
    /// Writes in flight or reloads queued.
    Pending(usize),
    /// Local changes to these entities were not saved.
    Stale(Vec<EntityRef>),
}
