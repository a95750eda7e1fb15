use chrono::NaiveDate;
use thiserror::Error;

use crate::ids::{RewardId, SlotId, TaskId};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("unknown reward: {0}")]
    UnknownReward(RewardId),

    #[error("unknown slot: {0}")]
    UnknownSlot(SlotId),

    #[error("slot {0} does not accept task assignments")]
    NotTaskSlot(SlotId),

    #[error("slot {slot_id} on {date} is already resolved")]
    SlotResolved { date: NaiveDate, slot_id: SlotId },

    #[error("no task assigned to slot {slot_id} on {date}")]
    SlotUnassigned { date: NaiveDate, slot_id: SlotId },

    #[error("slot {slot_id} on {date} is bound to task {bound}, not {requested}")]
    TaskMismatch {
        date: NaiveDate,
        slot_id: SlotId,
        bound: TaskId,
        requested: TaskId,
    },

    #[error("insufficient funds: need {needed} XP, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("reward already purchased: {0}")]
    AlreadyPurchased(RewardId),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl CoreError {
    /// True for caller mistakes rejected before any state was touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownTask(_)
                | Self::UnknownReward(_)
                | Self::UnknownSlot(_)
                | Self::NotTaskSlot(_)
                | Self::SlotResolved { .. }
                | Self::SlotUnassigned { .. }
                | Self::TaskMismatch { .. }
                | Self::AlreadyPurchased(_)
                | Self::InvalidOperation(_)
        )
    }
}
