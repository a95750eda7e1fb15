use chrono::{DateTime, Utc};

use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::ids::RewardId;
use crate::state::GameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purchase {
    pub reward_id: RewardId,
    pub cost: u64,
    pub total_xp: u64,
    pub level: u32,
}

impl GameState {
    /// Debit a reward's cost and mark it purchased. Any failure leaves the
    /// balance and the reward untouched.
    pub fn purchase_reward(
        &mut self,
        catalog: &Catalog,
        reward_id: RewardId,
        now: DateTime<Utc>,
    ) -> Result<Purchase, CoreError> {
        let reward = self
            .reward(reward_id)
            .ok_or(CoreError::UnknownReward(reward_id))?;
        if reward.purchased {
            return Err(CoreError::AlreadyPurchased(reward_id));
        }
        let cost = reward.xp_cost;
        let available = self.progress.total_xp;
        if available < cost {
            return Err(CoreError::InsufficientFunds {
                needed: cost,
                available,
            });
        }

        if let Some(reward) = self.rewards.iter_mut().find(|r| r.id == reward_id) {
            reward.purchased = true;
            reward.purchased_at = Some(now);
        }
        self.set_total_xp(catalog.levels(), available - cost);

        Ok(Purchase {
            reward_id,
            cost,
            total_xp: self.progress.total_xp,
            level: self.progress.current_level,
        })
    }
}
