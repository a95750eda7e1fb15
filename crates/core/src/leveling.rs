//! Level thresholds and XP arithmetic. Everything here is a pure function of
//! the level table and the rule constants.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Difficulty, Level};

/// Validated, ascending level table. Level 1 always requires 0 XP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LevelTable {
    levels: Vec<Level>,
}

impl LevelTable {
    pub fn new(levels: Vec<Level>) -> Result<Self, CoreError> {
        let first = levels
            .first()
            .ok_or_else(|| CoreError::Configuration("level table is empty".into()))?;
        if first.level != 1 || first.xp_required != 0 {
            return Err(CoreError::Configuration(
                "level table must start at level 1 with 0 XP required".into(),
            ));
        }
        for pair in levels.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.level != prev.level + 1 {
                return Err(CoreError::Configuration(format!(
                    "level {} follows level {}; levels must be consecutive",
                    next.level, prev.level
                )));
            }
            if next.xp_required <= prev.xp_required {
                return Err(CoreError::Configuration(format!(
                    "level {} requires {} XP, not above level {} ({} XP)",
                    next.level, next.xp_required, prev.level, prev.xp_required
                )));
            }
        }
        Ok(Self { levels })
    }

    /// Skip validation for tables known to be well formed (the built-in one).
    pub(crate) fn trusted(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn max_level(&self) -> u32 {
        // Validated non-empty in `new`.
        self.levels.last().map_or(1, |l| l.level)
    }

    pub fn get(&self, level: u32) -> Option<&Level> {
        self.levels.iter().find(|l| l.level == level)
    }

    /// Highest level whose threshold is at or below `total_xp`.
    pub fn level_for(&self, total_xp: u64) -> u32 {
        self.levels
            .iter()
            .take_while(|l| l.xp_required <= total_xp)
            .last()
            .map_or(1, |l| l.level)
    }

    /// Threshold for `level`. Levels past the table report the top threshold.
    pub fn xp_for_level(&self, level: u32) -> u64 {
        match self.get(level) {
            Some(l) => l.xp_required,
            None if level < 1 => 0,
            None => self.levels.last().map_or(0, |l| l.xp_required),
        }
    }

    /// Percentage (0..=100) of the way from `current_level` to the next one.
    /// Returns `None` at max level, where there is no next threshold.
    pub fn progress_to_next_level(&self, total_xp: u64, current_level: u32) -> Option<f64> {
        if current_level >= self.max_level() {
            return None;
        }
        let floor = self.xp_for_level(current_level);
        let ceiling = self.xp_for_level(current_level + 1);
        let span = ceiling.saturating_sub(floor);
        if span == 0 {
            return None;
        }
        let into = total_xp.saturating_sub(floor) as f64;
        Some((into / span as f64 * 100.0).clamp(0.0, 100.0))
    }
}

/// Fixed XP constants. Penalties are magnitudes; they are subtracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XpRules {
    pub easy_task_xp: u64,
    pub medium_task_xp: u64,
    pub hard_task_xp: u64,
    pub all_tasks_bonus: u64,
    pub skip_penalty: u64,
    pub quit_penalty: u64,
}

impl Default for XpRules {
    fn default() -> Self {
        Self {
            easy_task_xp: 15,
            medium_task_xp: 20,
            hard_task_xp: 20,
            all_tasks_bonus: 25,
            skip_penalty: 5,
            quit_penalty: 10,
        }
    }
}

impl XpRules {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.easy_task_xp == 0 || self.medium_task_xp == 0 || self.hard_task_xp == 0 {
            return Err(CoreError::Configuration("task XP values must be positive".into()));
        }
        Ok(())
    }

    pub fn xp_for(&self, difficulty: Difficulty) -> u64 {
        match difficulty {
            Difficulty::Easy => self.easy_task_xp,
            Difficulty::Medium => self.medium_task_xp,
            Difficulty::Hard => self.hard_task_xp,
        }
    }

    /// XP granted for a slot completion: the task's own value plus the
    /// capacity bonus when this completion is the one that fills the day.
    pub fn completion_award(&self, task_xp: u64, completed_before: u32, capacity: u32) -> XpAward {
        let bonus = if completed_before + 1 == capacity {
            self.all_tasks_bonus
        } else {
            0
        };
        XpAward { base: task_xp, bonus }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpAward {
    pub base: u64,
    pub bonus: u64,
}

impl XpAward {
    pub fn total(&self) -> u64 {
        self.base + self.bonus
    }
}

/// Subtract a penalty from a balance, flooring at zero.
pub fn apply_penalty(total_xp: u64, penalty: u64) -> u64 {
    total_xp.saturating_sub(penalty)
}

/// Signed ledger amount for a day record.
pub fn signed(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}
