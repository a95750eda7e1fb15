//! Per-(date, slot) state machine:
//! `Unassigned -> Assigned -> {Completed | Skipped}`, with both resolved
//! states terminal. XP effects of resolving a slot are booked here too.

use chrono::{DateTime, NaiveDate, Utc};

use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::ids::*;
use crate::leveling::{apply_penalty, signed};
use crate::model::SlotState;
use crate::state::GameState;

/// Result of a successful completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub xp_awarded: u64,
    /// Part of `xp_awarded` granted for filling the day's capacity.
    pub bonus: u64,
    pub total_xp: u64,
    pub level_before: u32,
    pub level_after: u32,
    pub streak: u32,
}

impl Completion {
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

/// Result of a penalized action (skip or quit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Penalty {
    /// Nominal penalty booked on the day ledger.
    pub penalty: u64,
    /// What was actually removed from the balance after flooring at zero.
    pub deducted: u64,
    pub total_xp: u64,
    pub level: u32,
}

impl GameState {
    pub fn assign_task(
        &mut self,
        catalog: &Catalog,
        date: NaiveDate,
        slot_id: &SlotId,
        task_id: TaskId,
    ) -> Result<(), CoreError> {
        catalog.require_task_slot(slot_id)?;
        self.require_task(task_id)?;
        if self.slot_state(date, slot_id).is_terminal() {
            return Err(CoreError::SlotResolved {
                date,
                slot_id: slot_id.clone(),
            });
        }
        self.day_mut(catalog, date)
            .set_slot_state(slot_id, SlotState::Assigned(task_id));
        Ok(())
    }

    /// Unbind an assigned slot. Returns the task that was bound.
    pub fn remove_assignment(
        &mut self,
        catalog: &Catalog,
        date: NaiveDate,
        slot_id: &SlotId,
    ) -> Result<TaskId, CoreError> {
        catalog.require_task_slot(slot_id)?;
        match self.slot_state(date, slot_id) {
            SlotState::Unassigned => Err(CoreError::SlotUnassigned {
                date,
                slot_id: slot_id.clone(),
            }),
            SlotState::Completed(_) | SlotState::Skipped(_) => Err(CoreError::SlotResolved {
                date,
                slot_id: slot_id.clone(),
            }),
            SlotState::Assigned(task_id) => {
                self.day_mut(catalog, date)
                    .set_slot_state(slot_id, SlotState::Unassigned);
                Ok(task_id)
            }
        }
    }

    /// Check that `slot_id` on `date` is a task slot currently bound to
    /// `task_id` and not yet resolved.
    fn require_resolvable(
        &self,
        catalog: &Catalog,
        date: NaiveDate,
        slot_id: &SlotId,
        task_id: TaskId,
    ) -> Result<(), CoreError> {
        catalog.require_task_slot(slot_id)?;
        self.require_task(task_id)?;
        match self.slot_state(date, slot_id) {
            SlotState::Unassigned => Err(CoreError::SlotUnassigned {
                date,
                slot_id: slot_id.clone(),
            }),
            SlotState::Completed(_) | SlotState::Skipped(_) => Err(CoreError::SlotResolved {
                date,
                slot_id: slot_id.clone(),
            }),
            SlotState::Assigned(bound) if bound != task_id => Err(CoreError::TaskMismatch {
                date,
                slot_id: slot_id.clone(),
                bound,
                requested: task_id,
            }),
            SlotState::Assigned(_) => Ok(()),
        }
    }

    pub fn complete_task(
        &mut self,
        catalog: &Catalog,
        task_id: TaskId,
        slot_id: &SlotId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Completion, CoreError> {
        self.require_resolvable(catalog, date, slot_id, task_id)?;
        let task_xp = self.require_task(task_id)?.xp_value;
        let level_before = self.progress.current_level;

        let first_of_day = self.opens_streak_day(date);
        let day = self.day_mut(catalog, date);
        let award = catalog
            .rules()
            .completion_award(task_xp, day.completed_tasks, day.total_tasks);
        day.completed_tasks += 1;
        day.xp_earned += signed(award.total());
        day.tasks_completed.push(task_id);
        day.set_slot_state(slot_id, SlotState::Completed(task_id));

        if let Some(task) = self.task_mut(task_id) {
            task.completed = true;
            task.completed_at = Some(now);
        }
        let total_xp = self.progress.total_xp.saturating_add(award.total());
        self.set_total_xp(catalog.levels(), total_xp);
        if first_of_day {
            self.progress.streak += 1;
        }

        Ok(Completion {
            xp_awarded: award.total(),
            bonus: award.bonus,
            total_xp,
            level_before,
            level_after: self.progress.current_level,
            streak: self.progress.streak,
        })
    }

    pub fn skip_task(
        &mut self,
        catalog: &Catalog,
        task_id: TaskId,
        slot_id: &SlotId,
        date: NaiveDate,
    ) -> Result<Penalty, CoreError> {
        self.require_resolvable(catalog, date, slot_id, task_id)?;
        let penalty = catalog.rules().skip_penalty;

        let day = self.day_mut(catalog, date);
        day.xp_earned -= signed(penalty);
        day.tasks_skipped.push(task_id);
        day.set_slot_state(slot_id, SlotState::Skipped(task_id));

        Ok(self.deduct(catalog, penalty))
    }

    /// Penalty for abandoning a task mid-way, independent of any slot.
    pub fn quit_task(
        &mut self,
        catalog: &Catalog,
        task_id: TaskId,
        date: NaiveDate,
    ) -> Result<Penalty, CoreError> {
        self.require_task(task_id)?;
        let penalty = catalog.rules().quit_penalty;

        let day = self.day_mut(catalog, date);
        day.xp_earned -= signed(penalty);
        day.tasks_penalty.push(task_id);

        Ok(self.deduct(catalog, penalty))
    }

    /// Unslotted bonus completion. No per-day limit and no capacity bonus.
    pub fn complete_extra_task(
        &mut self,
        catalog: &Catalog,
        task_id: TaskId,
        date: NaiveDate,
    ) -> Result<Completion, CoreError> {
        let task_xp = self.require_task(task_id)?.xp_value;
        let level_before = self.progress.current_level;

        let first_of_day = self.opens_streak_day(date);
        let day = self.day_mut(catalog, date);
        day.xp_earned += signed(task_xp);
        day.extra_tasks_completed.insert(task_id);

        let total_xp = self.progress.total_xp.saturating_add(task_xp);
        self.set_total_xp(catalog.levels(), total_xp);
        if first_of_day {
            self.progress.streak += 1;
        }

        Ok(Completion {
            xp_awarded: task_xp,
            bonus: 0,
            total_xp,
            level_before,
            level_after: self.progress.current_level,
            streak: self.progress.streak,
        })
    }

    /// Only the first completion booked on the checked-in day moves the
    /// streak; entries for any other date leave it alone.
    fn opens_streak_day(&self, date: NaiveDate) -> bool {
        date == self.progress.last_active_date
            && self.day(date).is_none_or(|day| !day.has_completion())
    }

    fn deduct(&mut self, catalog: &Catalog, penalty: u64) -> Penalty {
        let before = self.progress.total_xp;
        let total_xp = apply_penalty(before, penalty);
        self.set_total_xp(catalog.levels(), total_xp);
        Penalty {
            penalty,
            deducted: before - total_xp,
            total_xp,
            level: self.progress.current_level,
        }
    }
}
