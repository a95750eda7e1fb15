use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::ids::*;
use crate::leveling::LevelTable;
use crate::model::*;

/// The full per-account game state: progress ledger plus the task and reward
/// registries and the account's preferences.
///
/// Every mutating method validates first and only then touches fields, so a
/// returned error always means the state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub progress: UserProgress,
    pub tasks: Vec<Task>,
    pub rewards: Vec<Reward>,
    pub settings: Settings,
    pub rotation: WeeklyRotation,
}

impl GameState {
    /// Fresh account state seeded from the catalog templates.
    pub fn provision(catalog: &Catalog, today: NaiveDate) -> Self {
        let rules = catalog.rules();
        let tasks = catalog
            .task_templates()
            .iter()
            .map(|t| new_task(t.clone(), rules.xp_for(t.difficulty)))
            .collect();
        let rewards = catalog
            .reward_templates()
            .iter()
            .map(|r| new_reward(r.clone()))
            .collect();
        Self {
            progress: UserProgress::new(today),
            tasks,
            rewards,
            settings: Settings::default(),
            rotation: WeeklyRotation::empty(today),
        }
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub(crate) fn task_mut(&mut self, task_id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    pub(crate) fn require_task(&self, task_id: TaskId) -> Result<&Task, CoreError> {
        self.task(task_id).ok_or(CoreError::UnknownTask(task_id))
    }

    pub fn reward(&self, reward_id: RewardId) -> Option<&Reward> {
        self.rewards.iter().find(|r| r.id == reward_id)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DailyProgress> {
        self.progress.weekly_progress.get(&date)
    }

    /// The day's record, or an empty one with the catalog's capacity.
    /// Never inserts.
    pub fn day_or_empty(&self, catalog: &Catalog, date: NaiveDate) -> DailyProgress {
        self.day(date)
            .cloned()
            .unwrap_or_else(|| DailyProgress::new(date, catalog.daily_capacity()))
    }

    /// The day's record, created on first mutation.
    pub(crate) fn day_mut(&mut self, catalog: &Catalog, date: NaiveDate) -> &mut DailyProgress {
        self.progress
            .weekly_progress
            .entry(date)
            .or_insert_with(|| DailyProgress::new(date, catalog.daily_capacity()))
    }

    pub fn slot_state(&self, date: NaiveDate, slot_id: &SlotId) -> SlotState {
        self.day(date)
            .map_or(SlotState::Unassigned, |d| d.slot_state(slot_id))
    }

    /// Set the balance and re-derive the level from it.
    pub fn set_total_xp(&mut self, levels: &LevelTable, total_xp: u64) {
        self.progress.total_xp = total_xp;
        self.recompute_level(levels);
    }

    /// Returns true when the stored level disagreed with the balance.
    pub fn recompute_level(&mut self, levels: &LevelTable) -> bool {
        let level = levels.level_for(self.progress.total_xp);
        let changed = level != self.progress.current_level;
        self.progress.current_level = level;
        changed
    }

    // ========================================================================
    // Task registry
    // ========================================================================

    pub fn add_custom_task(&mut self, catalog: &Catalog, task: NewTask) -> Result<TaskId, CoreError> {
        if task.title.trim().is_empty() {
            return Err(CoreError::InvalidOperation("task title is empty".into()));
        }
        let xp_value = catalog.rules().xp_for(task.difficulty);
        let task = new_task(task, xp_value);
        let id = task.id;
        self.tasks.push(task);
        Ok(id)
    }

    /// Remove a task. Credited history is left alone; open (non-terminal)
    /// assignments of the task are released so nothing points at it.
    pub fn delete_task(&mut self, task_id: TaskId) -> Result<DeletedTask, CoreError> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or(CoreError::UnknownTask(task_id))?;
        let task = self.tasks.remove(index);

        let mut released = Vec::new();
        for (date, day) in self.progress.weekly_progress.iter_mut() {
            let open: Vec<SlotId> = day
                .slot_assignments
                .iter()
                .filter(|(slot_id, bound)| {
                    **bound == task_id && !day.slot_state(slot_id).is_terminal()
                })
                .map(|(slot_id, _)| slot_id.clone())
                .collect();
            for slot_id in open {
                day.set_slot_state(&slot_id, SlotState::Unassigned);
                released.push((*date, slot_id));
            }
        }
        self.rotation.selected_tasks.retain(|id| *id != task_id);

        Ok(DeletedTask { task, released })
    }

    // ========================================================================
    // Reward registry
    // ========================================================================

    pub fn add_custom_reward(&mut self, reward: NewReward) -> Result<RewardId, CoreError> {
        if reward.title.trim().is_empty() {
            return Err(CoreError::InvalidOperation("reward title is empty".into()));
        }
        if reward.xp_cost == 0 {
            return Err(CoreError::InvalidOperation("reward cost must be positive".into()));
        }
        let reward = new_reward(reward);
        let id = reward.id;
        self.rewards.push(reward);
        Ok(id)
    }

    /// Remove a reward. Purchased rewards are not refunded.
    pub fn delete_reward(&mut self, reward_id: RewardId) -> Result<Reward, CoreError> {
        let index = self
            .rewards
            .iter()
            .position(|r| r.id == reward_id)
            .ok_or(CoreError::UnknownReward(reward_id))?;
        Ok(self.rewards.remove(index))
    }

    // ========================================================================
    // Preferences
    // ========================================================================

    pub fn toggle_setting(&mut self, key: SettingKey) -> bool {
        self.settings.toggle(key)
    }

    pub fn set_profile_icon(&mut self, icon: Option<String>) {
        self.progress.profile_icon = icon;
    }

    pub fn select_weekly_tasks(
        &mut self,
        task_ids: Vec<TaskId>,
        today: NaiveDate,
    ) -> Result<(), CoreError> {
        if let Some(missing) = task_ids.iter().find(|id| self.task(**id).is_none()) {
            return Err(CoreError::UnknownTask(*missing));
        }
        self.rotation = WeeklyRotation {
            week_start: week_start(today),
            selected_tasks: task_ids,
        };
        Ok(())
    }
}

/// Outcome of `delete_task`: the removed task and the (date, slot) pairs
/// whose open assignment was released.
#[derive(Debug, Clone)]
pub struct DeletedTask {
    pub task: Task,
    pub released: Vec<(NaiveDate, SlotId)>,
}

fn new_task(template: NewTask, xp_value: u64) -> Task {
    Task {
        id: TaskId::new(),
        title: template.title,
        category: template.category,
        difficulty: template.difficulty,
        xp_value,
        notes: template.notes,
        completed: false,
        completed_at: None,
    }
}

fn new_reward(template: NewReward) -> Reward {
    Reward {
        id: RewardId::new(),
        title: template.title,
        xp_cost: template.xp_cost,
        icon: template.icon,
        description: template.description,
        purchased: false,
        purchased_at: None,
    }
}
