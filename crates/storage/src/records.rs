//! Remote-side shapes of the game state. Each record is one independently
//! keyed row at the store; `RemoteWrite` is the unit a mutation is persisted
//! as, and `EntityRef` names what a write touched.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use questlog_core::{
    DailyProgress, GameState, Reward, RewardId, Settings, SlotId, SlotState, Task, TaskId,
    UserProgress, WeeklyRotation,
};

/// Key-value profile ledger: balance, streak and account preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub total_xp: u64,
    pub current_level: u32,
    pub streak: u32,
    pub last_active_date: NaiveDate,
    pub profile_icon: Option<String>,
    pub settings: Settings,
    pub rotation: WeeklyRotation,
}

impl ProfileRecord {
    pub fn from_state(state: &GameState) -> Self {
        Self {
            total_xp: state.progress.total_xp,
            current_level: state.progress.current_level,
            streak: state.progress.streak,
            last_active_date: state.progress.last_active_date,
            profile_icon: state.progress.profile_icon.clone(),
            settings: state.settings.clone(),
            rotation: state.rotation.clone(),
        }
    }

    /// Overwrite the profile fields of `state`, leaving day records and
    /// registries alone.
    pub fn apply_to(self, state: &mut GameState) {
        state.progress.total_xp = self.total_xp;
        state.progress.current_level = self.current_level;
        state.progress.streak = self.streak;
        state.progress.last_active_date = self.last_active_date;
        state.progress.profile_icon = self.profile_icon;
        state.settings = self.settings;
        state.rotation = self.rotation;
    }
}

/// Per-(user, date) counters and ledgers. Slot bindings live in
/// `SlotRecord`s under their own composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub completed_tasks: u32,
    pub total_tasks: u32,
    pub xp_earned: i64,
    pub tasks_completed: Vec<TaskId>,
    pub tasks_skipped: Vec<TaskId>,
    pub tasks_penalty: Vec<TaskId>,
    pub extra_tasks_completed: BTreeSet<TaskId>,
}

impl From<&DailyProgress> for DayRecord {
    fn from(day: &DailyProgress) -> Self {
        Self {
            date: day.date,
            completed_tasks: day.completed_tasks,
            total_tasks: day.total_tasks,
            xp_earned: day.xp_earned,
            tasks_completed: day.tasks_completed.clone(),
            tasks_skipped: day.tasks_skipped.clone(),
            tasks_penalty: day.tasks_penalty.clone(),
            extra_tasks_completed: day.extra_tasks_completed.clone(),
        }
    }
}

impl DayRecord {
    /// Overwrite the counters of `day`, keeping its slot bindings.
    pub fn apply_to(self, day: &mut DailyProgress) {
        day.completed_tasks = self.completed_tasks;
        day.total_tasks = self.total_tasks;
        day.xp_earned = self.xp_earned;
        day.tasks_completed = self.tasks_completed;
        day.tasks_skipped = self.tasks_skipped;
        day.tasks_penalty = self.tasks_penalty;
        day.extra_tasks_completed = self.extra_tasks_completed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Assigned,
    Completed,
    Skipped,
}

/// One (user, date, slot) binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub date: NaiveDate,
    pub slot_id: SlotId,
    pub task_id: TaskId,
    pub status: SlotStatus,
}

impl SlotRecord {
    /// The record for one slot of `day`, or `None` when it is unassigned.
    pub fn from_day(day: &DailyProgress, slot_id: &SlotId) -> Option<Self> {
        let (task_id, status) = match day.slot_state(slot_id) {
            SlotState::Unassigned => return None,
            SlotState::Assigned(id) => (id, SlotStatus::Assigned),
            SlotState::Completed(id) => (id, SlotStatus::Completed),
            SlotState::Skipped(id) => (id, SlotStatus::Skipped),
        };
        Some(Self {
            date: day.date,
            slot_id: slot_id.clone(),
            task_id,
            status,
        })
    }

    pub fn state(&self) -> SlotState {
        match self.status {
            SlotStatus::Assigned => SlotState::Assigned(self.task_id),
            SlotStatus::Completed => SlotState::Completed(self.task_id),
            SlotStatus::Skipped => SlotState::Skipped(self.task_id),
        }
    }
}

/// Everything the store holds for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub profile: ProfileRecord,
    pub days: Vec<DayRecord>,
    pub slots: Vec<SlotRecord>,
    pub tasks: Vec<Task>,
    pub rewards: Vec<Reward>,
}

impl Snapshot {
    pub fn from_state(state: &GameState) -> Self {
        let days = state
            .progress
            .weekly_progress
            .values()
            .map(DayRecord::from)
            .collect();
        let slots = state
            .progress
            .weekly_progress
            .values()
            .flat_map(|day| {
                day.slot_assignments
                    .keys()
                    .filter_map(move |slot_id| SlotRecord::from_day(day, slot_id))
            })
            .collect();
        Self {
            profile: ProfileRecord::from_state(state),
            days,
            slots,
            tasks: state.tasks.clone(),
            rewards: state.rewards.clone(),
        }
    }

    /// Assemble in-memory state. Slots stored for a date without a day record
    /// get an empty day with `capacity`.
    pub fn into_state(self, capacity: u32) -> GameState {
        let mut weekly_progress: BTreeMap<NaiveDate, DailyProgress> = BTreeMap::new();
        for record in self.days {
            let mut day = DailyProgress::new(record.date, record.total_tasks);
            record.apply_to(&mut day);
            weekly_progress.insert(day.date, day);
        }
        for slot in self.slots {
            weekly_progress
                .entry(slot.date)
                .or_insert_with(|| DailyProgress::new(slot.date, capacity))
                .set_slot_state(&slot.slot_id, slot.state());
        }

        let profile = self.profile;
        GameState {
            progress: UserProgress {
                total_xp: profile.total_xp,
                current_level: profile.current_level,
                streak: profile.streak,
                last_active_date: profile.last_active_date,
                profile_icon: profile.profile_icon,
                weekly_progress,
            },
            tasks: self.tasks,
            rewards: self.rewards,
            settings: profile.settings,
            rotation: profile.rotation,
        }
    }
}

/// The remote entity a write touches, and the unit of reload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Profile,
    Day(NaiveDate),
    Slot(NaiveDate, SlotId),
    Task(TaskId),
    Reward(RewardId),
    /// The whole account (provisioning and reset).
    Account,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteWrite {
    SetProfile(ProfileRecord),
    UpsertDay(DayRecord),
    UpsertSlot(SlotRecord),
    DeleteSlot { date: NaiveDate, slot_id: SlotId },
    UpsertTask(Task),
    DeleteTask(TaskId),
    UpsertReward(Reward),
    DeleteReward(RewardId),
    ReplaceAccount(Box<Snapshot>),
}

impl RemoteWrite {
    pub fn entity(&self) -> EntityRef {
        match self {
            Self::SetProfile(_) => EntityRef::Profile,
            Self::UpsertDay(day) => EntityRef::Day(day.date),
            Self::UpsertSlot(slot) => EntityRef::Slot(slot.date, slot.slot_id.clone()),
            Self::DeleteSlot { date, slot_id } => EntityRef::Slot(*date, slot_id.clone()),
            Self::UpsertTask(task) => EntityRef::Task(task.id),
            Self::DeleteTask(id) => EntityRef::Task(*id),
            Self::UpsertReward(reward) => EntityRef::Reward(reward.id),
            Self::DeleteReward(id) => EntityRef::Reward(*id),
            Self::ReplaceAccount(_) => EntityRef::Account,
        }
    }

    pub fn op_type_name(&self) -> &'static str {
        match self {
            Self::SetProfile(_) => "set_profile",
            Self::UpsertDay(_) => "upsert_day",
            Self::UpsertSlot(_) => "upsert_slot",
            Self::DeleteSlot { .. } => "delete_slot",
            Self::UpsertTask(_) => "upsert_task",
            Self::DeleteTask(_) => "delete_task",
            Self::UpsertReward(_) => "upsert_reward",
            Self::DeleteReward(_) => "delete_reward",
            Self::ReplaceAccount(_) => "replace_account",
        }
    }
}

/// Current remote value of one entity, as returned by a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRecord {
    Profile(ProfileRecord),
    Day(DayRecord),
    Slot(SlotRecord),
    Task(Task),
    Reward(Reward),
    Account(Box<Snapshot>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use questlog_core::Catalog;

    #[test]
    fn snapshot_reassembles_state() {
        let catalog = Catalog::builtin();
        let today = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let mut state = GameState::provision(&catalog, today);
        let a = state.tasks[0].id;
        let b = state.tasks[1].id;
        let s1 = SlotId::from("task1");
        let s2 = SlotId::from("task2");
        state.assign_task(&catalog, today, &s1, a).unwrap();
        state.assign_task(&catalog, today, &s2, b).unwrap();
        state.complete_task(&catalog, a, &s1, today, Utc::now()).unwrap();
        state.quit_task(&catalog, b, today).unwrap();

        let snapshot = Snapshot::from_state(&state);
        assert_eq!(snapshot.days.len(), 1);
        assert_eq!(snapshot.slots.len(), 2);
        assert_eq!(snapshot.into_state(catalog.daily_capacity()), state);
    }

    #[test]
    fn slot_record_reflects_terminal_state() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let mut day = DailyProgress::new(date, 4);
        let slot = SlotId::from("task1");
        let task = TaskId::new();
        assert!(SlotRecord::from_day(&day, &slot).is_none());

        day.set_slot_state(&slot, SlotState::Skipped(task));
        let record = SlotRecord::from_day(&day, &slot).unwrap();
        assert_eq!(record.status, SlotStatus::Skipped);
        assert_eq!(record.state(), SlotState::Skipped(task));
    }

    #[test]
    fn writes_name_their_entity() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let write = RemoteWrite::DeleteSlot {
            date,
            slot_id: SlotId::from("task4"),
        };
        assert_eq!(write.entity(), EntityRef::Slot(date, SlotId::from("task4")));
        assert_eq!(write.op_type_name(), "delete_slot");
    }
}
