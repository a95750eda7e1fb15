use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Easy" => Some(Self::Easy),
            "Medium" => Some(Self::Medium),
            "Hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskCategory {
    #[serde(rename = "Creative / Art")]
    CreativeArt,
    #[serde(rename = "Craft / Sewing")]
    CraftSewing,
    #[serde(rename = "Writing / Learning")]
    WritingLearning,
    #[serde(rename = "Content / Online")]
    ContentOnline,
    #[serde(rename = "Gaming / Fun")]
    GamingFun,
    #[serde(rename = "Life Skills")]
    LifeSkills,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 6] = [
        Self::CreativeArt,
        Self::CraftSewing,
        Self::WritingLearning,
        Self::ContentOnline,
        Self::GamingFun,
        Self::LifeSkills,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreativeArt => "Creative / Art",
            Self::CraftSewing => "Craft / Sewing",
            Self::WritingLearning => "Writing / Learning",
            Self::ContentOnline => "Content / Online",
            Self::GamingFun => "Gaming / Fun",
            Self::LifeSkills => "Life Skills",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub category: TaskCategory,
    pub difficulty: Difficulty,
    pub xp_value: u64,
    pub notes: Option<String>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Caller-supplied fields for a custom task. The XP value is derived from
/// the difficulty, never supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub category: TaskCategory,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub title: String,
    pub xp_cost: u64,
    pub icon: String,
    pub description: Option<String>,
    pub purchased: bool,
    pub purchased_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReward {
    pub title: String,
    pub xp_cost: u64,
    pub icon: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub level: u32,
    pub title: String,
    pub xp_required: u64,
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Task,
    Meal,
    Break,
    Free,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub id: SlotId,
    pub start_time: String,
    pub end_time: String,
    pub kind: SlotKind,
    pub label: String,
}

impl ScheduleSlot {
    pub fn accepts_tasks(&self) -> bool {
        self.kind == SlotKind::Task
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingKey {
    Sound,
    DarkMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub sound_enabled: bool,
    pub dark_mode: bool,
    pub daily_start_time: String,
    pub daily_end_time: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            dark_mode: false,
            daily_start_time: "09:30".into(),
            daily_end_time: "16:30".into(),
        }
    }
}

impl Settings {
    /// Flip a boolean setting and return its new value.
    pub fn toggle(&mut self, key: SettingKey) -> bool {
        let flag = match key {
            SettingKey::Sound => &mut self.sound_enabled,
            SettingKey::DarkMode => &mut self.dark_mode,
        };
        *flag = !*flag;
        *flag
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyRotation {
    pub week_start: NaiveDate,
    pub selected_tasks: Vec<TaskId>,
}

impl WeeklyRotation {
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            week_start: week_start(today),
            selected_tasks: Vec::new(),
        }
    }
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Where a task-typed slot stands on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotState {
    Unassigned,
    Assigned(TaskId),
    Completed(TaskId),
    Skipped(TaskId),
}

impl SlotState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Skipped(_))
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Unassigned => None,
            Self::Assigned(id) | Self::Completed(id) | Self::Skipped(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub date: NaiveDate,
    pub completed_tasks: u32,
    pub total_tasks: u32,
    /// Net XP booked on this day. Penalties may drive it below zero.
    pub xp_earned: i64,
    pub tasks_completed: Vec<TaskId>,
    pub tasks_skipped: Vec<TaskId>,
    pub tasks_penalty: Vec<TaskId>,
    pub slot_assignments: BTreeMap<SlotId, TaskId>,
    pub slots_completed: BTreeSet<SlotId>,
    pub slots_skipped: BTreeSet<SlotId>,
    pub extra_tasks_completed: BTreeSet<TaskId>,
}

impl DailyProgress {
    pub fn new(date: NaiveDate, total_tasks: u32) -> Self {
        Self {
            date,
            completed_tasks: 0,
            total_tasks,
            xp_earned: 0,
            tasks_completed: Vec::new(),
            tasks_skipped: Vec::new(),
            tasks_penalty: Vec::new(),
            slot_assignments: BTreeMap::new(),
            slots_completed: BTreeSet::new(),
            slots_skipped: BTreeSet::new(),
            extra_tasks_completed: BTreeSet::new(),
        }
    }

    pub fn slot_state(&self, slot_id: &SlotId) -> SlotState {
        match self.slot_assignments.get(slot_id) {
            None => SlotState::Unassigned,
            Some(task_id) if self.slots_completed.contains(slot_id) => SlotState::Completed(*task_id),
            Some(task_id) if self.slots_skipped.contains(slot_id) => SlotState::Skipped(*task_id),
            Some(task_id) => SlotState::Assigned(*task_id),
        }
    }

    /// Overwrite one slot's binding and terminal markers in a single step.
    pub fn set_slot_state(&mut self, slot_id: &SlotId, state: SlotState) {
        self.slots_completed.remove(slot_id);
        self.slots_skipped.remove(slot_id);
        match state {
            SlotState::Unassigned => {
                self.slot_assignments.remove(slot_id);
            }
            SlotState::Assigned(task_id) => {
                self.slot_assignments.insert(slot_id.clone(), task_id);
            }
            SlotState::Completed(task_id) => {
                self.slot_assignments.insert(slot_id.clone(), task_id);
                self.slots_completed.insert(slot_id.clone());
            }
            SlotState::Skipped(task_id) => {
                self.slot_assignments.insert(slot_id.clone(), task_id);
                self.slots_skipped.insert(slot_id.clone());
            }
        }
    }

    /// True once anything counting towards the streak happened on this day.
    pub fn has_completion(&self) -> bool {
        self.completed_tasks > 0 || !self.extra_tasks_completed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub total_xp: u64,
    pub current_level: u32,
    pub streak: u32,
    pub last_active_date: NaiveDate,
    pub profile_icon: Option<String>,
    pub weekly_progress: BTreeMap<NaiveDate, DailyProgress>,
}

impl UserProgress {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            total_xp: 0,
            current_level: 1,
            streak: 0,
            last_active_date: today,
            profile_icon: None,
            weekly_progress: BTreeMap::new(),
        }
    }
}
