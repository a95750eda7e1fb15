//! Static seed data read once at provisioning: task and reward templates,
//! the level table, the daily schedule template and the XP rules.

use std::collections::HashSet;

use chrono::NaiveTime;
use serde::Deserialize;

use crate::error::CoreError;
use crate::ids::SlotId;
use crate::leveling::{LevelTable, XpRules};
use crate::model::*;

#[derive(Debug, Clone)]
pub struct Catalog {
    levels: LevelTable,
    schedule: Vec<ScheduleSlot>,
    tasks: Vec<NewTask>,
    rewards: Vec<NewReward>,
    rules: XpRules,
}

#[derive(Deserialize)]
struct CatalogFile {
    levels: Vec<Level>,
    schedule: Vec<ScheduleSlot>,
    #[serde(default)]
    tasks: Vec<NewTask>,
    #[serde(default)]
    rewards: Vec<NewReward>,
    #[serde(default)]
    rules: XpRules,
}

impl Catalog {
    pub fn new(
        levels: Vec<Level>,
        schedule: Vec<ScheduleSlot>,
        tasks: Vec<NewTask>,
        rewards: Vec<NewReward>,
        rules: XpRules,
    ) -> Result<Self, CoreError> {
        let levels = LevelTable::new(levels)?;
        validate_schedule(&schedule)?;
        rules.validate()?;
        if let Some(r) = rewards.iter().find(|r| r.xp_cost == 0) {
            return Err(CoreError::Configuration(format!(
                "reward template {:?} has a zero cost",
                r.title
            )));
        }
        Ok(Self {
            levels,
            schedule,
            tasks,
            rewards,
            rules,
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self, CoreError> {
        let file: CatalogFile =
            toml::from_str(s).map_err(|e| CoreError::Configuration(e.to_string()))?;
        Self::new(file.levels, file.schedule, file.tasks, file.rewards, file.rules)
    }

    pub fn levels(&self) -> &LevelTable {
        &self.levels
    }

    pub fn schedule(&self) -> &[ScheduleSlot] {
        &self.schedule
    }

    pub fn task_templates(&self) -> &[NewTask] {
        &self.tasks
    }

    pub fn reward_templates(&self) -> &[NewReward] {
        &self.rewards
    }

    pub fn rules(&self) -> &XpRules {
        &self.rules
    }

    pub fn slot(&self, slot_id: &SlotId) -> Option<&ScheduleSlot> {
        self.schedule.iter().find(|s| &s.id == slot_id)
    }

    pub fn task_slots(&self) -> impl Iterator<Item = &ScheduleSlot> {
        self.schedule.iter().filter(|s| s.accepts_tasks())
    }

    /// Number of task-typed slots, i.e. a day's `total_tasks`.
    pub fn daily_capacity(&self) -> u32 {
        self.task_slots().count() as u32
    }

    /// Resolve a slot id to a task-typed slot or explain why it is not one.
    pub fn require_task_slot(&self, slot_id: &SlotId) -> Result<&ScheduleSlot, CoreError> {
        let slot = self
            .slot(slot_id)
            .ok_or_else(|| CoreError::UnknownSlot(slot_id.clone()))?;
        if !slot.accepts_tasks() {
            return Err(CoreError::NotTaskSlot(slot_id.clone()));
        }
        Ok(slot)
    }

    /// The template shipped with the application.
    pub fn builtin() -> Self {
        let levels = vec![
            level(1, "New Adventurer", 0, "🌱"),
            level(2, "Hobbyist", 100, "🎯"),
            level(3, "Creator", 250, "✨"),
            level(4, "Artisan", 500, "🎨"),
            level(5, "Master Crafter", 900, "👑"),
        ];
        let schedule = vec![
            slot("breakfast", "09:30", "10:30", SlotKind::Meal, "Breakfast"),
            slot("task1", "10:30", "11:30", SlotKind::Task, "Task Slot 1"),
            slot("task2", "11:30", "12:30", SlotKind::Task, "Task Slot 2"),
            slot("lunch", "12:30", "13:30", SlotKind::Meal, "Lunch"),
            slot("task3", "13:30", "15:00", SlotKind::Task, "Task Slot 3"),
            slot("task4", "15:00", "16:00", SlotKind::Task, "Task Slot 4"),
            slot("winddown", "16:00", "16:30", SlotKind::Free, "Wind-down"),
        ];

        use Difficulty::*;
        use TaskCategory::*;
        let tasks = vec![
            task("Draw small animals", CreativeArt, Easy),
            task("Learn how to draw", CreativeArt, Medium),
            task("Paint baby drawings", CreativeArt, Easy),
            task("Keychains", CreativeArt, Medium),
            task("Bookbinding", CreativeArt, Hard),
            task("Sew a plush", CreativeArt, Hard),
            task("Crochet", CraftSewing, Medium),
            task("Mend clothes", CraftSewing, Easy),
            task("Write the book", WritingLearning, Hard),
            task("Book notebook", WritingLearning, Medium),
            task("Read", WritingLearning, Easy),
            task("Learn to be a DM", WritingLearning, Hard),
            task("Post pins & edit", ContentOnline, Medium),
            task("Clean YouTube playlist", ContentOnline, Easy),
            task("Play a favourite game", GamingFun, Easy),
            task("Cooking", LifeSkills, Medium),
        ];

        let rewards = vec![
            reward("Guilt-free binge session", 50, "📺", "Watch shows without any guilt!"),
            reward("Play one more game", 75, "🎮", "Extra gaming session unlocked!"),
            reward("Order food", 120, "🍕", "Treat yourself to a delicious meal"),
            reward("Buy art supplies", 150, "🎨", "Get new materials for your creations"),
            reward("Skip 1 task penalty-free", 200, "✨", "Take a break without losing XP"),
            reward("Big reward fund", 400, "💎", "Save up for something special!"),
        ];

        Self {
            levels: LevelTable::trusted(levels),
            schedule,
            tasks,
            rewards,
            rules: XpRules::default(),
        }
    }
}

fn validate_schedule(schedule: &[ScheduleSlot]) -> Result<(), CoreError> {
    if schedule.is_empty() {
        return Err(CoreError::Configuration("schedule template is empty".into()));
    }
    let mut seen = HashSet::new();
    for slot in schedule {
        if !seen.insert(&slot.id) {
            return Err(CoreError::Configuration(format!("duplicate slot id {}", slot.id)));
        }
        let start = parse_time(&slot.start_time, &slot.id)?;
        let end = parse_time(&slot.end_time, &slot.id)?;
        if start >= end {
            return Err(CoreError::Configuration(format!(
                "slot {} ends before it starts",
                slot.id
            )));
        }
    }
    if !schedule.iter().any(ScheduleSlot::accepts_tasks) {
        return Err(CoreError::Configuration(
            "schedule template has no task slots".into(),
        ));
    }
    Ok(())
}

fn parse_time(s: &str, slot_id: &SlotId) -> Result<NaiveTime, CoreError> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| {
        CoreError::Configuration(format!("slot {slot_id} has malformed time {s:?}"))
    })
}

fn level(level: u32, title: &str, xp_required: u64, icon: &str) -> Level {
    Level {
        level,
        title: title.into(),
        xp_required,
        icon: icon.into(),
    }
}

fn slot(id: &str, start: &str, end: &str, kind: SlotKind, label: &str) -> ScheduleSlot {
    ScheduleSlot {
        id: SlotId::from(id),
        start_time: start.into(),
        end_time: end.into(),
        kind,
        label: label.into(),
    }
}

fn task(title: &str, category: TaskCategory, difficulty: Difficulty) -> NewTask {
    NewTask {
        title: title.into(),
        category,
        difficulty,
        notes: None,
    }
}

fn reward(title: &str, xp_cost: u64, icon: &str, description: &str) -> NewReward {
    NewReward {
        title: title.into(),
        xp_cost,
        icon: icon.into(),
        description: Some(description.into()),
    }
}
