use chrono::NaiveDate;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::state::GameState;

/// Dashboard numbers for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub streak: u32,
    pub completed_today: u32,
    pub daily_capacity: u32,
    pub xp_today: i64,
    pub total_xp: u64,
    pub weekly_tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelInfo {
    pub level: u32,
    pub title: String,
    pub icon: String,
    pub total_xp: u64,
    /// Threshold of the next level; `None` at max level.
    pub next_level_xp: Option<u64>,
    /// 0..=100, or 100 at max level.
    pub progress: f64,
}

impl GameState {
    pub fn stats(&self, catalog: &Catalog, today: NaiveDate) -> Stats {
        let day = self.day_or_empty(catalog, today);
        Stats {
            streak: self.progress.streak,
            completed_today: day.completed_tasks,
            daily_capacity: day.total_tasks,
            xp_today: day.xp_earned,
            total_xp: self.progress.total_xp,
            weekly_tasks: self.rotation.selected_tasks.len(),
        }
    }

    pub fn level_info(&self, catalog: &Catalog) -> LevelInfo {
        let levels = catalog.levels();
        let current = self.progress.current_level;
        let (title, icon) = levels
            .get(current)
            .map(|l| (l.title.clone(), l.icon.clone()))
            .unwrap_or_default();
        let progress = levels.progress_to_next_level(self.progress.total_xp, current);
        LevelInfo {
            level: current,
            title,
            icon,
            total_xp: self.progress.total_xp,
            next_level_xp: progress.map(|_| levels.xp_for_level(current + 1)),
            progress: progress.unwrap_or(100.0),
        }
    }
}
