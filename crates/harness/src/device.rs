use chrono::{Days, NaiveDate};

use questlog_core::{Completion, SlotId, TaskId};
use questlog_engine::{Engine, EngineError};

/// One session: an engine plus the calendar date it believes it is.
pub struct TestDevice {
    pub engine: Engine,
    pub today: NaiveDate,
}

impl TestDevice {
    pub fn new(engine: Engine, today: NaiveDate) -> Self {
        Self { engine, today }
    }

    pub fn task_named(&self, title: &str) -> Option<TaskId> {
        self.engine
            .tasks()
            .iter()
            .find(|t| t.title == title)
            .map(|t| t.id)
    }

    /// Assign `task_id` to `slot` today and complete it.
    pub fn finish(&mut self, slot: &str, task_id: TaskId) -> Result<Completion, EngineError> {
        let slot = SlotId::from(slot);
        self.engine.assign_task(self.today, &slot, task_id)?;
        self.engine.complete_task(task_id, &slot, self.today)
    }

    /// Move the device clock forward and run the day-boundary check.
    pub fn advance_days(&mut self, days: u64) -> questlog_core::StreakCheck {
        self.today = self.today + Days::new(days);
        self.engine.check_in(self.today)
    }

    pub fn total_xp(&self) -> u64 {
        self.engine.progress().total_xp
    }
}
