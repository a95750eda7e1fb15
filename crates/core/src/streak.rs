//! Day-boundary streak check. Increments happen lazily on the first
//! completion of a day (see `GameState::complete_task`); this check only
//! decides whether the running streak survives the gap.

use chrono::NaiveDate;

use crate::state::GameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakCheck {
    /// Already checked in today.
    SameDay,
    /// Yesterday was the last active day; the streak waits for today's
    /// first completion.
    Continued,
    /// At least one whole day was missed.
    Reset { previous: u32 },
    /// `today` is before the last active date (clock moved backwards).
    ClockBehind,
}

impl GameState {
    /// Run once per session or day transition. `last_active_date` is moved to
    /// `today` in every branch.
    pub fn check_streak(&mut self, today: NaiveDate) -> StreakCheck {
        let last = self.progress.last_active_date;
        let gap = today.signed_duration_since(last).num_days();
        let check = match gap {
            0 => StreakCheck::SameDay,
            1 => StreakCheck::Continued,
            g if g > 1 => {
                let previous = self.progress.streak;
                self.progress.streak = 0;
                StreakCheck::Reset { previous }
            }
            _ => StreakCheck::ClockBehind,
        };
        self.progress.last_active_date = today;
        check
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::ids::SlotId;
    use chrono::Utc;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn complete_in(state: &mut GameState, catalog: &Catalog, day: NaiveDate, slot: &str) {
        let task = state.tasks[0].id;
        let slot = SlotId::from(slot);
        state.assign_task(catalog, day, &slot, task).unwrap();
        state.complete_task(catalog, task, &slot, day, Utc::now()).unwrap();
    }

    #[test]
    fn consecutive_days_build_a_streak() {
        let catalog = Catalog::builtin();
        let mut state = GameState::provision(&catalog, date(3));
        assert_eq!(state.check_streak(date(3)), StreakCheck::SameDay);
        complete_in(&mut state, &catalog, date(3), "task1");
        complete_in(&mut state, &catalog, date(3), "task2");
        assert_eq!(state.progress.streak, 1);

        assert_eq!(state.check_streak(date(4)), StreakCheck::Continued);
        // Lazy: nothing changes until the first completion of the new day.
        assert_eq!(state.progress.streak, 1);
        complete_in(&mut state, &catalog, date(4), "task1");
        assert_eq!(state.progress.streak, 2);
        assert_eq!(state.progress.last_active_date, date(4));
    }

    #[test]
    fn gap_day_resets_before_incrementing() {
        let catalog = Catalog::builtin();
        let mut state = GameState::provision(&catalog, date(3));
        complete_in(&mut state, &catalog, date(3), "task1");
        assert_eq!(state.progress.streak, 1);

        assert_eq!(state.check_streak(date(5)), StreakCheck::Reset { previous: 1 });
        assert_eq!(state.progress.streak, 0);
        complete_in(&mut state, &catalog, date(5), "task1");
        assert_eq!(state.progress.streak, 1);
    }

    #[test]
    fn clock_behind_keeps_streak() {
        let catalog = Catalog::builtin();
        let mut state = GameState::provision(&catalog, date(5));
        state.progress.streak = 3;
        assert_eq!(state.check_streak(date(4)), StreakCheck::ClockBehind);
        assert_eq!(state.progress.streak, 3);
        assert_eq!(state.progress.last_active_date, date(4));
    }
}
