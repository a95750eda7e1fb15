//! Overwrite local state with the store's value of one entity. Used both for
//! other sessions' changes and for rolling back failed writes; in both cases
//! the store wins.

use questlog_core::{Catalog, DailyProgress, GameState, SlotState};
use questlog_storage::{EntityRef, RemoteRecord};

/// Returns true when the stored level disagreed with the merged balance and
/// was recomputed locally.
pub(crate) fn merge_entity(
    state: &mut GameState,
    catalog: &Catalog,
    entity: &EntityRef,
    record: Option<RemoteRecord>,
) -> bool {
    let capacity = catalog.daily_capacity();
    match (entity, record) {
        (_, Some(RemoteRecord::Account(snapshot))) => {
            *state = snapshot.into_state(capacity);
        }
        (_, Some(RemoteRecord::Profile(profile))) => profile.apply_to(state),
        (_, Some(RemoteRecord::Day(day))) => {
            let date = day.date;
            let local = state
                .progress
                .weekly_progress
                .entry(date)
                .or_insert_with(|| DailyProgress::new(date, capacity));
            day.apply_to(local);
        }
        (_, Some(RemoteRecord::Slot(slot))) => {
            state
                .progress
                .weekly_progress
                .entry(slot.date)
                .or_insert_with(|| DailyProgress::new(slot.date, capacity))
                .set_slot_state(&slot.slot_id, slot.state());
        }
        (_, Some(RemoteRecord::Task(task))) => {
            match state.tasks.iter_mut().find(|t| t.id == task.id) {
                Some(local) => *local = task,
                None => state.tasks.push(task),
            }
        }
        (_, Some(RemoteRecord::Reward(reward))) => {
            match state.rewards.iter_mut().find(|r| r.id == reward.id) {
                Some(local) => *local = reward,
                None => state.rewards.push(reward),
            }
        }

        (EntityRef::Profile | EntityRef::Account, None) => {
            tracing::warn!(?entity, "account missing at the store; keeping local state");
        }
        (EntityRef::Day(date), None) => {
            if let Some(day) = state.progress.weekly_progress.get_mut(date) {
                let slots = std::mem::take(&mut day.slot_assignments);
                let completed = std::mem::take(&mut day.slots_completed);
                let skipped = std::mem::take(&mut day.slots_skipped);
                *day = DailyProgress::new(*date, capacity);
                day.slot_assignments = slots;
                day.slots_completed = completed;
                day.slots_skipped = skipped;
                if day.slot_assignments.is_empty() {
                    state.progress.weekly_progress.remove(date);
                }
            }
        }
        (EntityRef::Slot(date, slot_id), None) => {
            if let Some(day) = state.progress.weekly_progress.get_mut(date) {
                day.set_slot_state(slot_id, SlotState::Unassigned);
            }
        }
        (EntityRef::Task(id), None) => state.tasks.retain(|t| t.id != *id),
        (EntityRef::Reward(id), None) => state.rewards.retain(|r| r.id != *id),
    }
    state.recompute_level(catalog.levels())
}
