use chrono::NaiveDate;

use questlog_core::{Catalog, CoreError, SlotId, SlotState, StreakCheck, UserId};
use questlog_engine::EngineError;
use questlog_harness::TestCloud;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

const ONE_SLOT_CATALOG: &str = r#"
    [[levels]]
    level = 1
    title = "Novice"
    xp_required = 0
    icon = "*"

    [[levels]]
    level = 2
    title = "Adept"
    xp_required = 30
    icon = "**"

    [[schedule]]
    id = "slot1"
    start_time = "10:00"
    end_time = "11:00"
    kind = "task"
    label = "Only slot"

    [[schedule]]
    id = "lunch"
    start_time = "12:00"
    end_time = "13:00"
    kind = "meal"
    label = "Lunch"

    [[tasks]]
    title = "Sketch"
    category = "Creative / Art"
    difficulty = "Easy"
"#;

// ============================================================================
// XP and the slot state machine
// ============================================================================

#[tokio::test]
async fn sole_slot_completion_earns_task_xp_plus_bonus() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = TestCloud::new()?.with_catalog(Catalog::from_toml_str(ONE_SLOT_CATALOG)?);
    let user = UserId::new();
    let mut device = cloud.device(user, day(4)).await?;
    let sketch = device.task_named("Sketch").ok_or("seed task missing")?;

    let completion = device.finish("slot1", sketch)?;
    assert_eq!(completion.xp_awarded, 40);
    assert_eq!(completion.bonus, 25);
    assert!(completion.leveled_up());

    let today = device.engine.today_progress(day(4));
    assert_eq!(device.total_xp(), 40);
    assert_eq!(device.engine.progress().current_level, 2);
    assert_eq!(today.total_tasks, 1);
    assert!(today.slots_completed.contains(&SlotId::from("slot1")));

    device.engine.settle().await;
    let stored = cloud.stored(user)?.ok_or("account missing")?;
    assert_eq!(stored.profile.total_xp, 40);
    assert_eq!(stored.profile.current_level, 2);
    Ok(())
}

#[tokio::test]
async fn full_day_grants_a_single_bonus() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = TestCloud::new()?;
    let mut device = cloud.device(UserId::new(), day(4)).await?;
    let ids: Vec<_> = device.engine.tasks().iter().take(4).map(|t| (t.id, t.xp_value)).collect();

    let mut bonuses = 0;
    for (n, (id, _)) in ids.iter().enumerate() {
        let completion = device.finish(&format!("task{}", n + 1), *id)?;
        if completion.bonus > 0 {
            bonuses += 1;
        }
    }
    assert_eq!(bonuses, 1);
    let earned: u64 = ids.iter().map(|(_, xp)| xp).sum();
    assert_eq!(device.total_xp(), earned + 25);

    // A resolved slot stays resolved.
    let (first, _) = ids[0];
    let err = device
        .engine
        .complete_task(first, &SlotId::from("task1"), day(4))
        .unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::SlotResolved { .. })));
    assert!(
        device
            .engine
            .assign_task(day(4), &SlotId::from("task1"), ids[1].0)
            .is_err()
    );
    assert_eq!(device.total_xp(), earned + 25);
    Ok(())
}

#[tokio::test]
async fn skip_penalty_floors_balance_but_not_ledger() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = TestCloud::new()?;
    let mut device = cloud.device(UserId::new(), day(4)).await?;
    let task = device.task_named("Mend clothes").ok_or("seed task missing")?;
    let slot = SlotId::from("task2");

    device.engine.assign_task(day(4), &slot, task)?;
    let penalty = device.engine.skip_task(task, &slot, day(4))?;
    assert_eq!(penalty.penalty, 5);
    assert_eq!(penalty.deducted, 0);
    assert_eq!(device.total_xp(), 0);

    let today = device.engine.today_progress(day(4));
    assert_eq!(today.xp_earned, -5);
    assert_eq!(today.tasks_skipped, vec![task]);
    assert_eq!(device.engine.slot_state(day(4), &slot), SlotState::Skipped(task));
    // Skipping does not count toward the streak.
    assert_eq!(device.engine.progress().streak, 0);
    Ok(())
}

#[tokio::test]
async fn completed_and_skipped_slots_never_overlap() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = TestCloud::new()?;
    let mut device = cloud.device(UserId::new(), day(4)).await?;
    let ids: Vec<_> = device.engine.tasks().iter().take(4).map(|t| t.id).collect();

    for (n, id) in ids.iter().enumerate() {
        let slot = SlotId::new(format!("task{}", n + 1));
        device.engine.assign_task(day(4), &slot, *id)?;
        if n % 2 == 0 {
            device.engine.complete_task(*id, &slot, day(4))?;
            assert!(device.engine.skip_task(*id, &slot, day(4)).is_err());
        } else {
            device.engine.skip_task(*id, &slot, day(4))?;
            assert!(device.engine.complete_task(*id, &slot, day(4)).is_err());
        }
    }

    let today = device.engine.today_progress(day(4));
    assert_eq!(today.slots_completed.len(), 2);
    assert_eq!(today.slots_skipped.len(), 2);
    assert!(today.slots_completed.is_disjoint(&today.slots_skipped));
    Ok(())
}

#[tokio::test]
async fn quit_and_extra_tasks_book_on_the_day() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = TestCloud::new()?;
    let mut device = cloud.device(UserId::new(), day(4)).await?;
    let read = device.task_named("Read").ok_or("seed task missing")?;

    for _ in 0..3 {
        let completion = device.engine.complete_extra_task(read, day(4))?;
        assert_eq!(completion.bonus, 0);
    }
    assert_eq!(device.total_xp(), 45);
    assert_eq!(device.engine.progress().streak, 1);

    let penalty = device.engine.quit_task(read, day(4))?;
    assert_eq!(penalty.deducted, 10);

    let today = device.engine.today_progress(day(4));
    assert_eq!(today.completed_tasks, 0);
    assert_eq!(today.xp_earned, 35);
    assert_eq!(today.tasks_penalty, vec![read]);
    assert_eq!(device.total_xp(), 35);
    Ok(())
}

#[tokio::test]
async fn unknown_ids_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = TestCloud::new()?;
    let mut device = cloud.device(UserId::new(), day(4)).await?;
    let read = device.task_named("Read").ok_or("seed task missing")?;
    let bogus = questlog_core::TaskId::new();

    let err = device.engine.assign_task(day(4), &SlotId::from("task1"), bogus).unwrap_err();
    assert!(err.is_rejection());
    let err = device.engine.assign_task(day(4), &SlotId::from("nap"), read).unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::UnknownSlot(_))));

    device.engine.assign_task(day(4), &SlotId::from("task1"), read)?;
    let err = device
        .engine
        .complete_task(bogus, &SlotId::from("task1"), day(4))
        .unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::UnknownTask(_))));

    // Deleted tasks cannot be bound.
    device.engine.delete_task(read)?;
    assert!(device.engine.assign_task(day(4), &SlotId::from("task2"), read).is_err());
    assert!(device.engine.assigned_tasks(day(4)).is_empty());
    Ok(())
}

// ============================================================================
// Streaks
// ============================================================================

#[tokio::test]
async fn gap_day_resets_streak_before_next_completion() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = TestCloud::new()?;
    let mut device = cloud.device(UserId::new(), day(4)).await?;
    let read = device.task_named("Read").ok_or("seed task missing")?;

    device.finish("task1", read)?;
    assert_eq!(device.engine.progress().streak, 1);

    // Day 5 passes with nothing done.
    assert_eq!(device.advance_days(2), StreakCheck::Reset { previous: 1 });
    assert_eq!(device.engine.progress().streak, 0);

    let completion = device.finish("task1", read)?;
    assert_eq!(completion.streak, 1);
    assert_eq!(device.engine.progress().last_active_date, day(6));
    Ok(())
}

#[tokio::test]
async fn consecutive_days_extend_streak_lazily() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = TestCloud::new()?;
    let mut device = cloud.device(UserId::new(), day(4)).await?;
    let read = device.task_named("Read").ok_or("seed task missing")?;
    let draw = device.task_named("Draw small animals").ok_or("seed task missing")?;

    device.finish("task1", read)?;
    device.finish("task2", draw)?;
    assert_eq!(device.engine.progress().streak, 1);

    assert_eq!(device.advance_days(1), StreakCheck::Continued);
    assert_eq!(device.engine.progress().streak, 1);
    assert_eq!(device.engine.check_in(day(5)), StreakCheck::SameDay);

    device.finish("task1", read)?;
    assert_eq!(device.engine.progress().streak, 2);

    // A clock that jumps back keeps the streak.
    assert_eq!(device.engine.check_in(day(3)), StreakCheck::ClockBehind);
    assert_eq!(device.engine.progress().streak, 2);
    Ok(())
}

// ============================================================================
// Rewards
// ============================================================================

#[tokio::test]
async fn purchases_need_funds_and_happen_once() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = TestCloud::new()?;
    let user = UserId::new();
    let mut device = cloud.device(user, day(4)).await?;
    let binge = device
        .engine
        .rewards()
        .iter()
        .find(|r| r.xp_cost == 50)
        .map(|r| r.id)
        .ok_or("seed reward missing")?;
    let cooking = device.task_named("Cooking").ok_or("seed task missing")?;

    device.engine.complete_extra_task(cooking, day(4))?;
    let err = device.engine.purchase_reward(binge).unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::InsufficientFunds { needed: 50, available: 20 })));
    assert_eq!(device.total_xp(), 20);

    device.engine.complete_extra_task(cooking, day(4))?;
    device.engine.complete_extra_task(cooking, day(4))?;
    let purchase = device.engine.purchase_reward(binge)?;
    assert_eq!(purchase.total_xp, 10);

    let err = device.engine.purchase_reward(binge).unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::AlreadyPurchased(_))));
    assert_eq!(device.total_xp(), 10);

    // Deleting a purchased reward refunds nothing.
    device.engine.delete_reward(binge)?;
    assert_eq!(device.total_xp(), 10);

    device.engine.settle().await;
    let stored = cloud.stored(user)?.ok_or("account missing")?;
    assert_eq!(stored.profile.total_xp, 10);
    assert!(stored.rewards.iter().all(|r| r.id != binge));
    Ok(())
}

#[tokio::test]
async fn custom_rewards_and_weekly_rotation_persist() -> Result<(), Box<dyn std::error::Error>> {
    let cloud = TestCloud::new()?;
    let user = UserId::new();
    let mut device = cloud.device(user, day(6)).await?;

    let reward = device.engine.add_custom_reward(questlog_core::NewReward {
        title: "Bubble tea".into(),
        xp_cost: 60,
        icon: "🧋".into(),
        description: None,
    })?;
    let picks: Vec<_> = device.engine.tasks().iter().skip(2).take(3).map(|t| t.id).collect();
    device.engine.select_weekly_tasks(picks.clone(), day(6))?;
    assert_eq!(device.engine.stats(day(6)).weekly_tasks, 3);

    device.engine.delete_task(picks[0])?;
    device.engine.settle().await;

    let reopened = cloud.device(user, day(6)).await?;
    let rotation = &reopened.engine.state().rotation;
    assert_eq!(rotation.week_start, day(3));
    assert_eq!(rotation.selected_tasks, picks[1..].to_vec());
    assert!(reopened.engine.rewards().iter().any(|r| r.id == reward && r.xp_cost == 60));
    Ok(())
}
