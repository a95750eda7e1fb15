pub mod config;
pub mod error;
mod merge;
pub mod pending;
pub mod sync;

pub use config::{EngineConfig, QuestlogConfig, StoreConfig};
pub use error::EngineError;
pub use pending::PendingWrites;
pub use sync::{SyncOutcome, SyncReport, SyncStatus};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::mpsc;

use questlog_core::{
    Catalog, Completion, DailyProgress, GameState, LevelInfo, NewReward, NewTask, Penalty,
    Purchase, Reward, RewardId, SessionId, SettingKey, Settings, SlotId, SlotState, Stats,
    StreakCheck, Task, TaskId, UserId, UserProgress,
};
use questlog_storage::{
    DayRecord, EntityRef, ProfileRecord, RemoteChange, RemoteRecord, RemoteStore, RemoteWrite,
    SlotRecord, Snapshot, Subscription,
};

use crate::sync::{WriteJob, WriteOutcome};

/// One session's view of one account.
///
/// Every mutation validates, applies to the in-memory state and returns
/// synchronously; the matching remote write is queued for the background
/// writer. Failed writes and other sessions' changes are folded back in by
/// `sync` / `settle`.
pub struct Engine {
    user_id: UserId,
    session_id: SessionId,
    config: EngineConfig,
    catalog: Arc<Catalog>,
    state: GameState,
    store: Arc<dyn RemoteStore>,
    writer: mpsc::UnboundedSender<WriteJob>,
    outcomes: mpsc::UnboundedReceiver<WriteOutcome>,
    pending: PendingWrites,
    subscription: Option<Subscription>,
    /// Set while remote state is being merged so the merge is not echoed
    /// back to the store.
    suppress_outbound: bool,
}

impl Engine {
    /// Load the account, provisioning it from the catalog when the store
    /// has nothing for `user_id`. Provisioning is written durably before
    /// this returns.
    pub async fn open(
        user_id: UserId,
        catalog: Arc<Catalog>,
        config: EngineConfig,
        store: Arc<dyn RemoteStore>,
        today: NaiveDate,
    ) -> Result<Self, EngineError> {
        let session_id = SessionId::new();
        // Subscribe first so nothing committed after the load is missed.
        let subscription = config.subscribe.then(|| store.subscribe(user_id));

        let state = match store.load_snapshot(user_id).await? {
            Some(snapshot) => {
                let mut state = snapshot.into_state(catalog.daily_capacity());
                state.recompute_level(catalog.levels());
                tracing::debug!(user = %user_id, session = %session_id, "loaded account");
                state
            }
            None => {
                let state = GameState::provision(&catalog, today);
                let write = RemoteWrite::ReplaceAccount(Box::new(Snapshot::from_state(&state)));
                store.apply(user_id, session_id, &[write]).await?;
                tracing::info!(user = %user_id, tasks = state.tasks.len(), "provisioned account");
                state
            }
        };

        let (writer, outcomes) = sync::spawn_writer(Arc::clone(&store), user_id, session_id);
        Ok(Self {
            user_id,
            session_id,
            config,
            catalog,
            state,
            store,
            writer,
            outcomes,
            pending: PendingWrites::new(),
            subscription,
            suppress_outbound: false,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    // ========================================================================
    // Slot operations
    // ========================================================================

    pub fn assign_task(
        &mut self,
        date: NaiveDate,
        slot_id: &SlotId,
        task_id: TaskId,
    ) -> Result<(), EngineError> {
        self.state.assign_task(&self.catalog, date, slot_id, task_id)?;
        tracing::debug!(%date, %slot_id, %task_id, "assigned task");
        let writes = self.day_and_slot_writes(date, slot_id);
        self.persist("assign_task", writes);
        Ok(())
    }

    pub fn remove_assignment(
        &mut self,
        date: NaiveDate,
        slot_id: &SlotId,
    ) -> Result<TaskId, EngineError> {
        let task_id = self.state.remove_assignment(&self.catalog, date, slot_id)?;
        tracing::debug!(%date, %slot_id, %task_id, "removed assignment");
        let writes = vec![self.slot_write(date, slot_id)];
        self.persist("remove_assignment", writes);
        Ok(task_id)
    }

    pub fn complete_task(
        &mut self,
        task_id: TaskId,
        slot_id: &SlotId,
        date: NaiveDate,
    ) -> Result<Completion, EngineError> {
        let completion =
            self.state
                .complete_task(&self.catalog, task_id, slot_id, date, Utc::now())?;
        tracing::debug!(
            %date,
            %slot_id,
            %task_id,
            xp = completion.xp_awarded,
            bonus = completion.bonus,
            total_xp = completion.total_xp,
            "completed task"
        );
        if completion.leveled_up() {
            tracing::info!(user = %self.user_id, level = completion.level_after, "level up");
        }
        let mut writes = self.day_and_slot_writes(date, slot_id);
        writes.push(self.profile_write());
        writes.extend(self.task_write(task_id));
        self.persist("complete_task", writes);
        Ok(completion)
    }

    pub fn skip_task(
        &mut self,
        task_id: TaskId,
        slot_id: &SlotId,
        date: NaiveDate,
    ) -> Result<Penalty, EngineError> {
        let penalty = self.state.skip_task(&self.catalog, task_id, slot_id, date)?;
        tracing::debug!(%date, %slot_id, %task_id, deducted = penalty.deducted, "skipped task");
        let mut writes = self.day_and_slot_writes(date, slot_id);
        writes.push(self.profile_write());
        self.persist("skip_task", writes);
        Ok(penalty)
    }

    pub fn quit_task(&mut self, task_id: TaskId, date: NaiveDate) -> Result<Penalty, EngineError> {
        let penalty = self.state.quit_task(&self.catalog, task_id, date)?;
        tracing::debug!(%date, %task_id, deducted = penalty.deducted, "quit task");
        let writes = self.day_and_profile_writes(date);
        self.persist("quit_task", writes);
        Ok(penalty)
    }

    pub fn complete_extra_task(
        &mut self,
        task_id: TaskId,
        date: NaiveDate,
    ) -> Result<Completion, EngineError> {
        let completion = self.state.complete_extra_task(&self.catalog, task_id, date)?;
        tracing::debug!(%date, %task_id, xp = completion.xp_awarded, "completed extra task");
        let writes = self.day_and_profile_writes(date);
        self.persist("complete_extra_task", writes);
        Ok(completion)
    }

    // ========================================================================
    // Rewards
    // ========================================================================

    pub fn purchase_reward(&mut self, reward_id: RewardId) -> Result<Purchase, EngineError> {
        let purchase = self
            .state
            .purchase_reward(&self.catalog, reward_id, Utc::now())?;
        tracing::debug!(%reward_id, cost = purchase.cost, total_xp = purchase.total_xp, "purchased reward");
        let mut writes: Vec<RemoteWrite> = self.reward_write(reward_id).into_iter().collect();
        writes.push(self.profile_write());
        self.persist("purchase_reward", writes);
        Ok(purchase)
    }

    pub fn add_custom_reward(&mut self, reward: NewReward) -> Result<RewardId, EngineError> {
        let reward_id = self.state.add_custom_reward(reward)?;
        tracing::debug!(%reward_id, "added reward");
        let writes = self.reward_write(reward_id).into_iter().collect();
        self.persist("add_custom_reward", writes);
        Ok(reward_id)
    }

    pub fn delete_reward(&mut self, reward_id: RewardId) -> Result<Reward, EngineError> {
        let reward = self.state.delete_reward(reward_id)?;
        tracing::debug!(%reward_id, purchased = reward.purchased, "deleted reward");
        self.persist("delete_reward", vec![RemoteWrite::DeleteReward(reward_id)]);
        Ok(reward)
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    pub fn add_custom_task(&mut self, task: NewTask) -> Result<TaskId, EngineError> {
        let task_id = self.state.add_custom_task(&self.catalog, task)?;
        tracing::debug!(%task_id, "added task");
        let writes = self.task_write(task_id).into_iter().collect();
        self.persist("add_custom_task", writes);
        Ok(task_id)
    }

    /// Remove a task. Credited history stays; open assignments of the task
    /// are released and it leaves the weekly rotation.
    pub fn delete_task(&mut self, task_id: TaskId) -> Result<Task, EngineError> {
        let deleted = self.state.delete_task(task_id)?;
        tracing::debug!(%task_id, released = deleted.released.len(), "deleted task");
        let mut writes = vec![RemoteWrite::DeleteTask(task_id)];
        writes.extend(
            deleted
                .released
                .into_iter()
                .map(|(date, slot_id)| RemoteWrite::DeleteSlot { date, slot_id }),
        );
        writes.push(self.profile_write());
        self.persist("delete_task", writes);
        Ok(deleted.task)
    }

    pub fn select_weekly_tasks(
        &mut self,
        task_ids: Vec<TaskId>,
        today: NaiveDate,
    ) -> Result<(), EngineError> {
        self.state.select_weekly_tasks(task_ids, today)?;
        tracing::debug!(count = self.state.rotation.selected_tasks.len(), "selected weekly tasks");
        let write = self.profile_write();
        self.persist("select_weekly_tasks", vec![write]);
        Ok(())
    }

    // ========================================================================
    // Profile
    // ========================================================================

    pub fn toggle_setting(&mut self, key: SettingKey) -> bool {
        let value = self.state.toggle_setting(key);
        tracing::debug!(?key, value, "toggled setting");
        let write = self.profile_write();
        self.persist("toggle_setting", vec![write]);
        value
    }

    pub fn set_profile_icon(&mut self, icon: Option<String>) {
        self.state.set_profile_icon(icon);
        let write = self.profile_write();
        self.persist("set_profile_icon", vec![write]);
    }

    /// Session or day-boundary streak check.
    pub fn check_in(&mut self, today: NaiveDate) -> StreakCheck {
        let check = self.state.check_streak(today);
        match check {
            StreakCheck::Reset { previous } => {
                tracing::info!(user = %self.user_id, previous, "streak reset");
            }
            StreakCheck::ClockBehind => {
                tracing::warn!(user = %self.user_id, %today, "clock is behind the last active date");
            }
            StreakCheck::SameDay | StreakCheck::Continued => {}
        }
        let write = self.profile_write();
        self.persist("check_in", vec![write]);
        check
    }

    /// Replace the whole account with a freshly provisioned one.
    pub fn reset_progress(&mut self, today: NaiveDate) {
        self.state = GameState::provision(&self.catalog, today);
        tracing::info!(user = %self.user_id, "progress reset");
        let snapshot = Snapshot::from_state(&self.state);
        self.persist("reset_progress", vec![RemoteWrite::ReplaceAccount(Box::new(snapshot))]);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn progress(&self) -> &UserProgress {
        &self.state.progress
    }

    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn rewards(&self) -> &[Reward] {
        &self.state.rewards
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn today_progress(&self, today: NaiveDate) -> DailyProgress {
        self.state.day_or_empty(&self.catalog, today)
    }

    /// Task bound to a slot, resolved or not.
    pub fn slot_assignment(&self, date: NaiveDate, slot_id: &SlotId) -> Option<TaskId> {
        self.state.slot_state(date, slot_id).task_id()
    }

    pub fn slot_state(&self, date: NaiveDate, slot_id: &SlotId) -> SlotState {
        self.state.slot_state(date, slot_id)
    }

    pub fn assigned_tasks(&self, date: NaiveDate) -> BTreeMap<SlotId, TaskId> {
        self.state
            .day(date)
            .map(|d| d.slot_assignments.clone())
            .unwrap_or_default()
    }

    pub fn stats(&self, today: NaiveDate) -> Stats {
        self.state.stats(&self.catalog, today)
    }

    pub fn level_info(&self) -> LevelInfo {
        self.state.level_info(&self.catalog)
    }

    // ========================================================================
    // Synchronization
    // ========================================================================

    /// Fold in whatever has already happened: settled writes, other
    /// sessions' changes, and reloads that are now possible. Never waits on
    /// in-flight writes.
    pub async fn sync(&mut self) -> SyncReport {
        let mut report = SyncReport::default();
        while let Ok(outcome) = self.outcomes.try_recv() {
            self.handle_outcome(outcome, &mut report);
        }
        self.reconcile(&mut report).await;
        report
    }

    /// Wait for every in-flight write (bounded by the settle timeout), then
    /// `sync`.
    pub async fn settle(&mut self) -> SyncReport {
        let mut report = SyncReport::default();
        let deadline = tokio::time::Instant::now() + self.config.settle_timeout();
        while self.pending.in_flight_count() > 0 {
            match tokio::time::timeout_at(deadline, self.outcomes.recv()).await {
                Ok(Some(outcome)) => self.handle_outcome(outcome, &mut report),
                Ok(None) => {
                    let lost = self.pending.fail_all();
                    tracing::warn!(lost = lost.len(), "writer stopped with writes in flight");
                    report.failed_writes += lost.len();
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        in_flight = self.pending.in_flight_count(),
                        "settle timed out"
                    );
                    break;
                }
            }
        }
        self.reconcile(&mut report).await;
        report
    }

    pub fn sync_status(&self) -> SyncStatus {
        let unsaved: Vec<EntityRef> = self.pending.unsaved().cloned().collect();
        if !unsaved.is_empty() {
            return SyncStatus::Stale(unsaved);
        }
        if self.pending.is_idle() {
            SyncStatus::Clean
        } else {
            SyncStatus::Pending(self.pending.in_flight_count() + self.pending.awaiting_reload())
        }
    }

    fn handle_outcome(&mut self, outcome: WriteOutcome, report: &mut SyncReport) {
        match outcome.result {
            Ok(()) => {
                self.pending.complete(outcome.ticket);
            }
            Err(error) => {
                if let Some(failed) = self.pending.fail(outcome.ticket) {
                    tracing::warn!(
                        ticket = failed.ticket,
                        op = failed.op,
                        entities = failed.entities.len(),
                        %error,
                        "write failed; local state is stale"
                    );
                }
                report.failed_writes += 1;
            }
        }
    }

    async fn reconcile(&mut self, report: &mut SyncReport) {
        self.drain_notices(report).await;
        self.reload_failed(report).await;
    }

    async fn drain_notices(&mut self, report: &mut SyncReport) {
        let Some(subscription) = self.subscription.as_mut() else {
            return;
        };
        let mut changes = Vec::new();
        while changes.len() < self.config.max_notices_per_sync {
            match subscription.try_next() {
                Some(change) => changes.push(change),
                None => break,
            }
        }

        for change in changes {
            match change {
                RemoteChange::Notice(notice) if notice.origin == self.session_id => {}
                RemoteChange::Notice(notice) => {
                    for entity in notice.entities {
                        if self.pending.covers(&entity) {
                            // Ours may already have committed; re-fetch once it settles.
                            tracing::debug!(?entity, "remote change behind a local write; deferring");
                            self.pending.mark_for_reload(entity);
                            continue;
                        }
                        self.merge_remote(entity, report).await;
                    }
                }
                RemoteChange::Lagged(skipped) => {
                    tracing::warn!(skipped, "change feed lagged; scheduling full reload");
                    self.pending.mark_for_reload(EntityRef::Account);
                }
            }
        }
    }

    async fn merge_remote(&mut self, entity: EntityRef, report: &mut SyncReport) {
        match self.store.fetch(self.user_id, &entity).await {
            Ok(record) => {
                self.apply_remote(&entity, record);
                tracing::debug!(?entity, "merged remote change");
                report.merged.push(entity);
            }
            Err(error) => {
                tracing::warn!(?entity, %error, "fetching remote change failed");
                self.pending.mark_for_reload(entity);
            }
        }
    }

    async fn reload_failed(&mut self, report: &mut SyncReport) {
        for entity in self.pending.reloadable() {
            match self.store.fetch(self.user_id, &entity).await {
                Ok(record) => {
                    let was_unsaved = self.pending.is_unsaved(&entity);
                    self.apply_remote(&entity, record);
                    self.pending.reloaded(&entity);
                    tracing::debug!(?entity, "reloaded from store");
                    if was_unsaved {
                        report.outcomes.push(SyncOutcome::Reloaded(entity));
                    }
                }
                Err(error) => {
                    tracing::warn!(?entity, %error, "reload failed");
                    if self.pending.is_unsaved(&entity) {
                        report.outcomes.push(SyncOutcome::Unsaved(entity));
                    }
                }
            }
        }
    }

    /// Overwrite local state with the store's value. A stored level that
    /// disagrees with the balance is corrected locally only.
    fn apply_remote(&mut self, entity: &EntityRef, record: Option<RemoteRecord>) {
        self.suppress_outbound = true;
        if merge::merge_entity(&mut self.state, &self.catalog, entity, record) {
            tracing::debug!(?entity, level = self.state.progress.current_level, "re-derived merged level");
        }
        self.suppress_outbound = false;
    }

    // ========================================================================
    // Outbound writes
    // ========================================================================

    fn persist(&mut self, op: &'static str, writes: Vec<RemoteWrite>) {
        if self.suppress_outbound {
            tracing::debug!(op, "outbound write suppressed during merge");
            return;
        }
        if writes.is_empty() {
            return;
        }
        let entities = writes.iter().map(RemoteWrite::entity).collect();
        let ticket = self.pending.issue(op, entities);
        if let Err(mpsc::error::SendError(job)) = self.writer.send(WriteJob { ticket, op, writes }) {
            tracing::warn!(op, "writer is gone; write dropped");
            self.pending.fail(job.ticket);
        }
    }

    fn profile_write(&self) -> RemoteWrite {
        RemoteWrite::SetProfile(ProfileRecord::from_state(&self.state))
    }

    fn day_write(&self, date: NaiveDate) -> Option<RemoteWrite> {
        self.state
            .day(date)
            .map(|day| RemoteWrite::UpsertDay(DayRecord::from(day)))
    }

    fn slot_write(&self, date: NaiveDate, slot_id: &SlotId) -> RemoteWrite {
        self.state
            .day(date)
            .and_then(|day| SlotRecord::from_day(day, slot_id))
            .map_or_else(
                || RemoteWrite::DeleteSlot {
                    date,
                    slot_id: slot_id.clone(),
                },
                RemoteWrite::UpsertSlot,
            )
    }

    fn day_and_slot_writes(&self, date: NaiveDate, slot_id: &SlotId) -> Vec<RemoteWrite> {
        let mut writes: Vec<RemoteWrite> = self.day_write(date).into_iter().collect();
        writes.push(self.slot_write(date, slot_id));
        writes
    }

    fn day_and_profile_writes(&self, date: NaiveDate) -> Vec<RemoteWrite> {
        let mut writes: Vec<RemoteWrite> = self.day_write(date).into_iter().collect();
        writes.push(self.profile_write());
        writes
    }

    fn task_write(&self, task_id: TaskId) -> Option<RemoteWrite> {
        self.state.task(task_id).cloned().map(RemoteWrite::UpsertTask)
    }

    fn reward_write(&self, reward_id: RewardId) -> Option<RemoteWrite> {
        self.state.reward(reward_id).cloned().map(RemoteWrite::UpsertReward)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("user_id", &self.user_id)
            .field("session_id", &self.session_id)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questlog_core::CoreError;
    use questlog_storage::SqliteStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
    }

    async fn open_engine(store: Arc<SqliteStore>, user: UserId) -> Engine {
        Engine::open(
            user,
            Arc::new(Catalog::builtin()),
            EngineConfig::default(),
            store,
            today(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn open_provisions_durably() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let user = UserId::new();
        let engine = open_engine(Arc::clone(&store), user).await;
        assert_eq!(engine.sync_status(), SyncStatus::Clean);

        let snapshot = store.read_snapshot(user).unwrap().unwrap();
        assert_eq!(snapshot.tasks.len(), engine.tasks().len());
        assert_eq!(snapshot.rewards.len(), engine.rewards().len());
    }

    #[tokio::test]
    async fn mutations_are_visible_before_they_land() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let user = UserId::new();
        let mut engine = open_engine(Arc::clone(&store), user).await;
        let task = engine.tasks()[0].id;
        let slot = SlotId::from("task1");

        engine.assign_task(today(), &slot, task).unwrap();
        let completion = engine.complete_task(task, &slot, today()).unwrap();
        assert_eq!(completion.xp_awarded, 15);
        assert_eq!(engine.progress().total_xp, 15);
        assert_eq!(engine.slot_assignment(today(), &slot), Some(task));
        assert!(matches!(engine.sync_status(), SyncStatus::Pending(_)));

        let report = engine.settle().await;
        assert!(report.is_clean());
        assert_eq!(engine.sync_status(), SyncStatus::Clean);

        let stored = store.read_snapshot(user).unwrap().unwrap();
        assert_eq!(stored.profile.total_xp, 15);
        assert_eq!(stored.slots.len(), 1);
        assert!(stored.tasks.iter().any(|t| t.id == task && t.completed));
    }

    #[tokio::test]
    async fn rejections_change_nothing() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut engine = open_engine(store, UserId::new()).await;
        let before = engine.state().clone();
        let task = engine.tasks()[0].id;

        let err = engine
            .complete_task(task, &SlotId::from("task1"), today())
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::SlotUnassigned { .. })));
        assert!(err.is_rejection());

        let reward = engine.rewards()[0].id;
        let err = engine.purchase_reward(reward).unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InsufficientFunds { .. })));

        let err = engine
            .assign_task(today(), &SlotId::from("lunch"), task)
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NotTaskSlot(_))));

        assert_eq!(engine.state(), &before);
        assert_eq!(engine.sync_status(), SyncStatus::Clean);
    }

    #[tokio::test]
    async fn reopening_restores_saved_state() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let user = UserId::new();
        let mut engine = open_engine(Arc::clone(&store), user).await;
        let task = engine.tasks()[2].id;
        engine.complete_extra_task(task, today()).unwrap();
        engine.toggle_setting(SettingKey::DarkMode);
        engine.set_profile_icon(Some("🐉".into()));
        engine.settle().await;

        let reopened = open_engine(store, user).await;
        assert_eq!(reopened.progress().total_xp, 15);
        assert_eq!(reopened.progress().streak, 1);
        assert!(reopened.settings().dark_mode);
        assert_eq!(reopened.progress().profile_icon.as_deref(), Some("🐉"));
        assert_eq!(reopened.state(), engine.state());
    }

    #[tokio::test]
    async fn delete_task_releases_remote_slots() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let user = UserId::new();
        let mut engine = open_engine(Arc::clone(&store), user).await;
        let task = engine.tasks()[1].id;
        let slot = SlotId::from("task3");
        engine.assign_task(today(), &slot, task).unwrap();
        engine.settle().await;

        engine.delete_task(task).unwrap();
        engine.settle().await;
        assert!(engine.assigned_tasks(today()).is_empty());
        let stored = store.read_snapshot(user).unwrap().unwrap();
        assert!(stored.slots.is_empty());
        assert!(stored.tasks.iter().all(|t| t.id != task));
    }

    #[tokio::test]
    async fn reset_replaces_the_account() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let user = UserId::new();
        let mut engine = open_engine(Arc::clone(&store), user).await;
        let task = engine.tasks()[0].id;
        engine.complete_extra_task(task, today()).unwrap();
        engine
            .add_custom_task(NewTask {
                title: "Water plants".into(),
                category: questlog_core::TaskCategory::LifeSkills,
                difficulty: questlog_core::Difficulty::Easy,
                notes: None,
            })
            .unwrap();
        engine.settle().await;

        engine.reset_progress(today());
        assert_eq!(engine.progress().total_xp, 0);
        engine.settle().await;

        let stored = store.read_snapshot(user).unwrap().unwrap();
        assert_eq!(stored.profile.total_xp, 0);
        assert!(stored.days.is_empty());
        assert_eq!(stored.tasks.len(), Catalog::builtin().task_templates().len());
    }

    #[tokio::test]
    async fn stats_and_level_info_follow_progress() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut engine = open_engine(store, UserId::new()).await;
        let ids: Vec<TaskId> = engine.tasks().iter().take(4).map(|t| t.id).collect();
        for (n, id) in ids.iter().enumerate() {
            let slot = SlotId::new(format!("task{}", n + 1));
            engine.assign_task(today(), &slot, *id).unwrap();
            engine.complete_task(*id, &slot, today()).unwrap();
        }
        let stats = engine.stats(today());
        assert_eq!(stats.completed_today, 4);
        assert_eq!(stats.daily_capacity, 4);
        assert_eq!(stats.streak, 1);

        let expected: u64 = engine
            .tasks()
            .iter()
            .take(4)
            .map(|t| t.xp_value)
            .sum::<u64>()
            + 25;
        assert_eq!(engine.progress().total_xp, expected);
        assert_eq!(stats.xp_today, expected as i64);
        assert_eq!(engine.level_info().level, engine.progress().current_level);
        engine.settle().await;
    }
}
