use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};
use tokio::sync::broadcast;

use questlog_core::{
    Difficulty, Reward, RewardId, SessionId, Settings, SlotId, Task, TaskCategory, TaskId, UserId,
    WeeklyRotation,
};

use crate::error::StorageError;
use crate::records::*;
use crate::traits::{ChangeNotice, RemoteStore, Subscription};

const CHANGE_FEED_CAPACITY: usize = 256;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

fn to_sql_int(v: u64, label: &str) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{label} out of range: {v}")))
}

fn from_sql_int<T: TryFrom<i64>>(v: i64, label: &str) -> Result<T, StorageError> {
    T::try_from(v).map_err(|_| StorageError::Serialization(format!("{label} out of range: {v}")))
}

fn status_str(status: SlotStatus) -> &'static str {
    match status {
        SlotStatus::Assigned => "assigned",
        SlotStatus::Completed => "completed",
        SlotStatus::Skipped => "skipped",
    }
}

fn parse_status(s: &str) -> Result<SlotStatus, StorageError> {
    match s {
        "assigned" => Ok(SlotStatus::Assigned),
        "completed" => Ok(SlotStatus::Completed),
        "skipped" => Ok(SlotStatus::Skipped),
        _ => Err(StorageError::Serialization(format!("unknown slot status: {s}"))),
    }
}

/// SQLite-backed `RemoteStore`. Every account lives in the same database,
/// keyed by user id; a batch of writes is one transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<ChangeNotice>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT_MS)
    }

    pub fn open_with_timeout(
        path: impl AsRef<Path>,
        busy_timeout_ms: u64,
    ) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, busy_timeout_ms)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, DEFAULT_BUSY_TIMEOUT_MS)
    }

    fn from_connection(conn: Connection, busy_timeout_ms: u64) -> Result<Self, StorageError> {
        crate::schema::init_schema(&conn, busy_timeout_ms)?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection lock poisoned".into()))
    }

    pub fn read_snapshot(&self, user: UserId) -> Result<Option<Snapshot>, StorageError> {
        let conn = self.lock()?;
        let Some(profile) = read_profile(&conn, user)? else {
            return Ok(None);
        };
        Ok(Some(Snapshot {
            profile,
            days: read_days(&conn, user, None)?,
            slots: read_slots(&conn, user, None)?,
            tasks: read_tasks(&conn, user, None)?,
            rewards: read_rewards(&conn, user, None)?,
        }))
    }

    pub fn read_entity(
        &self,
        user: UserId,
        entity: &EntityRef,
    ) -> Result<Option<RemoteRecord>, StorageError> {
        if let EntityRef::Account = entity {
            return Ok(self
                .read_snapshot(user)?
                .map(|s| RemoteRecord::Account(Box::new(s))));
        }
        let conn = self.lock()?;
        let record = match entity {
            EntityRef::Profile => read_profile(&conn, user)?.map(RemoteRecord::Profile),
            EntityRef::Day(date) => read_days(&conn, user, Some(*date))?
                .pop()
                .map(RemoteRecord::Day),
            EntityRef::Slot(date, slot_id) => read_slots(&conn, user, Some((*date, slot_id)))?
                .pop()
                .map(RemoteRecord::Slot),
            EntityRef::Task(id) => read_tasks(&conn, user, Some(*id))?
                .pop()
                .map(RemoteRecord::Task),
            EntityRef::Reward(id) => read_rewards(&conn, user, Some(*id))?
                .pop()
                .map(RemoteRecord::Reward),
            EntityRef::Account => None,
        };
        Ok(record)
    }

    /// Apply a batch atomically, then announce the touched entities.
    pub fn write_batch(
        &self,
        user: UserId,
        origin: SessionId,
        writes: &[RemoteWrite],
    ) -> Result<(), StorageError> {
        {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            for write in writes {
                materialize_write(&tx, user, write)?;
            }
            tx.commit()?;
        }

        let mut entities: Vec<EntityRef> = writes.iter().map(RemoteWrite::entity).collect();
        entities.dedup();
        tracing::debug!(%user, %origin, writes = writes.len(), "batch committed");
        // No receivers is fine: nobody is listening for this account.
        let _ = self.changes.send(ChangeNotice {
            user,
            origin,
            entities,
        });
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("subscribers", &self.changes.receiver_count())
            .finish()
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn load_snapshot(&self, user: UserId) -> Result<Option<Snapshot>, StorageError> {
        self.read_snapshot(user)
    }

    async fn fetch(
        &self,
        user: UserId,
        entity: &EntityRef,
    ) -> Result<Option<RemoteRecord>, StorageError> {
        self.read_entity(user, entity)
    }

    async fn apply(
        &self,
        user: UserId,
        origin: SessionId,
        writes: &[RemoteWrite],
    ) -> Result<(), StorageError> {
        self.write_batch(user, origin, writes)
    }

    fn subscribe(&self, user: UserId) -> Subscription {
        Subscription::new(user, self.changes.subscribe())
    }
}

// ============================================================================
// Writes
// ============================================================================

fn materialize_write(
    tx: &rusqlite::Transaction,
    user: UserId,
    write: &RemoteWrite,
) -> Result<(), StorageError> {
    let uid = user.as_bytes().as_slice();
    match write {
        RemoteWrite::SetProfile(profile) => upsert_profile(tx, user, profile)?,

        RemoteWrite::UpsertDay(day) => upsert_day(tx, user, day)?,

        RemoteWrite::UpsertSlot(slot) => upsert_slot(tx, user, slot)?,

        RemoteWrite::DeleteSlot { date, slot_id } => {
            tx.execute(
                "DELETE FROM slot_assignments WHERE user_id = ?1 AND date = ?2 AND slot_id = ?3",
                rusqlite::params![uid, date, slot_id.as_str()],
            )?;
        }

        RemoteWrite::UpsertTask(task) => upsert_task(tx, user, task)?,

        RemoteWrite::DeleteTask(task_id) => {
            tx.execute(
                "DELETE FROM tasks WHERE user_id = ?1 AND task_id = ?2",
                rusqlite::params![uid, task_id.as_bytes().as_slice()],
            )?;
        }

        RemoteWrite::UpsertReward(reward) => upsert_reward(tx, user, reward)?,

        RemoteWrite::DeleteReward(reward_id) => {
            tx.execute(
                "DELETE FROM rewards WHERE user_id = ?1 AND reward_id = ?2",
                rusqlite::params![uid, reward_id.as_bytes().as_slice()],
            )?;
        }

        RemoteWrite::ReplaceAccount(snapshot) => {
            for table in ["profiles", "daily_progress", "slot_assignments", "tasks", "rewards"] {
                tx.execute(
                    &format!("DELETE FROM {table} WHERE user_id = ?1"),
                    rusqlite::params![uid],
                )?;
            }
            upsert_profile(tx, user, &snapshot.profile)?;
            for day in &snapshot.days {
                upsert_day(tx, user, day)?;
            }
            for slot in &snapshot.slots {
                upsert_slot(tx, user, slot)?;
            }
            for task in &snapshot.tasks {
                upsert_task(tx, user, task)?;
            }
            for reward in &snapshot.rewards {
                upsert_reward(tx, user, reward)?;
            }
        }
    }
    Ok(())
}

fn upsert_profile(
    tx: &rusqlite::Transaction,
    user: UserId,
    profile: &ProfileRecord,
) -> Result<(), StorageError> {
    tx.execute(
        "INSERT INTO profiles (user_id, total_xp, current_level, streak, last_active_date, profile_icon, settings, rotation) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(user_id) DO UPDATE SET total_xp = excluded.total_xp, current_level = excluded.current_level, streak = excluded.streak, last_active_date = excluded.last_active_date, profile_icon = excluded.profile_icon, settings = excluded.settings, rotation = excluded.rotation, updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)",
        rusqlite::params![
            user.as_bytes().as_slice(),
            to_sql_int(profile.total_xp, "total_xp")?,
            profile.current_level,
            profile.streak,
            profile.last_active_date,
            profile.profile_icon,
            rmp_serde::to_vec(&profile.settings)?,
            rmp_serde::to_vec(&profile.rotation)?,
        ],
    )?;
    Ok(())
}

fn upsert_day(tx: &rusqlite::Transaction, user: UserId, day: &DayRecord) -> Result<(), StorageError> {
    tx.execute(
        "INSERT INTO daily_progress (user_id, date, completed_tasks, total_tasks, xp_earned, tasks_completed, tasks_skipped, tasks_penalty, extra_tasks_completed) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(user_id, date) DO UPDATE SET completed_tasks = excluded.completed_tasks, total_tasks = excluded.total_tasks, xp_earned = excluded.xp_earned, tasks_completed = excluded.tasks_completed, tasks_skipped = excluded.tasks_skipped, tasks_penalty = excluded.tasks_penalty, extra_tasks_completed = excluded.extra_tasks_completed",
        rusqlite::params![
            user.as_bytes().as_slice(),
            day.date,
            day.completed_tasks,
            day.total_tasks,
            day.xp_earned,
            rmp_serde::to_vec(&day.tasks_completed)?,
            rmp_serde::to_vec(&day.tasks_skipped)?,
            rmp_serde::to_vec(&day.tasks_penalty)?,
            rmp_serde::to_vec(&day.extra_tasks_completed)?,
        ],
    )?;
    Ok(())
}

fn upsert_slot(tx: &rusqlite::Transaction, user: UserId, slot: &SlotRecord) -> Result<(), StorageError> {
    tx.execute(
        "INSERT INTO slot_assignments (user_id, date, slot_id, task_id, status) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id, date, slot_id) DO UPDATE SET task_id = excluded.task_id, status = excluded.status",
        rusqlite::params![
            user.as_bytes().as_slice(),
            slot.date,
            slot.slot_id.as_str(),
            slot.task_id.as_bytes().as_slice(),
            status_str(slot.status),
        ],
    )?;
    Ok(())
}

fn upsert_task(tx: &rusqlite::Transaction, user: UserId, task: &Task) -> Result<(), StorageError> {
    tx.execute(
        "INSERT INTO tasks (user_id, task_id, title, category, difficulty, xp_value, notes, completed, completed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(user_id, task_id) DO UPDATE SET title = excluded.title, category = excluded.category, difficulty = excluded.difficulty, xp_value = excluded.xp_value, notes = excluded.notes, completed = excluded.completed, completed_at = excluded.completed_at",
        rusqlite::params![
            user.as_bytes().as_slice(),
            task.id.as_bytes().as_slice(),
            task.title,
            task.category.as_str(),
            task.difficulty.as_str(),
            to_sql_int(task.xp_value, "xp_value")?,
            task.notes,
            task.completed,
            task.completed_at,
        ],
    )?;
    Ok(())
}

fn upsert_reward(tx: &rusqlite::Transaction, user: UserId, reward: &Reward) -> Result<(), StorageError> {
    tx.execute(
        "INSERT INTO rewards (user_id, reward_id, title, xp_cost, icon, description, purchased, purchased_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(user_id, reward_id) DO UPDATE SET title = excluded.title, xp_cost = excluded.xp_cost, icon = excluded.icon, description = excluded.description, purchased = excluded.purchased, purchased_at = excluded.purchased_at",
        rusqlite::params![
            user.as_bytes().as_slice(),
            reward.id.as_bytes().as_slice(),
            reward.title,
            to_sql_int(reward.xp_cost, "xp_cost")?,
            reward.icon,
            reward.description,
            reward.purchased,
            reward.purchased_at,
        ],
    )?;
    Ok(())
}

// ============================================================================
// Reads
// ============================================================================

fn read_profile(conn: &Connection, user: UserId) -> Result<Option<ProfileRecord>, StorageError> {
    let row = conn
        .query_row(
            "SELECT total_xp, current_level, streak, last_active_date, profile_icon, settings, rotation FROM profiles WHERE user_id = ?1",
            rusqlite::params![user.as_bytes().as_slice()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, NaiveDate>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Vec<u8>>(5)?,
                    row.get::<_, Vec<u8>>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((total_xp, current_level, streak, last_active_date, profile_icon, settings, rotation)) =
        row
    else {
        return Ok(None);
    };
    let settings: Settings = rmp_serde::from_slice(&settings)?;
    let rotation: WeeklyRotation = rmp_serde::from_slice(&rotation)?;
    Ok(Some(ProfileRecord {
        total_xp: from_sql_int(total_xp, "total_xp")?,
        current_level,
        streak,
        last_active_date,
        profile_icon,
        settings,
        rotation,
    }))
}

fn read_days(
    conn: &Connection,
    user: UserId,
    date: Option<NaiveDate>,
) -> Result<Vec<DayRecord>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT date, completed_tasks, total_tasks, xp_earned, tasks_completed, tasks_skipped, tasks_penalty, extra_tasks_completed
         FROM daily_progress WHERE user_id = ?1 AND (?2 IS NULL OR date = ?2) ORDER BY date",
    )?;
    let rows = stmt.query_map(rusqlite::params![user.as_bytes().as_slice(), date], |row| {
        Ok((
            row.get::<_, NaiveDate>(0)?,
            row.get::<_, u32>(1)?,
            row.get::<_, u32>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, Vec<u8>>(4)?,
            row.get::<_, Vec<u8>>(5)?,
            row.get::<_, Vec<u8>>(6)?,
            row.get::<_, Vec<u8>>(7)?,
        ))
    })?;

    let mut result = Vec::new();
    for row in rows {
        let (date, completed_tasks, total_tasks, xp_earned, completed, skipped, penalty, extra) = row?;
        result.push(DayRecord {
            date,
            completed_tasks,
            total_tasks,
            xp_earned,
            tasks_completed: rmp_serde::from_slice(&completed)?,
            tasks_skipped: rmp_serde::from_slice(&skipped)?,
            tasks_penalty: rmp_serde::from_slice(&penalty)?,
            extra_tasks_completed: rmp_serde::from_slice(&extra)?,
        });
    }
    Ok(result)
}

fn read_slots(
    conn: &Connection,
    user: UserId,
    key: Option<(NaiveDate, &SlotId)>,
) -> Result<Vec<SlotRecord>, StorageError> {
    let (date, slot_id) = match key {
        Some((date, slot_id)) => (Some(date), Some(slot_id.as_str())),
        None => (None, None),
    };
    let mut stmt = conn.prepare(
        "SELECT date, slot_id, task_id, status FROM slot_assignments
         WHERE user_id = ?1 AND (?2 IS NULL OR (date = ?2 AND slot_id = ?3)) ORDER BY date, slot_id",
    )?;
    let rows = stmt.query_map(
        rusqlite::params![user.as_bytes().as_slice(), date, slot_id],
        |row| {
            Ok((
                row.get::<_, NaiveDate>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, String>(3)?,
            ))
        },
    )?;

    let mut result = Vec::new();
    for row in rows {
        let (date, slot_id, task_id_bytes, status) = row?;
        result.push(SlotRecord {
            date,
            slot_id: SlotId::new(slot_id),
            task_id: TaskId::from_bytes(to_array::<16>(task_id_bytes, "task_id")?),
            status: parse_status(&status)?,
        });
    }
    Ok(result)
}

fn read_tasks(
    conn: &Connection,
    user: UserId,
    task_id: Option<TaskId>,
) -> Result<Vec<Task>, StorageError> {
    let task_id = task_id.map(|id| id.as_bytes().to_vec());
    let mut stmt = conn.prepare(
        "SELECT task_id, title, category, difficulty, xp_value, notes, completed, completed_at
         FROM tasks WHERE user_id = ?1 AND (?2 IS NULL OR task_id = ?2) ORDER BY rowid",
    )?;
    let rows = stmt.query_map(rusqlite::params![user.as_bytes().as_slice(), task_id], |row| {
        Ok((
            row.get::<_, Vec<u8>>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, bool>(6)?,
            row.get::<_, Option<DateTime<Utc>>>(7)?,
        ))
    })?;

    let mut result = Vec::new();
    for row in rows {
        let (id_bytes, title, category, difficulty, xp_value, notes, completed, completed_at) = row?;
        let category = TaskCategory::parse(&category)
            .ok_or_else(|| StorageError::Serialization(format!("unknown task category: {category}")))?;
        let difficulty = Difficulty::parse(&difficulty)
            .ok_or_else(|| StorageError::Serialization(format!("unknown difficulty: {difficulty}")))?;
        result.push(Task {
            id: TaskId::from_bytes(to_array::<16>(id_bytes, "task_id")?),
            title,
            category,
            difficulty,
            xp_value: from_sql_int(xp_value, "xp_value")?,
            notes,
            completed,
            completed_at,
        });
    }
    Ok(result)
}

fn read_rewards(
    conn: &Connection,
    user: UserId,
    reward_id: Option<RewardId>,
) -> Result<Vec<Reward>, StorageError> {
    let reward_id = reward_id.map(|id| id.as_bytes().to_vec());
    let mut stmt = conn.prepare(
        "SELECT reward_id, title, xp_cost, icon, description, purchased, purchased_at
         FROM rewards WHERE user_id = ?1 AND (?2 IS NULL OR reward_id = ?2) ORDER BY rowid",
    )?;
    let rows = stmt.query_map(rusqlite::params![user.as_bytes().as_slice(), reward_id], |row| {
        Ok((
            row.get::<_, Vec<u8>>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, bool>(5)?,
            row.get::<_, Option<DateTime<Utc>>>(6)?,
        ))
    })?;

    let mut result = Vec::new();
    for row in rows {
        let (id_bytes, title, xp_cost, icon, description, purchased, purchased_at) = row?;
        result.push(Reward {
            id: RewardId::from_bytes(to_array::<16>(id_bytes, "reward_id")?),
            title,
            xp_cost: from_sql_int(xp_cost, "xp_cost")?,
            icon,
            description,
            purchased,
            purchased_at,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use questlog_core::{Catalog, GameState};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
    }

    fn seeded(store: &SqliteStore, user: UserId) -> GameState {
        let state = GameState::provision(&Catalog::builtin(), today());
        let write = RemoteWrite::ReplaceAccount(Box::new(Snapshot::from_state(&state)));
        store.write_batch(user, SessionId::new(), &[write]).unwrap();
        state
    }

    #[test]
    fn missing_account_has_no_snapshot() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.read_snapshot(UserId::new()).unwrap().is_none());
    }

    #[test]
    fn replace_account_round_trips_state() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = UserId::new();
        let catalog = Catalog::builtin();
        let mut state = seeded(&store, user);

        let read = state.tasks[0].id;
        let slot = SlotId::from("task2");
        state.assign_task(&catalog, today(), &slot, read).unwrap();
        state.complete_task(&catalog, read, &slot, today(), Utc::now()).unwrap();
        state.set_profile_icon(Some("🦊".into()));
        let write = RemoteWrite::ReplaceAccount(Box::new(Snapshot::from_state(&state)));
        store.write_batch(user, SessionId::new(), &[write]).unwrap();

        let snapshot = store.read_snapshot(user).unwrap().unwrap();
        assert_eq!(snapshot.tasks.len(), state.tasks.len());
        assert_eq!(snapshot.tasks[0].id, read);
        assert_eq!(snapshot.into_state(catalog.daily_capacity()), state);
    }

    #[test]
    fn accounts_are_isolated() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (alice, bob) = (UserId::new(), UserId::new());
        seeded(&store, alice);
        seeded(&store, bob);

        let task = store.read_snapshot(alice).unwrap().unwrap().tasks[0].id;
        store
            .write_batch(alice, SessionId::new(), &[RemoteWrite::DeleteTask(task)])
            .unwrap();

        assert!(store.read_entity(alice, &EntityRef::Task(task)).unwrap().is_none());
        let bob_tasks = store.read_snapshot(bob).unwrap().unwrap().tasks.len();
        assert_eq!(bob_tasks, Catalog::builtin().task_templates().len());
    }

    #[test]
    fn slot_upsert_and_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = UserId::new();
        let task_id = TaskId::new();
        let slot = SlotRecord {
            date: today(),
            slot_id: SlotId::from("task1"),
            task_id,
            status: SlotStatus::Assigned,
        };
        let key = EntityRef::Slot(today(), SlotId::from("task1"));
        store
            .write_batch(user, SessionId::new(), &[RemoteWrite::UpsertSlot(slot.clone())])
            .unwrap();
        let completed = SlotRecord { status: SlotStatus::Completed, ..slot };
        store
            .write_batch(user, SessionId::new(), &[RemoteWrite::UpsertSlot(completed.clone())])
            .unwrap();
        assert_eq!(
            store.read_entity(user, &key).unwrap(),
            Some(RemoteRecord::Slot(completed))
        );

        store
            .write_batch(
                user,
                SessionId::new(),
                &[RemoteWrite::DeleteSlot { date: today(), slot_id: SlotId::from("task1") }],
            )
            .unwrap();
        assert!(store.read_entity(user, &key).unwrap().is_none());
    }

    #[test]
    fn failed_batch_leaves_nothing_behind() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = UserId::new();
        let state = seeded(&store, user);

        let mut profile = ProfileRecord::from_state(&state);
        profile.total_xp = 999;
        let mut broken = state.rewards[0].clone();
        broken.xp_cost = 0; // violates the CHECK constraint
        let result = store.write_batch(
            user,
            SessionId::new(),
            &[RemoteWrite::SetProfile(profile), RemoteWrite::UpsertReward(broken)],
        );
        assert!(result.is_err());

        let stored = store.read_entity(user, &EntityRef::Profile).unwrap();
        match stored {
            Some(RemoteRecord::Profile(p)) => assert_eq!(p.total_xp, 0),
            other => panic!("expected profile, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn commits_notify_subscribers() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = UserId::new();
        let origin = SessionId::new();
        let mut sub = store.subscribe(user);
        let state = seeded(&store, user);

        store
            .apply(user, origin, &[RemoteWrite::SetProfile(ProfileRecord::from_state(&state))])
            .await
            .unwrap();

        // The seeding batch comes first.
        assert!(matches!(sub.next().await, Some(crate::RemoteChange::Notice(_))));
        match sub.next().await {
            Some(crate::RemoteChange::Notice(notice)) => {
                assert_eq!(notice.origin, origin);
                assert_eq!(notice.entities, vec![EntityRef::Profile]);
            }
            other => panic!("expected notice, got {other:?}"),
        }
    }

    #[test]
    fn on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questlog.db");
        let user = UserId::new();
        {
            let store = SqliteStore::open(&path).unwrap();
            seeded(&store, user);
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.read_snapshot(user).unwrap().is_some());
    }
}
