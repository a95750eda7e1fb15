use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection, busy_timeout_ms: u64) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -8000;
    ",
    )?;
    conn.busy_timeout(std::time::Duration::from_millis(busy_timeout_ms))?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS profiles (
    user_id BLOB PRIMARY KEY CHECK (length(user_id) = 16),
    total_xp INTEGER NOT NULL CHECK (total_xp >= 0),
    current_level INTEGER NOT NULL CHECK (current_level >= 1),
    streak INTEGER NOT NULL CHECK (streak >= 0),
    last_active_date TEXT NOT NULL,
    profile_icon TEXT,
    settings BLOB NOT NULL,
    rotation BLOB NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);

CREATE TABLE IF NOT EXISTS daily_progress (
    user_id BLOB NOT NULL CHECK (length(user_id) = 16),
    date TEXT NOT NULL,
    completed_tasks INTEGER NOT NULL CHECK (completed_tasks >= 0),
    total_tasks INTEGER NOT NULL CHECK (total_tasks >= 0),
    xp_earned INTEGER NOT NULL,
    tasks_completed BLOB NOT NULL,
    tasks_skipped BLOB NOT NULL,
    tasks_penalty BLOB NOT NULL,
    extra_tasks_completed BLOB NOT NULL,
    PRIMARY KEY (user_id, date)
);

CREATE TABLE IF NOT EXISTS slot_assignments (
    user_id BLOB NOT NULL CHECK (length(user_id) = 16),
    date TEXT NOT NULL,
    slot_id TEXT NOT NULL,
    task_id BLOB NOT NULL CHECK (length(task_id) = 16),
    status TEXT NOT NULL CHECK (status IN ('assigned', 'completed', 'skipped')),
    PRIMARY KEY (user_id, date, slot_id)
);
CREATE INDEX IF NOT EXISTS idx_slot_assignments_task ON slot_assignments (user_id, task_id);

CREATE TABLE IF NOT EXISTS tasks (
    user_id BLOB NOT NULL CHECK (length(user_id) = 16),
    task_id BLOB NOT NULL CHECK (length(task_id) = 16),
    title TEXT NOT NULL,
    category TEXT NOT NULL,
    difficulty TEXT NOT NULL,
    xp_value INTEGER NOT NULL CHECK (xp_value >= 0),
    notes TEXT,
    completed INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT,
    PRIMARY KEY (user_id, task_id)
);

CREATE TABLE IF NOT EXISTS rewards (
    user_id BLOB NOT NULL CHECK (length(user_id) = 16),
    reward_id BLOB NOT NULL CHECK (length(reward_id) = 16),
    title TEXT NOT NULL,
    xp_cost INTEGER NOT NULL CHECK (xp_cost > 0),
    icon TEXT NOT NULL,
    description TEXT,
    purchased INTEGER NOT NULL DEFAULT 0,
    purchased_at TEXT,
    PRIMARY KEY (user_id, reward_id)
);
";
