pub mod models;

use chrono::{SubsecRound, Utc};
use models::{Message, Thread};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Transcript store. Each thread record owns an ordered list of messages.
///
/// `thread_id` carries no uniqueness constraint: creating the same id twice
/// stores two records and every id-scoped operation resolves to the oldest.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(location: &str) -> Result<Self> {
        if location != ":memory:" {
            if let Some(parent) = Path::new(location).parent() {
                std::fs::create_dir_all(parent).ok();
            }
        }
        let conn = Connection::open(location)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS threads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_threads_thread_id ON threads (thread_id);

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_ref INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                FOREIGN KEY (thread_ref) REFERENCES threads(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_messages_thread_ref ON messages (thread_ref);
            ",
        )?;
        Ok(())
    }

    // ── Threads ──

    pub fn create_thread(&self, thread_id: &str) -> Result<Thread> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO threads (thread_id) VALUES (?1)",
            params![thread_id],
        )?;
        Ok(Thread {
            thread_id: thread_id.to_string(),
            messages: Vec::new(),
        })
    }

    pub fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        let conn = self.conn();
        let Some(thread_ref) = find_thread_ref(&conn, thread_id)? else {
            return Ok(None);
        };
        let messages = load_messages(&conn, thread_ref)?;
        Ok(Some(Thread {
            thread_id: thread_id.to_string(),
            messages,
        }))
    }

    /// Clears every message of the thread. Returns `false` when no such thread exists.
    pub fn reset_thread(&self, thread_id: &str) -> Result<bool> {
        let conn = self.conn();
        let Some(thread_ref) = find_thread_ref(&conn, thread_id)? else {
            return Ok(false);
        };
        conn.execute(
            "DELETE FROM messages WHERE thread_ref = ?1",
            params![thread_ref],
        )?;
        Ok(true)
    }

    // ── Messages ──

    /// Appends a message stamped with the current time (millisecond precision) and
    /// returns the updated thread.
    pub fn add_message(&self, thread_id: &str, content: &str, role: &str) -> Result<Option<Thread>> {
        let conn = self.conn();
        let Some(thread_ref) = find_thread_ref(&conn, thread_id)? else {
            return Ok(None);
        };
        conn.execute(
            "INSERT INTO messages (thread_ref, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![thread_ref, role, content, Utc::now().trunc_subsecs(3)],
        )?;
        let messages = load_messages(&conn, thread_ref)?;
        Ok(Some(Thread {
            thread_id: thread_id.to_string(),
            messages,
        }))
    }
}

fn find_thread_ref(conn: &Connection, thread_id: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM threads WHERE thread_id = ?1 ORDER BY id ASC LIMIT 1",
        params![thread_id],
        |row| row.get(0),
    )
    .optional()
}

fn load_messages(conn: &Connection, thread_ref: i64) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT role, content, timestamp FROM messages WHERE thread_ref = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![thread_ref], |row| {
        Ok(Message {
            role: row.get(0)?,
            content: row.get(1)?,
            timestamp: row.get(2)?,
        })
    })?;
    rows.collect()
}
