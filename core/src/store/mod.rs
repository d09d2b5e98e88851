//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! Services call store methods; they never execute SQL directly.
//!
//! The store never orders listing queries; ordering belongs to the
//! query planner. Duplicate and sweep scans iterate in insertion order.

mod activity;
mod complaint;

use crate::error::CoreResult;
use rusqlite::Connection;

pub struct CoreStore {
    conn: Connection,
}

impl CoreStore {
    pub fn open(path: &str) -> CoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open and migrate in one step.
    pub fn in_memory_migrated() -> CoreResult<Self> {
        let store = Self::in_memory()?;
        store.migrate()?;
        Ok(store)
    }

    /// Apply all schema migrations in order. Safe to call repeatedly.
    pub fn migrate(&self) -> CoreResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_complaints.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_activity_log.sql"))?;
        Ok(())
    }
}
