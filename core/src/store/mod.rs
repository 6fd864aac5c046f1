//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Scoring code calls store methods; it never executes SQL directly.

use crate::error::RetentionResult;
use rusqlite::Connection;

mod at_risk;
mod competitor;
mod customer;

pub struct RetentionStore {
    conn: Connection,
}

impl RetentionStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> RetentionResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RetentionResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Idempotent.
    pub fn migrate(&self) -> RetentionResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_customers.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_competitor_prices.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_at_risk_customers.sql"))?;
        Ok(())
    }
}
