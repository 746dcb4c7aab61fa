pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Start a write transaction. The write lock is taken immediately, so two
    /// units of work never interleave their reads and writes.
    pub fn begin(&self) -> Result<UnitOfWork<'_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(UnitOfWork {
            conn,
            finished: false,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("DB lock poisoned: {}", e))
    }
}

/// A scoped transaction. Changes become visible only on [`UnitOfWork::commit`];
/// dropping it without committing rolls everything back.
pub struct UnitOfWork<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl UnitOfWork<'_> {
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("Rollback of abandoned unit of work failed: {}", e);
            }
        }
    }
}

/// Timestamps are stored as fixed-width RFC 3339 UTC text so that string
/// comparison in SQL matches chronological order.
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_chronologically_as_text() {
        let early = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();

        assert!(encode_timestamp(early) < encode_timestamp(late));
        assert_eq!(decode_timestamp(&encode_timestamp(late)).unwrap(), late);
    }

    #[test]
    fn dropped_unit_of_work_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        {
            let uow = db.begin().unwrap();
            uow.conn()
                .execute(
                    "INSERT INTO users (id, username, email, password) VALUES ('u1', 'alice', 'a@b.com', 'x')",
                    [],
                )
                .unwrap();
        }

        assert!(db.get_user_by_email("a@b.com").unwrap().is_none());
    }

    #[test]
    fn committed_unit_of_work_persists() {
        let db = Database::open_in_memory().unwrap();
        let uow = db.begin().unwrap();
        uow.conn()
            .execute(
                "INSERT INTO users (id, username, email, password) VALUES ('u1', 'alice', 'a@b.com', 'x')",
                [],
            )
            .unwrap();
        uow.commit().unwrap();

        assert!(db.get_user_by_email("a@b.com").unwrap().is_some());
    }
}
