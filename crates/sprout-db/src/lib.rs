pub mod migrations;
pub mod models;
pub mod repos;
pub mod series;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

pub use series::SeriesStore;

/// Relational store for users, sessions, reset tokens and devices.
///
/// Every repository method runs inside exactly one transaction obtained
/// through [`Database::transaction`]; there is no multi-call unit of work.
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

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` inside a transaction and commit if it returns `Ok`.
    ///
    /// Any error (from `f` or from the commit itself) drops the transaction,
    /// which rolls it back. Errors are tagged with `op` so callers see which
    /// repository operation failed.
    pub fn transaction<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;

        let tx = conn.transaction().with_context(|| format!("{op}: begin"))?;
        let value = f(&tx).with_context(|| op)?;
        tx.commit().with_context(|| format!("{op}: commit"))?;

        debug!(op, "transaction committed");
        Ok(value)
    }
}

/// True when `err` was caused by a UNIQUE / FOREIGN KEY / CHECK violation.
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    })
}
