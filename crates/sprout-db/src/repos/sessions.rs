use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::Database;
use crate::models::SessionRow;
use crate::repos::users::touch_last_login;

impl Database {
    /// Login bookkeeping in one unit: stamp `last_login`, drop every earlier
    /// session of the user, then insert the new one.
    pub fn start_session(
        &self,
        user_id: i64,
        token: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRow> {
        anyhow::ensure!(
            expires_at > created_at,
            "session must expire after it is created"
        );

        self.transaction("start_session", |tx| {
            touch_last_login(tx, user_id, created_at)?;
            delete_sessions_of(tx, user_id)?;
            insert_session(tx, user_id, token, created_at, expires_at)
        })
    }

    pub fn get_session(&self, token: &str) -> Result<Option<SessionRow>> {
        self.transaction("get_session", |tx| {
            let row = tx
                .query_row(
                    "SELECT id, user_id, token, expires_at, created_at FROM sessions WHERE token = ?1",
                    [token],
                    |row| {
                        Ok(SessionRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            token: row.get(2)?,
                            expires_at: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Returns how many sessions were removed.
    pub fn delete_user_sessions(&self, user_id: i64) -> Result<usize> {
        self.transaction("delete_user_sessions", |tx| delete_sessions_of(tx, user_id))
    }
}

fn insert_session(
    conn: &Connection,
    user_id: i64,
    token: &str,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<SessionRow> {
    conn.execute(
        "INSERT INTO sessions (user_id, token, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![user_id, token, expires_at, created_at],
    )?;
    Ok(SessionRow {
        id: conn.last_insert_rowid(),
        user_id,
        token: token.to_string(),
        expires_at,
        created_at,
    })
}

fn delete_sessions_of(conn: &Connection, user_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?)
}
