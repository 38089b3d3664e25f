use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::Database;
use crate::models::UserRow;

const USER_COLUMNS: &str = "id, email, name, pw_hash, created_at, last_login";

impl Database {
    pub fn create_user(&self, email: &str, pw_hash: &str, name: &str) -> Result<UserRow> {
        self.transaction("create_user", |tx| {
            tx.execute(
                "INSERT INTO users (email, name, pw_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![email, name, pw_hash, Utc::now()],
            )?;
            let id = tx.last_insert_rowid();
            query_user_by_id(tx, id)?
                .ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", id))
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.transaction("get_user", |tx| query_user_by_id(tx, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.transaction("get_user_by_email", |tx| {
            let row = tx
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                    [email],
                    map_user,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Returns false when no user has that id.
    pub fn change_password(&self, id: i64, pw_hash: &str) -> Result<bool> {
        self.transaction("change_password", |tx| {
            let n = tx.execute(
                "UPDATE users SET pw_hash = ?2 WHERE id = ?1",
                rusqlite::params![id, pw_hash],
            )?;
            Ok(n > 0)
        })
    }
}

pub(crate) fn touch_last_login(conn: &Connection, id: i64, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE users SET last_login = ?2 WHERE id = ?1",
        rusqlite::params![id, at],
    )?;
    Ok(())
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id],
            map_user,
        )
        .optional()?;
    Ok(row)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        pw_hash: row.get(3)?,
        created_at: row.get(4)?,
        last_login: row.get(5)?,
    })
}
