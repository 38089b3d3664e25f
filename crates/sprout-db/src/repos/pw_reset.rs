use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::PwResetTokenRow;

impl Database {
    /// Delete any outstanding reset tokens of the user and store a fresh one.
    pub fn replace_pw_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PwResetTokenRow> {
        self.transaction("replace_pw_reset_token", |tx| {
            tx.execute("DELETE FROM pw_reset_tokens WHERE user_id = ?1", [user_id])?;
            tx.execute(
                "INSERT INTO pw_reset_tokens (user_id, token, expires_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![user_id, token, expires_at],
            )?;
            Ok(PwResetTokenRow {
                id: tx.last_insert_rowid(),
                user_id,
                token: token.to_string(),
                expires_at,
            })
        })
    }

    pub fn get_pw_reset_token(&self, token: &str) -> Result<Option<PwResetTokenRow>> {
        self.transaction("get_pw_reset_token", |tx| {
            let row = tx
                .query_row(
                    "SELECT id, user_id, token, expires_at FROM pw_reset_tokens WHERE token = ?1",
                    [token],
                    |row| {
                        Ok(PwResetTokenRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            token: row.get(2)?,
                            expires_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_user_pw_reset_tokens(&self, user_id: i64) -> Result<usize> {
        self.transaction("delete_user_pw_reset_tokens", |tx| {
            Ok(tx.execute("DELETE FROM pw_reset_tokens WHERE user_id = ?1", [user_id])?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_token_supersedes_old_one() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ann@example.com", "h", "Ann").unwrap();
        let expires = Utc::now() + Duration::hours(1);

        db.replace_pw_reset_token(user.id, "old", expires).unwrap();
        db.replace_pw_reset_token(user.id, "new", expires).unwrap();

        assert!(db.get_pw_reset_token("old").unwrap().is_none());
        let row = db.get_pw_reset_token("new").unwrap().unwrap();
        assert_eq!(row.user_id, user.id);
        assert_eq!(row.expires_at, expires);

        assert_eq!(db.delete_user_pw_reset_tokens(user.id).unwrap(), 1);
        assert!(db.get_pw_reset_token("new").unwrap().is_none());
    }
}
