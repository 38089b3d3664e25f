use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                email       TEXT NOT NULL UNIQUE,
                name        TEXT NOT NULL,
                pw_hash     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                last_login  TEXT
            );

            CREATE TABLE sessions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                token       TEXT NOT NULL UNIQUE,
                expires_at  TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_sessions_user ON sessions(user_id);

            CREATE TABLE pw_reset_tokens (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                token       TEXT NOT NULL UNIQUE,
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX idx_pw_reset_user ON pw_reset_tokens(user_id);

            CREATE TABLE devices (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id       INTEGER NOT NULL REFERENCES users(id),
                mac_addr      TEXT UNIQUE,
                display_name  TEXT NOT NULL
            );

            CREATE INDEX idx_devices_user ON devices(user_id);

            CREATE TABLE provision_staging (
                device_id   INTEGER PRIMARY KEY REFERENCES devices(id),
                contract    TEXT NOT NULL UNIQUE
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
