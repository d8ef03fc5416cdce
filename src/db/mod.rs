pub mod events;
pub mod migrations;
pub mod sessions;

use anyhow::Context;
use rusqlite::Connection;

pub use sessions::{InMemorySessionRepository, SessionRepository, SqliteSessionRepository};

/// `memory` opens a private in-memory database.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = if path == "memory" {
        Connection::open_in_memory().context("failed to open in-memory database")?
    } else {
        let conn = Connection::open(path).context("failed to open database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("failed to set database pragmas")?;
        conn
    };

    conn.execute_batch("PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}
