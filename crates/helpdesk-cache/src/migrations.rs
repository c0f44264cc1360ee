use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ticket_mirror (
            id          TEXT PRIMARY KEY,
            created_at  TEXT NOT NULL,
            body        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_ticket_mirror_created
            ON ticket_mirror(created_at);
        ",
    )?;

    info!("Local cache migrations complete");
    Ok(())
}
