use crate::LocalCache;
use anyhow::Result;
use rusqlite::Connection;
use tracing::warn;

use helpdesk_types::api::Session;
use helpdesk_types::models::Ticket;

const SESSION_KEY: &str = "session";

impl LocalCache {
    // -- Session blob --

    pub fn save_session(&self, session: &Session) -> Result<()> {
        let blob = serde_json::to_string(session)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                (SESSION_KEY, &blob),
            )?;
            Ok(())
        })
    }

    /// Last persisted session, or None. A blob that no longer parses is
    /// treated as absent rather than an error.
    pub fn load_session(&self) -> Result<Option<Session>> {
        let blob = self.with_conn(|conn| query_kv(conn, SESSION_KEY))?;

        match blob {
            None => Ok(None),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(session) => Ok(Some(session)),
                Err(e) => {
                    warn!("Discarding unreadable session blob: {}", e);
                    Ok(None)
                }
            },
        }
    }

    pub fn clear_session(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", [SESSION_KEY])?;
            Ok(())
        })
    }

    // -- Ticket mirror --

    /// Replace the whole mirror with the latest fetched list. No merging,
    /// no conflict resolution: last fetch wins.
    pub fn replace_tickets(&self, tickets: &[Ticket]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM ticket_mirror", [])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO ticket_mirror (id, created_at, body) VALUES (?1, ?2, ?3)",
                )?;
                for ticket in tickets {
                    let body = serde_json::to_string(ticket)?;
                    stmt.execute((
                        ticket.id.to_string(),
                        ticket.created_at.to_rfc3339(),
                        body,
                    ))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Mirrored tickets, most recent first. Rows that no longer parse are
    /// skipped with a warning.
    pub fn load_tickets(&self) -> Result<Vec<Ticket>> {
        self.with_conn(|conn| query_mirror(conn))
    }
}

fn query_kv(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;

    let row = match stmt.query_row([key], |row| row.get::<_, String>(0)) {
        Ok(val) => Some(val),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };

    Ok(row)
}

fn query_mirror(conn: &Connection) -> Result<Vec<Ticket>> {
    let mut stmt =
        conn.prepare("SELECT id, body FROM ticket_mirror ORDER BY created_at DESC")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut tickets = Vec::with_capacity(rows.len());
    for (id, body) in rows {
        match serde_json::from_str::<Ticket>(&body) {
            Ok(ticket) => tickets.push(ticket),
            Err(e) => warn!("Skipping corrupt mirror row '{}': {}", id, e),
        }
    }

    Ok(tickets)
}
