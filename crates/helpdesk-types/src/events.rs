use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Refresh messages emitted after a successful mutation.
///
/// Policy code never re-fetches on its own; it announces what became stale
/// and whichever coordinator is subscribed performs the corresponding
/// re-fetch. Fire-and-forget relative to the operation that emitted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Refresh {
    /// The visible ticket list is stale
    Tickets,

    /// One ticket's interaction thread is stale
    Interactions { ticket_id: Uuid },
}
