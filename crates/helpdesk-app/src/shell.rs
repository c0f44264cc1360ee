use serde::{Deserialize, Serialize};
use uuid::Uuid;

use helpdesk_client::filter::{self, CategoryTally, StatusTally};
use helpdesk_client::{SessionState, Snapshot};
use helpdesk_types::api::TicketDraft;
use helpdesk_types::models::{Category, Interaction, Role, Status, Ticket, TicketFilters};

/// Commands sent FROM the embedding UI TO the shell, one JSON object per
/// stdin line.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ShellCommand {
    Register {
        short_name: String,
        password: String,
        #[serde(default)]
        display_name: Option<String>,
        role: Role,
    },
    Login {
        short_name: String,
        password: String,
    },
    Logout,
    RefreshTickets,
    OpenTicket {
        id: Uuid,
    },
    CreateTicket {
        draft: TicketDraft,
    },
    SetStatus {
        id: Uuid,
        status: Status,
    },
    Comment {
        id: Uuid,
        message: String,
    },
    SetFilters {
        #[serde(default)]
        status: Option<Status>,
        #[serde(default)]
        category: Option<Category>,
        #[serde(default)]
        search: String,
    },
    Quit,
}

/// Events written to stdout, one JSON object per line.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ShellEvent {
    /// Full renderable state; emitted on every snapshot replacement
    State(StateView),

    /// A command failed; `kind` is stable, `message` is for display
    Error { kind: String, message: String },

    Bye,
}

/// What a UI surface renders: the snapshot plus the filtered view and the
/// dashboard tallies derived from it.
#[derive(Debug, Serialize)]
pub struct StateView {
    pub session: SessionState,
    pub visible_tickets: Vec<Ticket>,
    pub total_tickets: usize,
    pub current_ticket: Option<Ticket>,
    pub interactions: Vec<Interaction>,
    pub filters: TicketFilters,
    pub status_tally: StatusTally,
    pub category_tally: CategoryTally,
}

impl StateView {
    pub fn build(snapshot: &Snapshot) -> Self {
        let admin_view = matches!(
            &snapshot.session,
            SessionState::SignedIn(s) if s.profile.role == Role::Admin
        );

        Self {
            visible_tickets: filter::apply(&snapshot.tickets, &snapshot.filters, admin_view),
            total_tickets: snapshot.tickets.len(),
            status_tally: filter::status_tally(&snapshot.tickets),
            category_tally: filter::category_tally(&snapshot.tickets),
            session: snapshot.session.clone(),
            current_ticket: snapshot.current_ticket.clone(),
            interactions: snapshot.interactions.clone(),
            filters: snapshot.filters.clone(),
        }
    }
}
