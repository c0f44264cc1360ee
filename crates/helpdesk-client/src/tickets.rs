use std::collections::HashMap;

use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use helpdesk_backend::Order;
use helpdesk_types::api::TicketDraft;
use helpdesk_types::events::Refresh;
use helpdesk_types::models::{InteractionKind, Profile, Role, Status, Ticket};

use crate::{Client, Error};

impl Client {
    /// Tickets visible to the caller, most recent first.
    ///
    /// Two-step role trust: the cached role merely nominates the caller for
    /// the unrestricted path, and a fresh profile fetch against the backend
    /// has to confirm it — the cached role can be stale relative to a
    /// backend-side change. Everyone else gets the owner-constrained query.
    pub async fn list_tickets(&self) -> Result<Vec<Ticket>, Error> {
        let session = self.session()?;
        let caller = session.identity.id;

        let cached_admin = session.profile.role == Role::Admin;
        let unrestricted = cached_admin && self.verified_admin(caller).await?;

        let filters = if unrestricted {
            vec![]
        } else {
            vec![("owner_id", json!(caller))]
        };

        let rows = self
            .backend
            .query("tickets", &filters, Some(Order::desc("created_at")))
            .await?;

        let mut tickets = Vec::with_capacity(rows.len());
        for row in rows {
            tickets.push(crate::decode::<Ticket>(row)?);
        }

        let mut memo = HashMap::new();
        for ticket in &mut tickets {
            ticket.owner = self.lookup_profile(&mut memo, ticket.owner_id).await;
        }

        if let Err(e) = self.cache.replace_tickets(&tickets) {
            warn!("Failed to mirror ticket list: {}", e);
        }
        self.store.update(|s| s.tickets = tickets.clone());

        Ok(tickets)
    }

    pub async fn get_ticket(&self, id: Uuid) -> Result<Ticket, Error> {
        let value = self.backend.get("tickets", &id.to_string()).await?;
        let mut ticket: Ticket = crate::decode(value)?;

        let mut memo = HashMap::new();
        ticket.owner = self.lookup_profile(&mut memo, ticket.owner_id).await;

        self.store
            .update(|s| s.current_ticket = Some(ticket.clone()));

        Ok(ticket)
    }

    /// File a new ticket owned by the caller. Status always starts open;
    /// priority falls back to normal.
    pub async fn create_ticket(&self, draft: &TicketDraft) -> Result<Ticket, Error> {
        let session = self.session()?;

        if draft.title.trim().is_empty() || draft.description.trim().is_empty() {
            return Err(Error::Validation("title and description are required"));
        }

        let record = json!({
            "owner_id": session.identity.id,
            "title": draft.title,
            "description": draft.description,
            "category": draft.category,
            "priority": draft.priority.unwrap_or_default(),
            "status": Status::default(),
            "location": draft.location,
        });

        let stored = self.backend.insert("tickets", record).await?;
        let ticket: Ticket = crate::decode(stored)?;

        self.refresh.emit(Refresh::Tickets);
        Ok(ticket)
    }

    /// Move a ticket to `status`, appending the audit interaction that must
    /// accompany every transition — no-op transitions included.
    ///
    /// Authorization is the surrounding layer's job: the shell only routes
    /// this to admin sessions, and this function trusts its caller. The
    /// audit entry is appended strictly after the status write succeeds, so
    /// a failed write never leaves a dangling audit note.
    pub async fn set_status(&self, ticket_id: Uuid, status: Status) -> Result<(), Error> {
        let session = self.session()?;

        self.backend
            .update("tickets", &ticket_id.to_string(), json!({ "status": status }))
            .await?;

        self.append_interaction(
            ticket_id,
            session.identity.id,
            format!("Status changed to: {}", status),
            InteractionKind::StatusChange,
        )
        .await?;

        self.refresh.emit(Refresh::Tickets);
        Ok(())
    }

    async fn verified_admin(&self, caller: Uuid) -> Result<bool, Error> {
        match self.resolve_profile(caller).await? {
            Some(profile) => Ok(profile.role == Role::Admin),
            None => Ok(false),
        }
    }

    /// Memoized profile denormalization. A missing or unreadable profile
    /// leaves the slot empty rather than failing the listing.
    pub(crate) async fn lookup_profile(
        &self,
        memo: &mut HashMap<Uuid, Option<Profile>>,
        id: Uuid,
    ) -> Option<Profile> {
        if let Some(hit) = memo.get(&id) {
            return hit.clone();
        }

        let fetched = match self.resolve_profile(id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Failed to resolve profile {}: {}", id, e);
                None
            }
        };

        memo.insert(id, fetched.clone());
        fetched
    }
}
