use std::collections::HashMap;

use serde_json::json;
use uuid::Uuid;

use helpdesk_backend::Order;
use helpdesk_types::events::Refresh;
use helpdesk_types::models::{Interaction, InteractionKind};

use crate::{Client, Error};

impl Client {
    /// Attach a comment to a ticket. Whitespace-only messages are rejected
    /// before anything reaches the backend.
    pub async fn add_comment(&self, ticket_id: Uuid, message: &str) -> Result<Interaction, Error> {
        let session = self.session()?;

        if message.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }

        self.append_interaction(
            ticket_id,
            session.identity.id,
            message.to_string(),
            InteractionKind::Comment,
        )
        .await
    }

    /// A ticket's thread, oldest first for conversational reading order.
    pub async fn list_interactions(&self, ticket_id: Uuid) -> Result<Vec<Interaction>, Error> {
        let rows = self
            .backend
            .query(
                "interactions",
                &[("ticket_id", json!(ticket_id))],
                Some(Order::asc("created_at")),
            )
            .await?;

        let mut interactions = Vec::with_capacity(rows.len());
        for row in rows {
            interactions.push(crate::decode::<Interaction>(row)?);
        }

        let mut memo = HashMap::new();
        for interaction in &mut interactions {
            interaction.author = self.lookup_profile(&mut memo, interaction.author_id).await;
        }

        self.store
            .update(|s| s.interactions = interactions.clone());

        Ok(interactions)
    }

    pub(crate) async fn append_interaction(
        &self,
        ticket_id: Uuid,
        author_id: Uuid,
        message: String,
        kind: InteractionKind,
    ) -> Result<Interaction, Error> {
        let record = json!({
            "ticket_id": ticket_id,
            "author_id": author_id,
            "message": message,
            "kind": kind,
        });

        let stored = self.backend.insert("interactions", record).await?;
        let interaction = crate::decode(stored)?;

        self.refresh.emit(Refresh::Interactions { ticket_id });
        Ok(interaction)
    }
}
