use serde::Serialize;

use helpdesk_types::models::{Category, Status, Ticket, TicketFilters};

/// True when `ticket` passes every active constraint. `admin_view` widens
/// the text search to the owner's short and display names, matching what
/// the triage dashboard shows alongside each card.
pub fn matches(ticket: &Ticket, filters: &TicketFilters, admin_view: bool) -> bool {
    if let Some(status) = filters.status {
        if ticket.status != status {
            return false;
        }
    }
    if let Some(category) = filters.category {
        if ticket.category != category {
            return false;
        }
    }
    if filters.search.is_empty() {
        return true;
    }

    let needle = filters.search.to_lowercase();
    if ticket.title.to_lowercase().contains(&needle)
        || ticket.description.to_lowercase().contains(&needle)
    {
        return true;
    }

    if admin_view {
        if let Some(owner) = &ticket.owner {
            if owner.short_name.to_lowercase().contains(&needle) {
                return true;
            }
            if let Some(display) = &owner.display_name {
                if display.to_lowercase().contains(&needle) {
                    return true;
                }
            }
        }
    }

    false
}

/// Order-preserving narrowing of an already-fetched list. No network
/// interaction; recomputed synchronously whenever the filters or the list
/// change.
pub fn apply(tickets: &[Ticket], filters: &TicketFilters, admin_view: bool) -> Vec<Ticket> {
    tickets
        .iter()
        .filter(|ticket| matches(ticket, filters, admin_view))
        .cloned()
        .collect()
}

/// Per-status counters over the unfiltered list, for the dashboard header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTally {
    pub open: usize,
    pub in_progress: usize,
    pub resolved: usize,
}

pub fn status_tally(tickets: &[Ticket]) -> StatusTally {
    let mut tally = StatusTally::default();
    for ticket in tickets {
        match ticket.status {
            Status::Open => tally.open += 1,
            Status::InProgress => tally.in_progress += 1,
            Status::Resolved => tally.resolved += 1,
        }
    }
    tally
}

/// Per-category counters over the unfiltered list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTally {
    pub network: usize,
    pub hardware: usize,
    pub software: usize,
    pub projector: usize,
    pub other: usize,
}

pub fn category_tally(tickets: &[Ticket]) -> CategoryTally {
    let mut tally = CategoryTally::default();
    for ticket in tickets {
        match ticket.category {
            Category::Network => tally.network += 1,
            Category::Hardware => tally.hardware += 1,
            Category::Software => tally.software += 1,
            Category::Projector => tally.projector += 1,
            Category::Other => tally.other += 1,
        }
    }
    tally
}
