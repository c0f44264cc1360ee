use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Category, Priority, Profile, Role};

// -- Auth --

/// The backend platform's view of an authenticated account. Canonical
/// definition lives here in helpdesk-types so the backend adapters and the
/// policy layer share one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub address: String,
}

/// What the session cache persists: the last known identity together with
/// its role-bearing profile, so the UI can render before the first network
/// round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub identity: AuthIdentity,
    pub profile: Profile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub short_name: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: Role,
}

// -- Tickets --

/// Fields a professor fills in when opening a ticket. Priority falls back
/// to normal when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDraft {
    pub title: String,
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub location: Option<String>,
}
