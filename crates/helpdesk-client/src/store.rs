use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use helpdesk_types::api::Session;
use helpdesk_types::events::Refresh;
use helpdesk_types::models::{Interaction, Ticket, TicketFilters};

/// Who the UI should currently treat as signed in. `Unknown` only exists
/// between process start and the first session restore.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionState {
    Unknown,
    SignedOut,
    SignedIn(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) => Some(session),
            _ => None,
        }
    }
}

/// Everything a UI surface renders from, as one value. Operations never
/// mutate pieces in place — they build the next snapshot and publish it
/// whole, so subscribers always observe a consistent state.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub session: SessionState,
    pub tickets: Vec<Ticket>,
    pub current_ticket: Option<Ticket>,
    pub interactions: Vec<Interaction>,
    pub filters: TicketFilters,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            session: SessionState::Unknown,
            tickets: Vec::new(),
            current_ticket: None,
            interactions: Vec::new(),
            filters: TicketFilters::default(),
        }
    }
}

/// Central state container. Owned by the application shell and handed to
/// the policy layer — deliberately not a process-wide singleton, so tests
/// run each policy against its own store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    tx: watch::Sender<Snapshot>,
}

impl Store {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self {
            inner: Arc::new(StoreInner { tx }),
        }
    }

    /// Watch for snapshot replacements. The receiver sees the latest value
    /// only; intermediate states may be skipped under load.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.tx.borrow().clone()
    }

    /// Whole-state replacement: clone the current snapshot, let the caller
    /// mutate the clone, publish it.
    pub fn update(&self, mutate: impl FnOnce(&mut Snapshot)) {
        let mut next = self.snapshot();
        mutate(&mut next);
        self.inner.tx.send_replace(next);
    }
}

/// Broadcasts refresh messages from policy code to whichever coordinator
/// is currently subscribed.
#[derive(Clone)]
pub struct RefreshBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    tx: broadcast::Sender<Refresh>,
}

impl RefreshBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(BusInner { tx }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Refresh> {
        self.inner.tx.subscribe()
    }

    /// Fire-and-forget: with nobody subscribed the message is dropped.
    pub fn emit(&self, refresh: Refresh) {
        let _ = self.inner.tx.send(refresh);
    }
}
