/// Policy core of the helpdesk client.
///
/// Every operation here is a thin ruling layered over the backend
/// capability surface: who may see which tickets, which status writes get
/// an audit trail, what a valid registration looks like. Results are folded
/// into a central [`store::Store`] snapshot and staleness is announced on a
/// [`store::RefreshBus`]; the application shell owns both and does all
/// re-fetching.

pub mod auth;
pub mod error;
pub mod filter;
pub mod interactions;
pub mod store;
pub mod tickets;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use helpdesk_backend::{Backend, BackendError};
use helpdesk_cache::LocalCache;
use helpdesk_types::api::Session;

pub use error::Error;
pub use store::{RefreshBus, SessionState, Snapshot, Store};

/// Client-side settings. The tenant domain is the fixed suffix appended to
/// a short name to form the backend address.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub tenant_domain: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tenant_domain: "campus.local".to_string(),
        }
    }
}

/// The policy layer's handle on everything it needs: the backend adapter,
/// the local cache, and the shell-owned store and refresh bus. All shared
/// state lives in the store; the client itself holds no mutable state.
pub struct Client {
    backend: Arc<dyn Backend>,
    cache: Arc<LocalCache>,
    store: Store,
    refresh: RefreshBus,
    config: ClientConfig,
}

impl Client {
    pub fn new(
        backend: Arc<dyn Backend>,
        cache: Arc<LocalCache>,
        store: Store,
        refresh: RefreshBus,
        config: ClientConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            store,
            refresh,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn refresh(&self) -> &RefreshBus {
        &self.refresh
    }

    /// The signed-in session, or the backend's "not authenticated" failure
    /// for operations that need a caller.
    pub(crate) fn session(&self) -> Result<Session, Error> {
        match self.store.snapshot().session {
            SessionState::SignedIn(session) => Ok(session),
            _ => Err(Error::Backend(BackendError::NotAuthenticated)),
        }
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value(value)
        .map_err(|e| Error::Backend(BackendError::Malformed(e.to_string())))
}
