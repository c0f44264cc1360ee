/// Backend capability surface.
///
/// Everything the client core needs from the hosted platform, reduced to an
/// auth surface plus generic record operations over named collections. Two
/// adapters implement it: [`rest::RestBackend`] talks to the hosted
/// platform over HTTPS, [`memory::MemoryBackend`] is an in-process stand-in
/// for tests and local mode.

pub mod error;
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;

use helpdesk_types::api::AuthIdentity;

pub use error::BackendError;
pub use memory::MemoryBackend;
pub use rest::{RestBackend, RestConfig};

/// Sort order for a query, by a single column.
#[derive(Debug, Clone, Copy)]
pub struct Order {
    pub column: &'static str,
    pub descending: bool,
}

impl Order {
    pub fn asc(column: &'static str) -> Self {
        Self { column, descending: false }
    }

    pub fn desc(column: &'static str) -> Self {
        Self { column, descending: true }
    }
}

/// Equality constraint on a record field.
pub type FieldEq = (&'static str, Value);

#[async_trait]
pub trait Backend: Send + Sync {
    /// Create an account. `attributes` travel with the registration and the
    /// platform provisions the matching profile record from them.
    /// Does not establish a session.
    async fn create_account(
        &self,
        address: &str,
        secret: &str,
        attributes: Value,
    ) -> Result<AuthIdentity, BackendError>;

    /// Validate credentials and establish the adapter's session.
    async fn authenticate(&self, address: &str, secret: &str)
        -> Result<AuthIdentity, BackendError>;

    /// Tear down the adapter's session.
    async fn end_session(&self) -> Result<(), BackendError>;

    /// Whoever the adapter currently considers signed in, re-checked
    /// against the platform rather than answered from local memory alone.
    async fn current_session(&self) -> Result<Option<AuthIdentity>, BackendError>;

    /// Records of `collection` matching every equality filter, sorted.
    async fn query(
        &self,
        collection: &str,
        filters: &[FieldEq],
        order: Option<Order>,
    ) -> Result<Vec<Value>, BackendError>;

    /// Single record by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Value, BackendError>;

    /// Insert a record; the platform assigns id and timestamps when the
    /// record carries none. Returns the stored representation.
    async fn insert(&self, collection: &str, record: Value) -> Result<Value, BackendError>;

    /// Patch fields of an existing record. Returns the stored
    /// representation; `NotFound` when no such id exists.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> Result<Value, BackendError>;
}
