/// Shared types for the helpdesk client core.
///
/// Domain models, request payloads and refresh events live here so the
/// backend adapters, the local cache and the policy layer all agree on one
/// canonical definition.

pub mod api;
pub mod events;
pub mod models;
