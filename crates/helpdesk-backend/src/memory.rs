use std::collections::HashMap;
use std::sync::Mutex;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use helpdesk_types::api::AuthIdentity;

use crate::{Backend, BackendError, FieldEq, Order};

/// In-process stand-in for the hosted platform: collections are plain
/// vectors of JSON records, credentials are argon2-hashed, the session is a
/// single slot. Used by tests and by local mode; state dies with the
/// process.
pub struct MemoryBackend {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    collections: HashMap<String, Vec<Value>>,
    session: Option<AuthIdentity>,
}

struct Account {
    id: Uuid,
    password_hash: String,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, BackendError> {
        self.state
            .lock()
            .map_err(|_| BackendError::Internal("state lock poisoned".into()))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn create_account(
        &self,
        address: &str,
        secret: &str,
        attributes: Value,
    ) -> Result<AuthIdentity, BackendError> {
        let mut state = self.lock()?;

        if state.accounts.contains_key(address) {
            return Err(BackendError::Duplicate);
        }

        // Hash with Argon2id, same as any credential store worth the name
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| BackendError::Internal(e.to_string()))?
            .to_string();

        let id = Uuid::new_v4();
        state.accounts.insert(
            address.to_string(),
            Account { id, password_hash },
        );

        // The hosted platform provisions the profile row from the
        // registration attributes; mirror that here.
        if let Value::Object(mut attrs) = attributes {
            if !attrs.is_empty() {
                let now = json!(Utc::now());
                attrs.insert("id".into(), json!(id));
                attrs.entry("created_at").or_insert(now.clone());
                attrs.entry("updated_at").or_insert(now);
                state
                    .collections
                    .entry("profiles".to_string())
                    .or_default()
                    .push(Value::Object(attrs));
            }
        }

        Ok(AuthIdentity {
            id,
            address: address.to_string(),
        })
    }

    async fn authenticate(
        &self,
        address: &str,
        secret: &str,
    ) -> Result<AuthIdentity, BackendError> {
        let mut state = self.lock()?;

        let account = state
            .accounts
            .get(address)
            .ok_or(BackendError::InvalidCredentials)?;

        let parsed_hash = PasswordHash::new(&account.password_hash)
            .map_err(|e| BackendError::Internal(e.to_string()))?;

        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed_hash)
            .map_err(|_| BackendError::InvalidCredentials)?;

        let identity = AuthIdentity {
            id: account.id,
            address: address.to_string(),
        };
        state.session = Some(identity.clone());

        Ok(identity)
    }

    async fn end_session(&self) -> Result<(), BackendError> {
        self.lock()?.session = None;
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<AuthIdentity>, BackendError> {
        Ok(self.lock()?.session.clone())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldEq],
        order: Option<Order>,
    ) -> Result<Vec<Value>, BackendError> {
        let state = self.lock()?;

        let mut rows: Vec<Value> = state
            .collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| {
                        filters
                            .iter()
                            .all(|(field, want)| record.get(*field) == Some(want))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order {
            rows.sort_by(|a, b| {
                compare_fields(a.get(order.column), b.get(order.column))
            });
            if order.descending {
                rows.reverse();
            }
        }

        Ok(rows)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Value, BackendError> {
        let state = self.lock()?;

        state
            .collections
            .get(collection)
            .and_then(|records| records.iter().find(|r| record_id_is(r, id)))
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<Value, BackendError> {
        let Value::Object(mut fields) = record else {
            return Err(BackendError::Malformed("record must be an object".into()));
        };

        // Platform-assigned defaults
        let now = json!(Utc::now());
        fields
            .entry("id")
            .or_insert_with(|| json!(Uuid::new_v4()));
        fields.entry("created_at").or_insert(now.clone());
        fields.entry("updated_at").or_insert(now);

        let stored = Value::Object(fields);
        self.lock()?
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> Result<Value, BackendError> {
        let Value::Object(patch) = patch else {
            return Err(BackendError::Malformed("patch must be an object".into()));
        };

        let mut state = self.lock()?;
        let records = state
            .collections
            .get_mut(collection)
            .ok_or(BackendError::NotFound)?;

        let record = records
            .iter_mut()
            .find(|r| record_id_is(r, id))
            .ok_or(BackendError::NotFound)?;

        match record {
            Value::Object(fields) => {
                for (key, value) in patch {
                    fields.insert(key, value);
                }
                fields.insert("updated_at".into(), json!(Utc::now()));
                Ok(Value::Object(fields.clone()))
            }
            _ => Err(BackendError::Internal("corrupt stored record".into())),
        }
    }
}

fn record_id_is(record: &Value, id: &str) -> bool {
    record.get("id").and_then(Value::as_str) == Some(id)
}

/// Field ordering for query sorting. Timestamp strings are compared as
/// instants so sub-second formatting differences cannot reorder rows;
/// everything else falls back to a lexical comparison.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (
                a.parse::<chrono::DateTime<Utc>>(),
                b.parse::<chrono::DateTime<Utc>>(),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn account_lifecycle() {
        let backend = MemoryBackend::new();

        let attrs = json!({"short_name": "joao_p", "role": "professor"});
        let created = backend
            .create_account("joao_p@campus.local", "hunter22", attrs.clone())
            .await
            .unwrap();

        // Same address again is a duplicate
        let err = backend
            .create_account("joao_p@campus.local", "hunter22", attrs)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Duplicate));

        // Registration does not sign in
        assert!(backend.current_session().await.unwrap().is_none());

        let err = backend
            .authenticate("joao_p@campus.local", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidCredentials));

        let identity = backend
            .authenticate("joao_p@campus.local", "hunter22")
            .await
            .unwrap();
        assert_eq!(identity.id, created.id);
        assert_eq!(
            backend.current_session().await.unwrap(),
            Some(identity)
        );

        backend.end_session().await.unwrap();
        assert!(backend.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn profile_provisioned_from_attributes() {
        let backend = MemoryBackend::new();
        let identity = backend
            .create_account(
                "ana_r@campus.local",
                "secret99",
                json!({"short_name": "ana_r", "display_name": "Ana R.", "role": "admin"}),
            )
            .await
            .unwrap();

        let profile = backend
            .get("profiles", &identity.id.to_string())
            .await
            .unwrap();
        assert_eq!(profile["short_name"], json!("ana_r"));
        assert_eq!(profile["role"], json!("admin"));
        assert!(profile.get("created_at").is_some());
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let backend = MemoryBackend::new();
        let stored = backend
            .insert("tickets", json!({"title": "no sound"}))
            .await
            .unwrap();

        assert!(stored.get("id").and_then(Value::as_str).is_some());
        assert!(stored.get("created_at").is_some());
        assert!(stored.get("updated_at").is_some());
    }

    #[tokio::test]
    async fn query_filters_and_orders() {
        let backend = MemoryBackend::new();
        for (title, status) in [("a", "open"), ("b", "resolved"), ("c", "open")] {
            backend
                .insert("tickets", json!({"title": title, "status": status}))
                .await
                .unwrap();
        }

        let open = backend
            .query(
                "tickets",
                &[("status", json!("open"))],
                Some(Order::desc("created_at")),
            )
            .await
            .unwrap();

        assert_eq!(open.len(), 2);
        // Most recent insert first
        assert_eq!(open[0]["title"], json!("c"));
        assert_eq!(open[1]["title"], json!("a"));
    }

    #[tokio::test]
    async fn update_patches_or_reports_missing() {
        let backend = MemoryBackend::new();
        let stored = backend
            .insert("tickets", json!({"title": "x", "status": "open"}))
            .await
            .unwrap();
        let id = stored["id"].as_str().unwrap().to_string();

        let updated = backend
            .update("tickets", &id, json!({"status": "resolved"}))
            .await
            .unwrap();
        assert_eq!(updated["status"], json!("resolved"));
        assert_eq!(updated["title"], json!("x"));

        let err = backend
            .update("tickets", &Uuid::new_v4().to_string(), json!({"status": "open"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound));
    }
}
