use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use helpdesk_types::api::AuthIdentity;

use crate::{Backend, BackendError, FieldEq, Order};

/// Connection settings for the hosted platform.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Platform project base URL, without trailing slash.
    pub base_url: String,
    /// Publishable API key sent with every request.
    pub api_key: String,
    /// Where the adapter persists its own token blob so the session
    /// survives restarts. None keeps the token in memory only.
    pub token_path: Option<PathBuf>,
}

/// Adapter for the hosted platform: token-grant auth endpoints plus
/// REST-over-collections record access with `field=eq.value` filters.
pub struct RestBackend {
    http: reqwest::Client,
    config: RestConfig,
    token: Mutex<Option<StoredToken>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    identity: AuthIdentity,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: PlatformUser,
}

#[derive(Debug, Deserialize)]
struct PlatformUser {
    id: Uuid,
    email: String,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> Self {
        let token = config
            .token_path
            .as_deref()
            .and_then(|path| match std::fs::read(path) {
                Ok(raw) => match serde_json::from_slice(&raw) {
                    Ok(token) => Some(token),
                    Err(e) => {
                        warn!("Discarding unreadable token blob: {}", e);
                        None
                    }
                },
                Err(_) => None,
            });

        Self {
            http: reqwest::Client::new(),
            config,
            token: Mutex::new(token),
        }
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.config.base_url, endpoint)
    }

    fn rest_url(&self, collection: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, collection)
    }

    fn bearer(&self) -> String {
        self.stored_token()
            .map(|t| t.access_token)
            .unwrap_or_else(|| self.config.api_key.clone())
    }

    fn stored_token(&self) -> Option<StoredToken> {
        self.token.lock().ok().and_then(|guard| guard.clone())
    }

    fn set_token(&self, token: Option<StoredToken>) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = token.clone();
        }

        // Persisting is best-effort; an unwritable disk must not fail auth
        if let Some(path) = self.config.token_path.as_deref() {
            let result = match &token {
                Some(token) => {
                    serde_json::to_vec(token).map_err(std::io::Error::other).and_then(|raw| std::fs::write(path, raw))
                }
                None => match std::fs::remove_file(path) {
                    Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
                    _ => Ok(()),
                },
            };
            if let Err(e) = result {
                warn!("Failed to persist token blob: {}", e);
            }
        }
    }

    async fn rest_request(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        let response = request
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.bearer())
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn create_account(
        &self,
        address: &str,
        secret: &str,
        attributes: Value,
    ) -> Result<AuthIdentity, BackendError> {
        let response = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({
                "email": address,
                "password": secret,
                "data": attributes,
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let user: PlatformUser = response.json().await?;
            return Ok(AuthIdentity {
                id: user.id,
                address: user.email,
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_signup_failure(status, &body))
    }

    async fn authenticate(
        &self,
        address: &str,
        secret: &str,
    ) -> Result<AuthIdentity, BackendError> {
        let response = self
            .http
            .post(self.auth_url("token?grant_type=password"))
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({
                "email": address,
                "password": secret,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
                Err(BackendError::InvalidCredentials)
            } else {
                Err(BackendError::Transport(format!("token grant failed: {}", status)))
            };
        }

        let grant: TokenResponse = response.json().await?;
        let identity = AuthIdentity {
            id: grant.user.id,
            address: grant.user.email,
        };

        self.set_token(Some(StoredToken {
            access_token: grant.access_token,
            identity: identity.clone(),
        }));

        Ok(identity)
    }

    async fn end_session(&self) -> Result<(), BackendError> {
        let token = self.stored_token();
        // Local teardown happens first; a dead network must not leave a
        // token behind.
        self.set_token(None);

        if let Some(token) = token {
            let response = self
                .http
                .post(self.auth_url("logout"))
                .header("apikey", &self.config.api_key)
                .bearer_auth(token.access_token)
                .send()
                .await?;
            debug!("Session end returned {}", response.status());
        }

        Ok(())
    }

    async fn current_session(&self) -> Result<Option<AuthIdentity>, BackendError> {
        let Some(token) = self.stored_token() else {
            return Ok(None);
        };

        // Skip the round trip when the token is visibly past its exp claim
        if token_expired(&token.access_token) {
            self.set_token(None);
            return Ok(None);
        }

        let response = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let user: PlatformUser = response.json().await?;
            Ok(Some(AuthIdentity {
                id: user.id,
                address: user.email,
            }))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.set_token(None);
            Ok(None)
        } else {
            Err(BackendError::Transport(format!(
                "session check failed: {}",
                status
            )))
        }
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldEq],
        order: Option<Order>,
    ) -> Result<Vec<Value>, BackendError> {
        let mut params: Vec<(String, String)> = filters
            .iter()
            .map(|(field, value)| ((*field).to_string(), format!("eq.{}", eq_operand(value))))
            .collect();
        if let Some(order) = order {
            params.push(("order".to_string(), order_param(&order)));
        }

        let response = self
            .rest_request(self.http.get(self.rest_url(collection)).query(&params))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Transport(format!("query failed: {}", status)));
        }

        Ok(response.json().await?)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Value, BackendError> {
        let response = self
            .rest_request(
                self.http
                    .get(self.rest_url(collection))
                    .query(&[("id", format!("eq.{}", id))])
                    // Ask for exactly one object; zero rows becomes an error
                    .header("Accept", "application/vnd.pgrst.object+json"),
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else if status == StatusCode::NOT_ACCEPTABLE || status == StatusCode::NOT_FOUND {
            Err(BackendError::NotFound)
        } else {
            Err(BackendError::Transport(format!("get failed: {}", status)))
        }
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<Value, BackendError> {
        let response = self
            .rest_request(
                self.http
                    .post(self.rest_url(collection))
                    .header("Prefer", "return=representation")
                    .json(&record),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Transport(format!("insert failed: {}", status)));
        }

        let mut rows: Vec<Value> = response.json().await?;
        if rows.is_empty() {
            return Err(BackendError::Malformed("insert returned no rows".into()));
        }
        Ok(rows.remove(0))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> Result<Value, BackendError> {
        let response = self
            .rest_request(
                self.http
                    .patch(self.rest_url(collection))
                    .query(&[("id", format!("eq.{}", id))])
                    .header("Prefer", "return=representation")
                    .json(&patch),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Transport(format!("update failed: {}", status)));
        }

        let mut rows: Vec<Value> = response.json().await?;
        if rows.is_empty() {
            // Zero affected rows: the id does not exist
            return Err(BackendError::NotFound);
        }
        Ok(rows.remove(0))
    }
}

fn classify_signup_failure(status: StatusCode, body: &str) -> BackendError {
    let lowered = body.to_lowercase();
    if lowered.contains("already registered")
        || lowered.contains("already exists")
        || lowered.contains("duplicate key")
    {
        return BackendError::Duplicate;
    }

    BackendError::Transport(format!("signup failed: {} {}", status, body))
}

fn eq_operand(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn order_param(order: &Order) -> String {
    format!(
        "{}.{}",
        order.column,
        if order.descending { "desc" } else { "asc" }
    )
}

/// True when the bearer token carries an `exp` claim in the past. The
/// client never verifies signatures — that is the platform's job — it only
/// peeks at the payload to skip a doomed round trip.
fn token_expired(jwt: &str) -> bool {
    let Some(payload) = jwt.split('.').nth(1) else {
        return false;
    };
    let Ok(raw) = B64URL.decode(payload) else {
        return false;
    };
    let Ok(claims) = serde_json::from_slice::<Value>(&raw) else {
        return false;
    };

    claims
        .get("exp")
        .and_then(Value::as_i64)
        .is_some_and(|exp| exp <= chrono::Utc::now().timestamp())
}
