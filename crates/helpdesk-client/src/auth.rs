use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use helpdesk_backend::BackendError;
use helpdesk_types::api::{RegisterRequest, Session};
use helpdesk_types::models::Profile;

use crate::store::SessionState;
use crate::{Client, Error};

impl Client {
    /// Create an account for a short name. Identifier and credential rules
    /// are enforced here, before the platform ever sees the request.
    /// Registering does not sign the account in.
    pub async fn register(&self, req: &RegisterRequest) -> Result<(), Error> {
        if req.short_name.is_empty()
            || !req
                .short_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::InvalidIdentifier);
        }
        if req.password.chars().count() < 6 {
            return Err(Error::WeakCredential);
        }

        // The platform provisions the profile row from these attributes
        let attributes = json!({
            "short_name": req.short_name,
            "display_name": req.display_name,
            "role": req.role,
        });

        self.backend
            .create_account(&self.address_for(&req.short_name), &req.password, attributes)
            .await?;

        Ok(())
    }

    /// Authenticate a short name and resolve its role-bearing profile.
    ///
    /// An authenticated account without a profile row is a fatal
    /// inconsistency: the backend session is torn down again and the caller
    /// stays signed out.
    pub async fn login(&self, short_name: &str, password: &str) -> Result<Session, Error> {
        let identity = self
            .backend
            .authenticate(&self.address_for(short_name), password)
            .await?;

        let Some(profile) = self.resolve_profile(identity.id).await? else {
            self.teardown_session().await;
            return Err(Error::ProfileMissing);
        };

        let session = Session { identity, profile };
        if let Err(e) = self.cache.save_session(&session) {
            warn!("Failed to cache session: {}", e);
        }
        self.store
            .update(|s| s.session = SessionState::SignedIn(session.clone()));

        Ok(session)
    }

    /// End the backend session and clear all local session state. Local
    /// state is king for the UI: even a failed backend call leaves the
    /// caller signed out.
    pub async fn logout(&self) {
        self.teardown_session().await;
    }

    /// Invoked once at process start: render the cached session
    /// immediately, then re-validate it against the backend.
    pub async fn restore_session(&self) -> Result<(), Error> {
        match self.cache.load_session() {
            Ok(Some(cached)) => {
                debug!("Rendering cached session for {}", cached.profile.short_name);
                self.store
                    .update(|s| s.session = SessionState::SignedIn(cached));
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read cached session: {}", e),
        }

        let live = match self.backend.current_session().await {
            Ok(live) => live,
            Err(e) => {
                // Platform unreachable: sign out for this launch but keep
                // the cached blob so the next launch can try again.
                warn!("Session re-validation failed: {}", e);
                self.store.update(|s| s.session = SessionState::SignedOut);
                return Err(e.into());
            }
        };

        let Some(identity) = live else {
            self.clear_local_session();
            return Ok(());
        };

        match self.resolve_profile(identity.id).await {
            Ok(Some(profile)) => {
                let session = Session { identity, profile };
                if let Err(e) = self.cache.save_session(&session) {
                    warn!("Failed to cache session: {}", e);
                }
                self.store
                    .update(|s| s.session = SessionState::SignedIn(session));
                Ok(())
            }
            Ok(None) => {
                self.teardown_session().await;
                Err(Error::ProfileMissing)
            }
            Err(e) => {
                self.teardown_session().await;
                Err(e)
            }
        }
    }

    /// Profile lookup by identity id. Absence is a regular answer here;
    /// callers decide whether it is fatal.
    pub(crate) async fn resolve_profile(&self, id: Uuid) -> Result<Option<Profile>, Error> {
        match self.backend.get("profiles", &id.to_string()).await {
            Ok(value) => Ok(Some(crate::decode(value)?)),
            Err(BackendError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn address_for(&self, short_name: &str) -> String {
        format!("{}@{}", short_name, self.config.tenant_domain)
    }

    async fn teardown_session(&self) {
        if let Err(e) = self.backend.end_session().await {
            warn!("Failed to end backend session: {}", e);
        }
        self.clear_local_session();
    }

    fn clear_local_session(&self) {
        // Cache failures here are logged and swallowed: the logout itself
        // must still succeed.
        if let Err(e) = self.cache.clear_session() {
            warn!("Failed to clear cached session: {}", e);
        }
        self.store.update(|s| s.session = SessionState::SignedOut);
    }
}
