use std::sync::Arc;

use serde_json::json;

use helpdesk_backend::{Backend, MemoryBackend};
use helpdesk_cache::LocalCache;
use helpdesk_client::{Client, ClientConfig, Error, RefreshBus, SessionState, Store};
use helpdesk_types::api::{RegisterRequest, TicketDraft};
use helpdesk_types::events::Refresh;
use helpdesk_types::models::{Category, InteractionKind, Priority, Role, Status};

fn client_with(backend: Arc<dyn Backend>, cache: Arc<LocalCache>) -> Client {
    Client::new(
        backend,
        cache,
        Store::new(),
        RefreshBus::new(),
        ClientConfig::default(),
    )
}

fn fresh_client() -> Client {
    client_with(
        Arc::new(MemoryBackend::new()),
        Arc::new(LocalCache::open_in_memory().unwrap()),
    )
}

async fn register(client: &Client, short_name: &str, role: Role) {
    client
        .register(&RegisterRequest {
            short_name: short_name.to_string(),
            password: "letmein".to_string(),
            display_name: None,
            role,
        })
        .await
        .unwrap();
}

fn draft(title: &str) -> TicketDraft {
    TicketDraft {
        title: title.to_string(),
        description: "does not work".to_string(),
        category: Category::Hardware,
        priority: None,
        location: None,
    }
}

// -- Registration --

#[tokio::test]
async fn duplicate_short_name_is_rejected() {
    let client = fresh_client();

    register(&client, "maria_s", Role::Professor).await;

    let err = client
        .register(&RegisterRequest {
            short_name: "maria_s".to_string(),
            password: "another1".to_string(),
            display_name: None,
            role: Role::Professor,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateIdentity));
}

#[tokio::test]
async fn registration_enforces_identifier_and_credential_rules() {
    let client = fresh_client();

    for bad in ["maria silva", "maria-s", "", "olá"] {
        let err = client
            .register(&RegisterRequest {
                short_name: bad.to_string(),
                password: "letmein".to_string(),
                display_name: None,
                role: Role::Professor,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier), "accepted {:?}", bad);
    }

    let err = client
        .register(&RegisterRequest {
            short_name: "maria_s".to_string(),
            password: "12345".to_string(),
            display_name: None,
            role: Role::Professor,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WeakCredential));
}

#[tokio::test]
async fn registration_does_not_sign_in() {
    let client = fresh_client();
    register(&client, "maria_s", Role::Professor).await;

    assert!(matches!(
        client.store().snapshot().session,
        SessionState::Unknown
    ));
}

// -- Login / logout / restore --

#[tokio::test]
async fn login_with_unknown_name_fails() {
    let client = fresh_client();

    let err = client.login("nonexistent", "anything").await.unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials));
}

#[tokio::test]
async fn login_resolves_profile_and_caches_the_session() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let cache = Arc::new(LocalCache::open_in_memory().unwrap());
    let client = client_with(backend, cache.clone());

    client
        .register(&RegisterRequest {
            short_name: "ana_r".to_string(),
            password: "letmein".to_string(),
            display_name: Some("Ana Rocha".to_string()),
            role: Role::Admin,
        })
        .await
        .unwrap();

    let session = client.login("ana_r", "letmein").await.unwrap();
    assert_eq!(session.profile.short_name, "ana_r");
    assert_eq!(session.profile.role, Role::Admin);
    assert_eq!(session.profile.display_name.as_deref(), Some("Ana Rocha"));
    assert_eq!(session.identity.address, "ana_r@campus.local");

    let cached = cache.load_session().unwrap().unwrap();
    assert_eq!(cached, session);
    assert!(matches!(
        client.store().snapshot().session,
        SessionState::SignedIn(_)
    ));
}

#[tokio::test]
async fn logout_clears_local_state_unconditionally() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let cache = Arc::new(LocalCache::open_in_memory().unwrap());
    let client = client_with(backend.clone(), cache.clone());

    register(&client, "maria_s", Role::Professor).await;
    client.login("maria_s", "letmein").await.unwrap();

    client.logout().await;

    assert!(matches!(
        client.store().snapshot().session,
        SessionState::SignedOut
    ));
    assert!(cache.load_session().unwrap().is_none());
    assert!(backend.current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn restore_revalidates_a_live_session() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let cache = Arc::new(LocalCache::open_in_memory().unwrap());

    let first = client_with(backend.clone(), cache.clone());
    register(&first, "maria_s", Role::Professor).await;
    first.login("maria_s", "letmein").await.unwrap();

    // Next launch: same adapter session, same cache, fresh store
    let second = client_with(backend, cache);
    second.restore_session().await.unwrap();

    let snapshot = second.store().snapshot();
    match snapshot.session {
        SessionState::SignedIn(session) => {
            assert_eq!(session.profile.short_name, "maria_s");
        }
        other => panic!("expected a restored session, got {:?}", other),
    }
}

#[tokio::test]
async fn restore_with_no_live_session_clears_the_cache() {
    let cache = Arc::new(LocalCache::open_in_memory().unwrap());

    let first = client_with(Arc::new(MemoryBackend::new()), cache.clone());
    register(&first, "maria_s", Role::Professor).await;
    first.login("maria_s", "letmein").await.unwrap();
    assert!(cache.load_session().unwrap().is_some());

    // Next launch against a platform that no longer knows the session
    let second = client_with(Arc::new(MemoryBackend::new()), cache.clone());
    second.restore_session().await.unwrap();

    assert!(matches!(
        second.store().snapshot().session,
        SessionState::SignedOut
    ));
    assert!(cache.load_session().unwrap().is_none());
}

#[tokio::test]
async fn missing_profile_tears_the_session_down() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let client = client_with(backend.clone(), Arc::new(LocalCache::open_in_memory().unwrap()));

    // Account exists but the platform never provisioned a profile row
    backend
        .create_account("ghost@campus.local", "secret99", json!({}))
        .await
        .unwrap();

    let err = client.login("ghost", "secret99").await.unwrap_err();
    assert!(matches!(err, Error::ProfileMissing));

    // The half-open backend session was torn down again
    assert!(backend.current_session().await.unwrap().is_none());
    assert!(matches!(
        client.store().snapshot().session,
        SessionState::SignedOut
    ));
}

// -- Visibility --

#[tokio::test]
async fn professors_see_only_their_own_tickets_and_admins_see_all() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let client = client_with(backend, Arc::new(LocalCache::open_in_memory().unwrap()));

    register(&client, "maria_s", Role::Professor).await;
    register(&client, "joao_p", Role::Professor).await;
    register(&client, "ana_r", Role::Admin).await;

    client.login("maria_s", "letmein").await.unwrap();
    let jam = client
        .create_ticket(&TicketDraft {
            title: "Printer jam".to_string(),
            description: "paper stuck in tray 2".to_string(),
            category: Category::Hardware,
            priority: None,
            location: Some("room 12".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(jam.status, Status::Open);
    assert_eq!(jam.priority, Priority::Normal);

    let mine = client.list_tickets().await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].title, "Printer jam");
    client.logout().await;

    client.login("joao_p", "letmein").await.unwrap();
    client.create_ticket(&draft("Wifi drops")).await.unwrap();
    let theirs = client.list_tickets().await.unwrap();
    assert_eq!(theirs.len(), 1);
    assert!(theirs.iter().all(|t| t.title != "Printer jam"));
    client.logout().await;

    client.login("ana_r", "letmein").await.unwrap();
    let all = client.list_tickets().await.unwrap();
    assert_eq!(all.len(), 2);

    // Most recent first, owners denormalized for display
    assert_eq!(all[0].title, "Wifi drops");
    assert_eq!(all[1].title, "Printer jam");
    let owner = all[1].owner.as_ref().unwrap();
    assert_eq!(owner.short_name, "maria_s");
}

#[tokio::test]
async fn stale_cached_admin_role_is_not_trusted() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let client = client_with(backend.clone(), Arc::new(LocalCache::open_in_memory().unwrap()));

    register(&client, "maria_s", Role::Professor).await;
    register(&client, "ana_r", Role::Admin).await;

    client.login("maria_s", "letmein").await.unwrap();
    client.create_ticket(&draft("Printer jam")).await.unwrap();
    client.logout().await;

    let session = client.login("ana_r", "letmein").await.unwrap();

    // Demoted on the backend while the cached session still says admin
    backend
        .update(
            "profiles",
            &session.identity.id.to_string(),
            json!({ "role": "professor" }),
        )
        .await
        .unwrap();

    let visible = client.list_tickets().await.unwrap();
    assert!(visible.is_empty());
}

#[tokio::test]
async fn get_ticket_reports_missing_ids() {
    let client = fresh_client();
    register(&client, "maria_s", Role::Professor).await;
    client.login("maria_s", "letmein").await.unwrap();

    let err = client.get_ticket(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound));
}

// -- Lifecycle --

#[tokio::test]
async fn create_ticket_requires_title_and_description() {
    let client = fresh_client();
    register(&client, "maria_s", Role::Professor).await;
    client.login("maria_s", "letmein").await.unwrap();

    let mut empty_title = draft("  ");
    let err = client.create_ticket(&empty_title).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    empty_title.title = "screen".to_string();
    empty_title.description = "\t ".to_string();
    let err = client.create_ticket(&empty_title).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn every_status_write_appends_exactly_one_audit_entry() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let client = client_with(backend, Arc::new(LocalCache::open_in_memory().unwrap()));

    register(&client, "maria_s", Role::Professor).await;
    register(&client, "ana_r", Role::Admin).await;

    client.login("maria_s", "letmein").await.unwrap();
    let ticket = client.create_ticket(&draft("Printer jam")).await.unwrap();
    client.logout().await;

    let admin = client.login("ana_r", "letmein").await.unwrap();

    client.set_status(ticket.id, Status::InProgress).await.unwrap();
    let reloaded = client.get_ticket(ticket.id).await.unwrap();
    assert_eq!(reloaded.status, Status::InProgress);

    let thread = client.list_interactions(ticket.id).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].kind, InteractionKind::StatusChange);
    assert!(thread[0].message.contains("in_progress"));
    assert_eq!(thread[0].author_id, admin.identity.id);

    // A no-op transition still audits
    client.set_status(ticket.id, Status::InProgress).await.unwrap();
    let thread = client.list_interactions(ticket.id).await.unwrap();
    assert_eq!(thread.len(), 2);

    client.set_status(ticket.id, Status::Resolved).await.unwrap();
    let thread = client.list_interactions(ticket.id).await.unwrap();
    assert_eq!(thread.len(), 3);
    assert!(thread[2].message.contains("resolved"));
}

#[tokio::test]
async fn status_write_on_missing_ticket_leaves_no_audit() {
    let client = fresh_client();
    register(&client, "ana_r", Role::Admin).await;
    client.login("ana_r", "letmein").await.unwrap();

    let phantom = uuid::Uuid::new_v4();
    let err = client.set_status(phantom, Status::Resolved).await.unwrap_err();
    assert!(matches!(err, Error::NotFound));

    let thread = client.list_interactions(phantom).await.unwrap();
    assert!(thread.is_empty());
}

// -- Interactions --

#[tokio::test]
async fn blank_comments_are_rejected_without_side_effects() {
    let client = fresh_client();
    register(&client, "maria_s", Role::Professor).await;
    client.login("maria_s", "letmein").await.unwrap();
    let ticket = client.create_ticket(&draft("Printer jam")).await.unwrap();

    for blank in ["", "   "] {
        let err = client.add_comment(ticket.id, blank).await.unwrap_err();
        assert!(matches!(err, Error::EmptyMessage));
    }

    assert!(client.list_interactions(ticket.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn comments_read_back_in_conversational_order() {
    let client = fresh_client();
    register(&client, "maria_s", Role::Professor).await;
    client.login("maria_s", "letmein").await.unwrap();
    let ticket = client.create_ticket(&draft("Printer jam")).await.unwrap();

    client.add_comment(ticket.id, "tried turning it off").await.unwrap();
    client.add_comment(ticket.id, "and on again").await.unwrap();

    let thread = client.list_interactions(ticket.id).await.unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].message, "tried turning it off");
    assert_eq!(thread[1].message, "and on again");
    assert_eq!(
        thread[0].author.as_ref().unwrap().short_name,
        "maria_s"
    );
}

// -- Refresh messages --

#[tokio::test]
async fn mutations_announce_staleness_on_the_bus() {
    let client = fresh_client();
    register(&client, "ana_r", Role::Admin).await;
    client.login("ana_r", "letmein").await.unwrap();

    let mut bus = client.refresh().subscribe();

    let ticket = client.create_ticket(&draft("Printer jam")).await.unwrap();
    assert_eq!(bus.try_recv().unwrap(), Refresh::Tickets);

    client.add_comment(ticket.id, "looking into it").await.unwrap();
    assert_eq!(
        bus.try_recv().unwrap(),
        Refresh::Interactions { ticket_id: ticket.id }
    );

    client.set_status(ticket.id, Status::Resolved).await.unwrap();
    assert_eq!(
        bus.try_recv().unwrap(),
        Refresh::Interactions { ticket_id: ticket.id }
    );
    assert_eq!(bus.try_recv().unwrap(), Refresh::Tickets);
}

// -- Mirror --

#[tokio::test]
async fn listing_writes_through_to_the_mirror() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let cache = Arc::new(LocalCache::open_in_memory().unwrap());
    let client = client_with(backend, cache.clone());

    register(&client, "maria_s", Role::Professor).await;
    client.login("maria_s", "letmein").await.unwrap();
    client.create_ticket(&draft("Printer jam")).await.unwrap();

    let listed = client.list_tickets().await.unwrap();
    let mirrored = cache.load_tickets().unwrap();
    assert_eq!(mirrored, listed);
}
