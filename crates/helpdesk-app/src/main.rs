mod shell;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use helpdesk_backend::{Backend, MemoryBackend, RestBackend, RestConfig};
use helpdesk_cache::LocalCache;
use helpdesk_client::{Client, ClientConfig, RefreshBus, Store};
use helpdesk_types::api::RegisterRequest;
use helpdesk_types::events::Refresh;
use helpdesk_types::models::Role;

use shell::{ShellCommand, ShellEvent, StateView};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging on stderr — stdout belongs to the shell protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helpdesk=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Config
    let cache_path =
        std::env::var("HELPDESK_CACHE_PATH").unwrap_or_else(|_| "helpdesk.db".into());
    let tenant_domain =
        std::env::var("HELPDESK_TENANT_DOMAIN").unwrap_or_else(|_| "campus.local".into());

    let backend: Arc<dyn Backend> = match std::env::var("HELPDESK_URL") {
        Ok(base_url) => {
            let api_key = std::env::var("HELPDESK_API_KEY")
                .map_err(|_| anyhow::anyhow!("HELPDESK_API_KEY is required with HELPDESK_URL"))?;
            let token_path = std::env::var("HELPDESK_TOKEN_PATH")
                .unwrap_or_else(|_| "helpdesk-token.json".into());
            info!("Using hosted platform at {}", base_url);
            Arc::new(RestBackend::new(RestConfig {
                base_url,
                api_key,
                token_path: Some(PathBuf::from(token_path)),
            }))
        }
        Err(_) => {
            info!("HELPDESK_URL not set — using in-process backend");
            Arc::new(MemoryBackend::new())
        }
    };

    let cache = Arc::new(LocalCache::open(Path::new(&cache_path))?);

    // The shell owns the state container and the refresh bus; the policy
    // layer only borrows them.
    let store = Store::new();
    let refresh = RefreshBus::new();
    let client = Arc::new(Client::new(
        backend,
        cache.clone(),
        store.clone(),
        refresh.clone(),
        ClientConfig { tenant_domain },
    ));

    // Instant render: the last mirrored list, before any round trip
    match cache.load_tickets() {
        Ok(tickets) if !tickets.is_empty() => {
            debug!("Preloading {} mirrored tickets", tickets.len());
            store.update(|s| s.tickets = tickets);
        }
        Ok(_) => {}
        Err(e) => warn!("Failed to preload ticket mirror: {}", e),
    }

    if let Err(e) = client.restore_session().await {
        warn!("Session restore failed: {}", e);
    }

    // Single writer owns stdout so state events and errors never interleave
    let (out_tx, out_rx) = mpsc::unbounded_channel::<ShellEvent>();
    let writer = tokio::spawn(write_events(out_rx));

    // State emitter: every snapshot replacement becomes a state event
    let emitter = {
        let out_tx = out_tx.clone();
        let mut snapshots = store.subscribe();
        tokio::spawn(async move {
            let initial = snapshots.borrow_and_update().clone();
            let _ = out_tx.send(ShellEvent::State(StateView::build(&initial)));
            while snapshots.changed().await.is_ok() {
                let snapshot = snapshots.borrow_and_update().clone();
                let _ = out_tx.send(ShellEvent::State(StateView::build(&snapshot)));
            }
        })
    };

    // Coordinator: consume refresh messages, perform the re-fetches the
    // policy layer deliberately does not do itself
    let coordinator = {
        let client = client.clone();
        let mut bus = refresh.subscribe();
        tokio::spawn(async move {
            loop {
                match bus.recv().await {
                    Ok(Refresh::Tickets) => {
                        if let Err(e) = client.list_tickets().await {
                            warn!("Ticket refresh failed: {}", e);
                        }
                    }
                    Ok(Refresh::Interactions { ticket_id }) => {
                        if let Err(e) = client.list_interactions(ticket_id).await {
                            warn!("Interaction refresh failed: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Coordinator lagged, {} refresh messages dropped", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    // A session that survived the restart gets a fresh dashboard
    if client.store().snapshot().session.session().is_some() {
        if let Err(e) = client.list_tickets().await {
            warn!("Initial ticket fetch failed: {}", e);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command: ShellCommand = match serde_json::from_str(line) {
            Ok(command) => command,
            Err(e) => {
                let _ = out_tx.send(ShellEvent::Error {
                    kind: "protocol".to_string(),
                    message: format!("unreadable command: {}", e),
                });
                continue;
            }
        };

        if matches!(command, ShellCommand::Quit) {
            let _ = out_tx.send(ShellEvent::Bye);
            break;
        }

        // The lifecycle policy trusts its caller on authorization; this is
        // the layer that only routes status writes to admin sessions.
        if matches!(command, ShellCommand::SetStatus { .. }) && !signed_in_as_admin(&client) {
            let _ = out_tx.send(ShellEvent::Error {
                kind: "forbidden".to_string(),
                message: "only administrators can change ticket status".to_string(),
            });
            continue;
        }

        if let Err(e) = dispatch(&client, command).await {
            let _ = out_tx.send(ShellEvent::Error {
                kind: e.kind().to_string(),
                message: e.to_string(),
            });
        }
    }

    emitter.abort();
    coordinator.abort();
    drop(out_tx);
    let _ = writer.await;

    Ok(())
}

fn signed_in_as_admin(client: &Client) -> bool {
    client
        .store()
        .snapshot()
        .session
        .session()
        .is_some_and(|session| session.profile.role == Role::Admin)
}

async fn dispatch(client: &Client, command: ShellCommand) -> Result<(), helpdesk_client::Error> {
    match command {
        ShellCommand::Register {
            short_name,
            password,
            display_name,
            role,
        } => {
            client
                .register(&RegisterRequest {
                    short_name,
                    password,
                    display_name,
                    role,
                })
                .await
        }
        ShellCommand::Login {
            short_name,
            password,
        } => {
            client.login(&short_name, &password).await?;
            // Fresh dashboard right after sign-in, like the screens do on mount
            client.list_tickets().await?;
            Ok(())
        }
        ShellCommand::Logout => {
            client.logout().await;
            Ok(())
        }
        ShellCommand::RefreshTickets => client.list_tickets().await.map(|_| ()),
        ShellCommand::OpenTicket { id } => {
            client.get_ticket(id).await?;
            client.list_interactions(id).await?;
            Ok(())
        }
        ShellCommand::CreateTicket { draft } => client.create_ticket(&draft).await.map(|_| ()),
        ShellCommand::SetStatus { id, status } => client.set_status(id, status).await,
        ShellCommand::Comment { id, message } => {
            client.add_comment(id, &message).await.map(|_| ())
        }
        ShellCommand::SetFilters {
            status,
            category,
            search,
        } => {
            // Pure local narrowing — the filtered view is recomputed from
            // the snapshot on emit, no network involved
            client.store().update(|s| {
                s.filters.status = status;
                s.filters.category = category;
                s.filters.search = search;
            });
            Ok(())
        }
        ShellCommand::Quit => Ok(()),
    }
}

async fn write_events(mut rx: mpsc::UnboundedReceiver<ShellEvent>) {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(mut line) => {
                line.push('\n');
                if stdout.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                let _ = stdout.flush().await;
            }
            Err(e) => error!("Failed to encode event: {}", e),
        }
    }
}
