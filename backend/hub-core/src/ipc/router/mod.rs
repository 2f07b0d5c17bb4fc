//! Message router: client registry, focus, typed dispatch.
//!
//! # Architecture
//!
//! Every mutation goes through one actor task:
//! - Commands are sent via an mpsc channel
//! - The actor owns [`RouterState`] and applies commands in order
//! - After each command it publishes a [`RouterSnapshot`] of the client
//!   registry behind an `Arc<RwLock<_>>` for concurrent reads, and forwards
//!   raised [`HubEvent`]s on a broadcast channel
//! - Mark tasks stay inside the actor and are read with a query command
//!
//! Connection tasks only ever talk to the router through [`RouterHandle`].

mod events;
pub(crate) mod state;

pub use events::HubEvent;

pub(crate) use state::RouterState;

use crate::auth_grant::AuthGrantController;
use crate::error::ipc::IpcError;
use crate::secrets::short_id;
use crate::token::TokenService;

use common::ErrorLocation;

use models::protocol::payloads::AuthResponsePayload;
use models::{ClientId, ConnectedClient, HubMessage, MarkTask};

use std::panic::Location;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock, broadcast, mpsc, oneshot};

const COMMAND_CHANNEL_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Commands that mutate router state.
#[derive(Debug)]
pub enum RouterCommand {
    Register {
        client: ConnectedClient,
        /// Receives encoded text frames for this client.
        sender: mpsc::UnboundedSender<String>,
    },
    Unregister {
        client_id: ClientId,
    },
    Inbound {
        client_id: ClientId,
        message: HubMessage,
        at: DateTime<Utc>,
    },
    Send {
        client_id: ClientId,
        message: HubMessage,
    },
    SendToFocused {
        message: HubMessage,
        reply: oneshot::Sender<Option<ClientId>>,
    },
    Broadcast {
        message: HubMessage,
    },
    GetMarkTask {
        task_id: String,
        reply: oneshot::Sender<Option<MarkTask>>,
    },
}

/// Read-only copy of the client registry, refreshed after every command.
#[derive(Debug, Clone, Default)]
pub struct RouterSnapshot {
    pub clients: Vec<ConnectedClient>,
    pub focused_id: Option<ClientId>,
}

impl RouterSnapshot {
    fn route_to_focused_atem(&self) -> Option<ClientId> {
        self.focused_id
            .clone()
            .or_else(|| self.clients.first().map(|c| c.id.clone()))
    }
}

/// Handle to the router actor. Clones share the same actor.
#[derive(Clone)]
pub struct RouterHandle {
    command_tx: Arc<Mutex<Option<mpsc::Sender<RouterCommand>>>>,
    actor_init: Arc<Mutex<bool>>,
    snapshot: Arc<RwLock<RouterSnapshot>>,
    events: broadcast::Sender<HubEvent>,
    tokens: TokenService,
    grants: AuthGrantController,
}

impl RouterHandle {
    /// The actor is spawned lazily on first command, inside the runtime.
    pub fn new(tokens: TokenService, grants: AuthGrantController) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            command_tx: Arc::new(Mutex::new(None)),
            actor_init: Arc::new(Mutex::new(false)),
            snapshot: Arc::new(RwLock::new(RouterSnapshot::default())),
            events,
            tokens,
            grants,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    /// Publish an event that did not originate in the router.
    pub fn publish(&self, event: HubEvent) {
        let _ = self.events.send(event);
    }

    /// Send a command, spawning the actor on first use.
    pub async fn update(&self, cmd: RouterCommand) -> Result<(), IpcError> {
        self.ensure_actor().await;

        let tx_guard = self.command_tx.lock().await;
        let tx = tx_guard.as_ref().ok_or_else(|| IpcError::Io {
            message: "Router actor not initialized".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        tx.send(cmd).await.map_err(|e| IpcError::Io {
            message: format!("Router actor died: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    pub async fn register(
        &self,
        client: ConnectedClient,
        sender: mpsc::UnboundedSender<String>,
    ) -> Result<(), IpcError> {
        self.update(RouterCommand::Register { client, sender }).await
    }

    pub async fn unregister(&self, client_id: ClientId) -> Result<(), IpcError> {
        self.update(RouterCommand::Unregister { client_id }).await
    }

    pub async fn inbound(&self, client_id: ClientId, message: HubMessage) -> Result<(), IpcError> {
        self.update(RouterCommand::Inbound {
            client_id,
            message,
            at: Utc::now(),
        })
        .await
    }

    pub async fn send(&self, client_id: ClientId, message: HubMessage) -> Result<(), IpcError> {
        self.update(RouterCommand::Send { client_id, message }).await
    }

    pub async fn broadcast(&self, message: HubMessage) -> Result<(), IpcError> {
        self.update(RouterCommand::Broadcast { message }).await
    }

    /// Send to the focused client (or the first connected one).
    ///
    /// Returns the recipient, `None` if nobody is connected.
    pub async fn send_to_focused(&self, message: HubMessage) -> Result<Option<ClientId>, IpcError> {
        let (reply, rx) = oneshot::channel();
        self.update(RouterCommand::SendToFocused { message, reply })
            .await?;
        rx.await.map_err(|e| IpcError::Io {
            message: format!("Router actor dropped reply: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    pub async fn get_instances(&self) -> Vec<ConnectedClient> {
        self.snapshot.read().await.clients.clone()
    }

    pub async fn focused_client(&self) -> Option<ClientId> {
        self.snapshot.read().await.focused_id.clone()
    }

    pub async fn route_to_focused_atem(&self) -> Option<ClientId> {
        self.snapshot.read().await.route_to_focused_atem()
    }

    /// `None` for unknown or already forgotten tasks, or if the actor is gone.
    pub async fn get_mark_task(&self, task_id: &str) -> Option<MarkTask> {
        let (reply, rx) = oneshot::channel();
        let command = RouterCommand::GetMarkTask {
            task_id: task_id.to_string(),
            reply,
        };
        if let Err(e) = self.update(command).await {
            warn!("Mark task lookup failed: {}", e);
            return None;
        }
        rx.await.ok().flatten()
    }

    async fn ensure_actor(&self) {
        let mut init_guard = self.actor_init.lock().await;
        if !*init_guard {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

            let mut tx_guard = self.command_tx.lock().await;
            *tx_guard = Some(tx);
            drop(tx_guard);

            tokio::spawn(router_actor(
                rx,
                RouterState::new(self.tokens.clone()),
                Arc::clone(&self.snapshot),
                self.events.clone(),
                self.grants.clone(),
            ));
            *init_guard = true;
            info!("Router actor spawned");
        }
    }
}

async fn router_actor(
    mut command_rx: mpsc::Receiver<RouterCommand>,
    mut state: RouterState,
    snapshot: Arc<RwLock<RouterSnapshot>>,
    events: broadcast::Sender<HubEvent>,
    grants: AuthGrantController,
) {
    info!("Router actor started");

    while let Some(cmd) = command_rx.recv().await {
        match cmd {
            RouterCommand::Register { client, sender } => state.add_client(client, sender),
            RouterCommand::Unregister { client_id } => state.remove_client(&client_id),
            RouterCommand::Inbound {
                client_id,
                message: HubMessage::AuthRequest(request),
                ..
            } => spawn_auth_request(&state, &grants, client_id, request),
            RouterCommand::Inbound {
                client_id,
                message,
                at,
            } => state.dispatch(&client_id, message, at),
            RouterCommand::Send { client_id, message } => {
                state.send(&client_id, &message);
            }
            RouterCommand::SendToFocused { message, reply } => {
                let target = state.send_to_focused(&message);
                if target.is_none() {
                    debug!("No client to receive {}", message.kind());
                }
                let _ = reply.send(target);
            }
            RouterCommand::Broadcast { message } => state.broadcast(&message),
            RouterCommand::GetMarkTask { task_id, reply } => {
                let _ = reply.send(state.task(&task_id).cloned());
                continue;
            }
        }

        publish_snapshot(&state, &snapshot).await;
        for event in state.take_events() {
            let _ = events.send(event);
        }
    }

    warn!("Router actor stopped");
}

async fn publish_snapshot(state: &RouterState, snapshot: &RwLock<RouterSnapshot>) {
    let mut write = snapshot.write().await;
    write.clients = state.clients().to_vec();
    write.focused_id = state.focused_id();
}

/// Approval can take minutes; run it off the actor and reply directly to
/// the requesting client.
fn spawn_auth_request(
    state: &RouterState,
    grants: &AuthGrantController,
    client_id: ClientId,
    request: models::AuthRequest,
) {
    let Some(sender) = state.sender(&client_id) else {
        warn!("Auth request from unknown client {}", client_id);
        return;
    };
    let grants = grants.clone();

    tokio::spawn(async move {
        let session_id = request.session_id.clone();
        let outcome = grants.handle_auth_request(request).await;
        let response = HubMessage::AuthResponse(AuthResponsePayload {
            session_id: session_id.clone(),
            granted: outcome.granted == Some(true),
            session_token: outcome.session_token,
        });
        match response.encode() {
            Ok(text) => {
                if sender.send(text).is_err() {
                    debug!(
                        "Client {} left before auth response {}",
                        client_id,
                        short_id(&session_id)
                    );
                }
            }
            Err(e) => warn!("Failed to encode auth response: {}", e),
        }
    });
}
