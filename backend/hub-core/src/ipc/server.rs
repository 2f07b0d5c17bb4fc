//! Hub WebSocket server.
//!
//! Each accepted socket gets a fresh client id and an `auth_challenge`. Until
//! the [`ConnectionAuthenticator`] accepts it, every frame goes through the
//! authenticator; afterwards frames are decoded into [`HubMessage`]s and
//! handed to the router actor. Outbound frames for a registered client flow
//! through an unbounded channel drained by a dedicated writer task, so the
//! router never awaits a socket.
//!
//! # Protocol
//!
//! JSON text frames `{"type", "timestamp"?, "data"}`. Authentication
//! failures are answered with `auth_error` and a close frame with code 1008.

use crate::auth_grant::AuthGrantController;
use crate::config::ServerConfig;
use crate::error::ipc::IpcError;
use crate::identity::HubIdentity;
use crate::ipc::authenticator::{AuthState, ConnectionAuthenticator};
use crate::ipc::handle::HubServerHandle;
use crate::ipc::router::RouterHandle;
use crate::session_store::SessionStore;

use common::ErrorLocation;

use models::{ClientId, HubMessage};

use std::net::SocketAddr;
use std::panic::Location;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Everything a connection needs, shared by all connections.
#[derive(Clone)]
pub struct HubContext {
    pub identity: HubIdentity,
    pub sessions: SessionStore,
    pub grants: AuthGrantController,
    pub router: RouterHandle,
}

/// Bind `bind_address:port` and accept connections in the background.
///
/// # Errors
///
/// Returns [`IpcError::Io`] if the address cannot be bound.
pub async fn start_hub_server(
    config: &ServerConfig,
    context: HubContext,
) -> Result<HubServerHandle, IpcError> {
    let address = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&address).await?;
    let local_addr = listener.local_addr()?;
    let local_only = config.local_only;

    info!(
        "Hub {} ({}) listening on {}",
        context.identity.hub_name, context.identity.hub_id, local_addr
    );

    let accept_task = TokioSpawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("Client connecting from {}", addr);
                    let context = context.clone();
                    TokioSpawn(async move {
                        if let Err(e) = handle_connection(stream, addr, local_only, context).await {
                            warn!("Connection {} ended with error: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept failed: {}", e);
                }
            }
        }
    });

    Ok(HubServerHandle {
        local_addr,
        accept_task,
    })
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    local_only: bool,
    context: HubContext,
) -> Result<(), IpcError> {
    if local_only && !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {}", addr);
        return Ok(());
    }

    let ws_stream = accept_async(stream).await.map_err(|e| IpcError::Handshake {
        message: format!("WebSocket handshake failed: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let (mut write, mut read) = ws_stream.split();
    let mut auth = ConnectionAuthenticator::new(
        ClientId::generate(),
        context.identity.clone(),
        context.sessions.clone(),
        context.grants.clone(),
    );

    send_message(&mut write, &auth.challenge()).await?;

    // Unauthenticated phase.
    let client = loop {
        let Some(frame) = read.next().await else {
            debug!("Client {} disconnected before authenticating", addr);
            return Ok(());
        };

        let frame = frame.map_err(|e| IpcError::Read {
            message: format!("Error reading from {}: {}", addr, e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let step = match frame {
            Message::Text(text) => match HubMessage::decode(text.as_str()) {
                Ok(message) => auth.handle_unauthenticated(message).await,
                Err(e) => auth.reject_malformed(&e.to_string()),
            },
            Message::Binary(_) => auth.reject_malformed("binary frame"),
            Message::Close(_) => return Ok(()),
            _ => continue,
        };

        for reply in &step.replies {
            send_message(&mut write, reply).await?;
        }

        if step.close {
            close_policy_violation(&mut write, "Authentication failed").await;
            return Ok(());
        }

        if let Some(client) = step.registered {
            break client;
        }
    };

    let client_id = client.id.clone();
    info!("Client {} ({}) authenticated from {}", client_id, client.hostname, addr);

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let writer = TokioSpawn(write_loop(write, rx));
    context.router.register(client, tx.clone()).await?;

    // Authenticated phase.
    let result = read_loop(&mut read, &auth, &context, &client_id, &tx).await;

    if let Err(e) = context.router.unregister(client_id.clone()).await {
        error!("Failed to unregister {}: {}", client_id, e);
    }
    drop(tx);
    let _ = writer.await;

    info!("Client {} disconnected", client_id);
    result
}

async fn read_loop(
    read: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    auth: &ConnectionAuthenticator,
    context: &HubContext,
    client_id: &ClientId,
    tx: &mpsc::UnboundedSender<String>,
) -> Result<(), IpcError> {
    debug_assert!(matches!(auth.state(), AuthState::Authenticated(_)));

    while let Some(frame) = read.next().await {
        let frame = frame.map_err(|e| IpcError::Read {
            message: format!("Error reading from {}: {}", client_id, e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let message = match HubMessage::decode(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed frame from {}: {}", client_id, e);
                continue;
            }
        };

        if let HubMessage::SessionVerifyRequest(request) = message {
            let reply = auth.verify_session(request).await;
            match reply.encode() {
                Ok(text) => {
                    let _ = tx.send(text);
                }
                Err(e) => warn!("Failed to encode session verify response: {}", e),
            }
            continue;
        }

        auth.observe_authenticated(&message).await;
        context.router.inbound(client_id.clone(), message).await?;
    }

    Ok(())
}

async fn write_loop(mut write: WsSink, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = rx.recv().await {
        if let Err(e) = write.send(Message::text(text)).await {
            debug!("Writer stopping: {}", e);
            break;
        }
    }
    let _ = write.close().await;
}

async fn send_message(write: &mut WsSink, message: &HubMessage) -> Result<(), IpcError> {
    let text = message.encode()?;
    write
        .send(Message::text(text))
        .await
        .map_err(|e| IpcError::Send {
            message: format!("Failed to send {}: {e}", message.kind()),
            location: ErrorLocation::from(Location::caller()),
        })
}

async fn close_policy_violation(write: &mut WsSink, reason: &str) {
    let frame = CloseFrame {
        code: CloseCode::Policy,
        reason: reason.to_string().into(),
    };
    if let Err(e) = write.send(Message::Close(Some(frame))).await {
        debug!("Failed to send close frame: {}", e);
    }
}
