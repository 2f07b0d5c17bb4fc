//! Test helpers for hub WebSocket integration tests.
//!
//! This module provides utilities for testing the hub server:
//! - Starting a hub on an ephemeral port
//! - Sending/receiving JSON envelopes
//! - Pairing and session authentication
//! - Connection state checks

use hub_core::auth_grant::{AuthGrantController, StaticApprover};
use hub_core::config::ServerConfig;
use hub_core::identity::HubIdentity;
use hub_core::ipc::{HubContext, HubServerHandle, RouterHandle, start_hub_server};
use hub_core::session_store::SessionStore;
use hub_core::token::TokenService;

use common::RedactedSecret;

use models::protocol::payloads::{AuthPayload, AuthSuccessPayload};
use models::HubMessage;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TEST_APP_ID: &str = "970ca35de60c44645bbae8a215061b33";
pub const TEST_APP_CERT: &str = "5cfd2fd1755d40ecb72977518be15d3b";
pub const TEST_PAIRING_CODE: &str = "12345678";
pub const TEST_HUB_ID: &str = "hub-test";

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Test helper: Start a hub on 127.0.0.1 with an ephemeral port.
pub async fn start_test_hub(approve: bool) -> (HubServerHandle, HubContext) {
    let sessions = SessionStore::in_memory();
    let grants = AuthGrantController::new(Arc::new(StaticApprover(approve)));
    let tokens = TokenService::new(TEST_APP_ID, RedactedSecret::new(TEST_APP_CERT), 3600, 3600);
    let context = HubContext {
        identity: HubIdentity::new(TEST_HUB_ID, "Test Hub"),
        sessions,
        grants: grants.clone(),
        router: RouterHandle::new(tokens, grants),
    };

    let config = ServerConfig {
        port: 0,
        bind_address: String::from("127.0.0.1"),
        ..ServerConfig::default()
    };
    let handle = start_hub_server(&config, context.clone())
        .await
        .expect("Failed to start hub server");
    (handle, context)
}

/// Test helper: Connect to the hub and consume the auth challenge.
pub async fn connect_to_hub(port: u16) -> TestSocket {
    let url = format!("ws://127.0.0.1:{}", port);
    let (mut ws, _) = connect_async(&url)
        .await
        .expect("Failed to connect to WebSocket server");

    match receive_message(&mut ws).await {
        HubMessage::AuthChallenge(challenge) => assert_eq!(challenge.hub_id, TEST_HUB_ID),
        other => panic!("Expected auth_challenge, got {}", other.kind()),
    }
    ws
}

/// Test helper: Send one message as a JSON text frame.
pub async fn send_message(ws: &mut TestSocket, message: &HubMessage) {
    let text = message.encode().expect("Failed to encode message");
    ws.send(Message::text(text))
        .await
        .expect("Failed to send message");
}

/// Test helper: Receive and decode the next text frame.
pub async fn receive_message(ws: &mut TestSocket) -> HubMessage {
    loop {
        let frame = tokio::time::timeout(RECEIVE_TIMEOUT, ws.next())
            .await
            .expect("Timed out waiting for message")
            .expect("No message received")
            .expect("Error receiving message");

        match frame {
            Message::Text(text) => {
                return HubMessage::decode(text.as_str()).expect("Failed to decode message");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected text frame, got {:?}", other),
        }
    }
}

/// Test helper: Skip messages until `matches` accepts one.
pub async fn receive_until(
    ws: &mut TestSocket,
    matches: impl Fn(&HubMessage) -> bool,
) -> HubMessage {
    loop {
        let message = receive_message(ws).await;
        if matches(&message) {
            return message;
        }
    }
}

/// Test helper: Pair with the hub and return the success payload.
pub async fn pair(ws: &mut TestSocket, hostname: &str) -> AuthSuccessPayload {
    send_message(
        ws,
        &HubMessage::Auth(AuthPayload {
            pairing_code: Some(String::from(TEST_PAIRING_CODE)),
            hostname: Some(hostname.to_string()),
            ..AuthPayload::default()
        }),
    )
    .await;

    match receive_message(ws).await {
        HubMessage::AuthSuccess(success) => success,
        other => panic!("Expected auth_success, got {}", other.kind()),
    }
}

/// Test helper: Authenticate with an existing session id.
pub async fn resume(ws: &mut TestSocket, session_id: &str) -> HubMessage {
    send_message(
        ws,
        &HubMessage::Auth(AuthPayload {
            session_id: Some(session_id.to_string()),
            ..AuthPayload::default()
        }),
    )
    .await;
    receive_message(ws).await
}

/// Test helper: Expect a close frame with the policy-violation code.
pub async fn expect_policy_close(ws: &mut TestSocket) {
    let frame = tokio::time::timeout(RECEIVE_TIMEOUT, ws.next())
        .await
        .expect("Timed out waiting for close");
    match frame {
        Some(Ok(Message::Close(Some(close)))) => assert_eq!(close.code, CloseCode::Policy),
        other => panic!("Expected close 1008, got {:?}", other),
    }
}

/// Test helper: Check if WebSocket connection is closed.
pub async fn is_connection_closed(ws: &mut TestSocket) -> bool {
    match tokio::time::timeout(Duration::from_millis(100), ws.next()).await {
        Err(_) => false,
        Ok(None) => true,
        Ok(Some(Ok(Message::Close(_)))) => true,
        Ok(Some(Ok(_))) => false,
        Ok(Some(Err(_))) => true,
    }
}

/// Test helper: Poll `check` until it holds or a few seconds pass.
pub async fn eventually<F, Fut>(check: F) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
