use hub::runtime::HubRuntime;

use hub_core::auth_grant::StaticApprover;
use hub_core::config::{HubConfig, ServerConfig};
use hub_core::voice::{NullMediaEngine, VoiceMode};

use models::HubMessage;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tempfile::TempDir;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const HUB_ID: &str = "hub-runtime-test";

fn test_config() -> HubConfig {
    HubConfig {
        server: ServerConfig {
            port: 0,
            bind_address: String::from("127.0.0.1"),
            hub_id: Some(String::from(HUB_ID)),
            ..ServerConfig::default()
        },
        ..HubConfig::default()
    }
}

async fn start(data_dir: &Path) -> HubRuntime {
    HubRuntime::start(
        &test_config(),
        data_dir,
        Arc::new(StaticApprover(false)),
        Arc::new(NullMediaEngine),
    )
    .await
    .expect("Failed to start hub runtime")
}

/// **VALUE**: Verifies the assembled hub accepts a WebSocket client and
/// greets it with its configured identity.
///
/// **BUG THIS CATCHES**: Startup wiring that binds the socket but never
/// hands connections to the server loop.
#[tokio::test]
async fn given_started_runtime_when_client_connects_then_challenge_names_hub() {
    // GIVEN: A hub with an empty data directory
    let data_dir = TempDir::new().expect("tempdir");
    let runtime = start(data_dir.path()).await;

    // WHEN: A client connects
    let url = format!("ws://127.0.0.1:{}", runtime.port());
    let (mut ws, _) = connect_async(&url).await.expect("connect");
    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("challenge before timeout")
        .expect("stream open")
        .expect("frame");

    // THEN: The first frame is a challenge carrying the configured hub id
    let text = match frame {
        Message::Text(text) => text.to_string(),
        other => panic!("Expected text frame, got {other:?}"),
    };
    match HubMessage::decode(&text).expect("decode challenge") {
        HubMessage::AuthChallenge(challenge) => assert_eq!(challenge.hub_id, HUB_ID),
        other => panic!("Expected auth_challenge, got {}", other.kind()),
    }

    runtime.shutdown().await;
}

/// **VALUE**: Verifies sessions survive a restart of the hub process.
///
/// **WHY THIS MATTERS**: Paired instances reconnect with their stored
/// session id for up to seven days; losing them forces a re-pair.
#[tokio::test]
async fn given_session_created_when_runtime_restarts_then_session_still_valid() {
    // GIVEN: A session created on a running hub
    let data_dir = TempDir::new().expect("tempdir");
    let runtime = start(data_dir.path()).await;
    let session = runtime.context().sessions.create("studio-mac").await;
    runtime.shutdown().await;

    // WHEN: The hub starts again over the same data directory
    let restarted = start(data_dir.path()).await;

    // THEN: The session is still accepted
    assert!(restarted.context().sessions.validate(&session.id).await);
    restarted.shutdown().await;
}

#[tokio::test]
async fn given_started_runtime_when_voice_inspected_then_off() {
    let data_dir = TempDir::new().expect("tempdir");
    let runtime = start(data_dir.path()).await;

    let snapshot = runtime.voice().snapshot().await;

    assert_eq!(snapshot.mode, VoiceMode::Off);
    assert!(snapshot.active_session_id.is_none());
    runtime.shutdown().await;
}
