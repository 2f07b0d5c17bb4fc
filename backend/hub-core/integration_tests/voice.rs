use crate::ipc_tests::helpers::{TEST_APP_CERT, TEST_APP_ID, eventually};

use hub_core::auth_grant::{AuthGrantController, StaticApprover};
use hub_core::ipc::{HubEvent, RouterHandle};
use hub_core::relay_client::{AgentClient, RelayClient};
use hub_core::token::TokenService;
use hub_core::voice::{
    JoinRequest, MediaEngine, MediaEvent, VoiceCoordinator, VoiceDeps, VoiceMode, VoiceSettings,
};

use common::RedactedSecret;

use models::protocol::payloads::VoiceResponsePayload;
use models::{ClientId, ConnectedClientBuilder, HubMessage};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records engine calls; joins with a fixed outcome.
struct RecordingMedia {
    join: JoinRequest,
    calls: Mutex<Vec<String>>,
}

impl RecordingMedia {
    fn new(join: JoinRequest) -> Arc<Self> {
        Arc::new(Self {
            join,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl MediaEngine for RecordingMedia {
    fn join_channel(&self, channel: &str, uid: u32, token: &str) -> JoinRequest {
        assert!(token.starts_with("007"), "join must carry a signed token");
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("join {channel} {uid}"));
        self.join.clone()
    }

    fn leave_channel(&self) {
        self.calls.lock().expect("calls lock").push(String::from("leave"));
    }

    fn set_mic_muted(&self, muted: bool) {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("muted {muted}"));
    }
}

fn settings() -> VoiceSettings {
    VoiceSettings {
        channel: String::from("hub-voice"),
        hub_uid: 1000,
        agent_uid: 1001,
        llm_path: String::from("/api/llm/chat"),
        join_timeout: Duration::from_millis(200),
        silence_trigger: Duration::from_millis(100),
        tick_interval: Duration::from_millis(50),
        response_timeout: Duration::from_secs(5),
    }
}

async fn mount_relay(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/voice-sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "vs-1",
            "atem_id": "atem-1",
            "channel": "hub-voice",
            "created_at": "2025-01-01T00:00:00Z"
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/agents/join"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "agent_id": "agent-1" })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/voice-sessions/vs-1/trigger"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "vs-1",
            "accumulated_text": "run the tests",
            "atem_id": "atem-1"
        })))
        .mount(server)
        .await;
}

struct Harness {
    router: RouterHandle,
    coordinator: VoiceCoordinator,
    media: Arc<RecordingMedia>,
    atem_rx: UnboundedReceiver<String>,
}

async fn harness(base_url: &str, join: JoinRequest) -> Harness {
    let tokens = TokenService::new(TEST_APP_ID, RedactedSecret::new(TEST_APP_CERT), 3600, 3600);
    let grants = AuthGrantController::new(Arc::new(StaticApprover(true)));
    let router = RouterHandle::new(tokens.clone(), grants);

    let (atem_tx, atem_rx) = unbounded_channel();
    let atem = ConnectedClientBuilder::default()
        .with_id(ClientId::from("atem-1"))
        .with_hostname("laptop")
        .build()
        .expect("valid client");
    router.register(atem, atem_tx).await.expect("registered");
    let probe = router.clone();
    assert!(
        eventually(|| {
            let router = probe.clone();
            async move { router.route_to_focused_atem().await.is_some() }
        })
        .await
    );

    let media = RecordingMedia::new(join);
    let coordinator = VoiceCoordinator::spawn(
        settings(),
        VoiceDeps {
            router: router.clone(),
            relay: RelayClient::new(base_url).expect("valid url"),
            agent: AgentClient::new(base_url).expect("valid url"),
            tokens,
            media: media.clone(),
        },
    );

    Harness {
        router,
        coordinator,
        media,
        atem_rx,
    }
}

async fn next_voice_request(rx: &mut UnboundedReceiver<String>) -> HubMessage {
    loop {
        let text = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("Timed out waiting for voice request")
            .expect("router channel open");
        let message = HubMessage::decode(&text).expect("valid frame");
        if matches!(message, HubMessage::VoiceRequest(_)) {
            return message;
        }
    }
}

/// **VALUE**: Verifies a complete push-to-talk exchange against the relay and agent.
///
/// **WHY THIS MATTERS**: This is the whole voice feature: key down opens the
/// mic with an agent listening, key up delivers the transcript to the focused
/// instance, and its reply ends the session.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The voice request doesn't reach the routed instance
/// - The router's voice_response never reaches the coordinator
/// - The relay session or agent is leaked after the exchange
#[tokio::test]
async fn given_ptt_exchange_when_instance_responds_then_session_released() {
    // GIVEN: Relay and agent APIs, one connected instance
    let server = MockServer::start().await;
    mount_relay(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/api/voice-sessions/vs-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/agents/leave"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let mut h = harness(&server.uri(), JoinRequest::Joined).await;

    // WHEN: Key down, then key up straight away
    h.coordinator.start_ptt().expect("coordinator running");
    h.coordinator.stop_ptt().expect("coordinator running");

    // THEN: The instance receives the transcript once the agent is up
    let request = match next_voice_request(&mut h.atem_rx).await {
        HubMessage::VoiceRequest(request) => request,
        _ => unreachable!(),
    };
    assert_eq!(request.session_id, "vs-1");
    assert_eq!(request.accumulated_text, "run the tests");
    assert!(request.relay_url.starts_with(&server.uri()));

    // WHEN: The instance answers through the router
    h.router
        .inbound(
            ClientId::from("atem-1"),
            HubMessage::VoiceResponse(VoiceResponsePayload {
                session_id: String::from("vs-1"),
                success: true,
                message: String::new(),
            }),
        )
        .await
        .expect("router running");

    // THEN: Voice is off and the mic ended muted
    let coordinator = h.coordinator.clone();
    assert!(
        eventually(|| {
            let coordinator = coordinator.clone();
            async move {
                let snapshot = coordinator.snapshot().await;
                snapshot.mode == VoiceMode::Off && !snapshot.is_waiting_for_response
            }
        })
        .await
    );
    let calls = h.media.calls();
    assert_eq!(calls.first().map(String::as_str), Some("join hub-voice 1000"));
    assert_eq!(calls.last().map(String::as_str), Some("muted true"));

    // Let the best-effort cleanup calls land before the mock verifies.
    tokio::time::sleep(Duration::from_millis(200)).await;
}

/// **VALUE**: Verifies a join that never completes is abandoned after the timeout.
///
/// **BUG THIS CATCHES**: A stuck engine leaving voice mode on forever.
#[tokio::test(start_paused = true)]
async fn given_pending_join_when_no_callback_then_times_out() {
    // GIVEN: An engine that never confirms the join; no HTTP is reached
    let h = harness("http://127.0.0.1:9", JoinRequest::Pending).await;
    let mut events = h.router.subscribe();

    // WHEN: Hands-free starts and the join timeout elapses
    h.coordinator.start_hands_free().expect("coordinator running");
    tokio::time::sleep(settings().join_timeout + Duration::from_millis(10)).await;

    // THEN: The timeout status is published and voice is off
    let status = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Ok(HubEvent::VoiceStatus(status)) = events.recv().await {
                if status == "Voice channel join timed out" {
                    return status;
                }
            }
        }
    })
    .await
    .expect("timeout status published");
    assert_eq!(status, "Voice channel join timed out");

    let coordinator = h.coordinator.clone();
    assert!(
        eventually(|| {
            let coordinator = coordinator.clone();
            async move {
                let snapshot = coordinator.snapshot().await;
                snapshot.mode == VoiceMode::Off && !snapshot.channel_joined
            }
        })
        .await
    );
}

/// **VALUE**: Verifies the engine's join callback resumes setup.
#[tokio::test]
async fn given_pending_join_when_join_success_then_relay_session_created() {
    let server = MockServer::start().await;
    mount_relay(&server).await;
    let h = harness(&server.uri(), JoinRequest::Pending).await;

    h.coordinator.start_ptt().expect("coordinator running");
    h.coordinator
        .media_event(MediaEvent::JoinSuccess {
            channel: String::from("hub-voice"),
            uid: 1000,
        })
        .expect("coordinator running");

    let coordinator = h.coordinator.clone();
    assert!(
        eventually(|| {
            let coordinator = coordinator.clone();
            async move {
                let snapshot = coordinator.snapshot().await;
                snapshot.channel_joined && snapshot.is_agent_ready
            }
        })
        .await
    );
    assert_eq!(
        h.coordinator.snapshot().await.active_session_id.as_deref(),
        Some("vs-1")
    );
}

/// **VALUE**: Verifies leaving the channel revokes share links and ends voice.
///
/// **WHY THIS MATTERS**: A share link outliving the channel lets guests join
/// a room nobody is hosting.
#[tokio::test]
async fn given_share_link_when_leave_channel_then_revoked() {
    let server = MockServer::start().await;
    mount_relay(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/rtc-sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "share-1",
            "url": "https://relay.example/s/share-1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/rtc-sessions/share-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&server.uri(), JoinRequest::Joined).await;

    h.coordinator.start_ptt().expect("coordinator running");
    let link = h
        .coordinator
        .create_share_link(1000)
        .await
        .expect("share link created");
    assert_eq!(link.id, "share-1");

    let coordinator = h.coordinator.clone();
    assert!(
        eventually(|| {
            let coordinator = coordinator.clone();
            async move { coordinator.snapshot().await.share_links == 1 }
        })
        .await
    );

    h.coordinator.leave_channel().expect("coordinator running");

    assert!(
        eventually(|| {
            let coordinator = coordinator.clone();
            async move {
                let snapshot = coordinator.snapshot().await;
                snapshot.share_links == 0 && !snapshot.channel_joined
            }
        })
        .await
    );
    assert!(h.media.calls().contains(&String::from("leave")));
    assert_eq!(h.coordinator.snapshot().await.mode, VoiceMode::Off);

    tokio::time::sleep(Duration::from_millis(200)).await;
}

/// **VALUE**: Verifies shutdown waits for the relay session and agent to be
/// released.
///
/// **WHY THIS MATTERS**: Ctrl-C during a voice session ends the process right
/// after shutdown returns; anything still queued is lost.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Shutdown returns before the relay delete and agent leave are sent
/// - The coordinator keeps accepting commands after shutting down
#[tokio::test]
async fn given_active_ptt_when_shutdown_then_cleanup_sent_before_return() {
    // GIVEN: A PTT session with the agent up
    let server = MockServer::start().await;
    mount_relay(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/api/voice-sessions/vs-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/agents/leave"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let h = harness(&server.uri(), JoinRequest::Joined).await;
    h.coordinator.start_ptt().expect("coordinator running");

    let coordinator = h.coordinator.clone();
    assert!(
        eventually(|| {
            let coordinator = coordinator.clone();
            async move { coordinator.snapshot().await.is_agent_ready }
        })
        .await
    );

    // WHEN: The coordinator shuts down
    h.coordinator
        .shutdown(Duration::from_secs(5))
        .await
        .expect("cleanup finished in time");

    // THEN: Both release calls already reached the server
    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests.iter().any(|r| {
        r.method.as_str() == "DELETE" && r.url.path() == "/api/voice-sessions/vs-1"
    }));
    assert!(requests
        .iter()
        .any(|r| r.method.as_str() == "POST" && r.url.path() == "/api/agents/leave"));

    // AND: Voice is off and the coordinator no longer takes commands
    assert_eq!(h.coordinator.snapshot().await.mode, VoiceMode::Off);
    assert!(h.coordinator.start_ptt().is_err());
}
