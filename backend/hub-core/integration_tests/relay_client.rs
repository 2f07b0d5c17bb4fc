use hub_core::error::relay_client::RelayClientError;
use hub_core::relay_client::{AgentClient, AgentJoinRequest, CreateShareLinkRequest, RelayClient};

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// **VALUE**: Verifies voice-session creation posts the target and channel.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The endpoint path drifts
/// - A base URL with a path prefix loses its last segment
#[tokio::test]
async fn given_relay_when_create_voice_session_then_posts_target_and_channel() {
    // GIVEN: A relay mounted under /relay
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/relay/api/voice-sessions"))
        .and(body_json(json!({ "atem_id": "atem-1", "channel": "hub-voice" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "vs-1",
            "atem_id": "atem-1",
            "channel": "hub-voice",
            "created_at": "2025-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let relay = RelayClient::new(&format!("{}/relay", server.uri())).expect("valid url");

    // WHEN: Creating a session
    let session = relay
        .create_voice_session("atem-1", "hub-voice")
        .await
        .expect("session created");

    // THEN: The relay's id comes back
    assert_eq!(session.session_id, "vs-1");
}

/// **VALUE**: Verifies trigger returns the accumulated text.
#[tokio::test]
async fn given_relay_when_trigger_then_returns_accumulated_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/voice-sessions/vs-1/trigger"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "vs-1",
            "accumulated_text": "open main.rs",
            "atem_id": "atem-1"
        })))
        .mount(&server)
        .await;
    let relay = RelayClient::new(&server.uri()).expect("valid url");

    let result = relay.trigger_voice_session("vs-1").await.expect("triggered");

    assert_eq!(result.accumulated_text, "open main.rs");
}

/// **VALUE**: Verifies server errors carry the status, and deletes tolerate 404.
///
/// **WHY THIS MATTERS**: Cleanup runs after the relay may already have expired
/// the session; that must not be reported as a failure.
#[tokio::test]
async fn given_relay_errors_when_called_then_status_reported_and_404_tolerated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/voice-sessions/broken/trigger"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/voice-sessions/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let relay = RelayClient::new(&server.uri()).expect("valid url");

    let error = relay
        .trigger_voice_session("broken")
        .await
        .expect_err("500 is an error");
    match error {
        RelayClientError::Server { message, .. } => assert_eq!(message, "boom"),
        other => panic!("Expected server error, got {}", other),
    }
    relay
        .delete_voice_session("gone")
        .await
        .expect("404 on delete is fine");
}

/// **VALUE**: Verifies share links are created and revoked by id.
#[tokio::test]
async fn given_relay_when_share_link_created_then_revocable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rtc-sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
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
    let relay = RelayClient::new(&server.uri()).expect("valid url");

    let link = relay
        .create_share_link(&CreateShareLinkRequest {
            app_id: String::from("app"),
            channel: String::from("hub-voice"),
            token: String::from("007abc"),
            host_uid: 1000,
        })
        .await
        .expect("link created");
    relay.revoke_share_link(&link.id).await.expect("revoked");

    assert_eq!(link.url, "https://relay.example/s/share-1");
}

/// **VALUE**: Verifies the LLM URL carries the session id as a query parameter.
#[test]
fn given_relay_base_when_llm_url_then_session_in_query() {
    let relay = RelayClient::new("https://relay.example/base").expect("valid url");

    let url = relay.llm_url("/api/llm/chat", "vs 1").expect("valid url");

    assert_eq!(url, "https://relay.example/base/api/llm/chat?session_id=vs+1");
}

/// **VALUE**: Verifies the agent lifecycle calls.
#[tokio::test]
async fn given_agent_api_when_join_and_leave_then_agent_id_round_trips() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/agents/join"))
        .and(body_json(json!({
            "channel": "hub-voice",
            "agent_uid": "1001",
            "token": "007tok",
            "remote_uid": "1000",
            "llm_url": "http://relay/api/llm/chat?session_id=vs-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "agent_id": "agent-9" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/agents/leave"))
        .and(body_json(json!({ "agent_id": "agent-9" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let agent = AgentClient::new(&server.uri()).expect("valid url");

    let agent_id = agent
        .join(&AgentJoinRequest {
            channel: String::from("hub-voice"),
            agent_uid: String::from("1001"),
            token: String::from("007tok"),
            remote_uid: String::from("1000"),
            llm_url: String::from("http://relay/api/llm/chat?session_id=vs-1"),
        })
        .await
        .expect("agent joined");
    agent.leave(&agent_id).await.expect("agent left");

    assert_eq!(agent_id, "agent-9");
}
