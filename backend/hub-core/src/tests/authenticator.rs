// Unit tests for the per-connection auth handshake

use super::ManualClock;

use crate::auth_grant::{AuthGrantController, StaticApprover};
use crate::identity::HubIdentity;
use crate::ipc::{AuthState, ConnectionAuthenticator};
use crate::session_store::SessionStore;

use models::protocol::payloads::{
    AuthErrorCode, AuthPayload, SessionVerifyRequestPayload, StatusUpdatePayload,
    UserCommandPayload,
};
use models::{ClientId, ClientType, HubMessage};

use std::sync::Arc;

use chrono::TimeDelta;

struct Fixture {
    clock: ManualClock,
    sessions: SessionStore,
    approve: bool,
}

impl Fixture {
    fn new(approve: bool) -> Self {
        let clock = ManualClock::new();
        let sessions = SessionStore::in_memory().with_clock(clock.as_clock());
        Self {
            clock,
            sessions,
            approve,
        }
    }

    fn authenticator(&self, client_id: &str) -> ConnectionAuthenticator {
        ConnectionAuthenticator::new(
            ClientId::from(client_id),
            HubIdentity::new("hub-1", "Test Hub"),
            self.sessions.clone(),
            AuthGrantController::new(Arc::new(StaticApprover(self.approve))),
        )
    }
}

fn pairing(hostname: Option<&str>) -> HubMessage {
    HubMessage::Auth(AuthPayload {
        pairing_code: Some(String::from("12345678")),
        hostname: hostname.map(str::to_string),
        tag: Some(String::from("main")),
        ..AuthPayload::default()
    })
}

fn with_session(session_id: &str) -> HubMessage {
    HubMessage::Auth(AuthPayload {
        session_id: Some(session_id.to_string()),
        ..AuthPayload::default()
    })
}

fn error_code(message: &HubMessage) -> AuthErrorCode {
    match message {
        HubMessage::AuthError(error) => error.code,
        other => panic!("expected auth_error, got {}", other.kind()),
    }
}

/// **VALUE**: Verifies the challenge names the connection and the hub.
#[test]
fn given_new_connection_when_challenge_then_carries_client_and_hub_ids() {
    let fixture = Fixture::new(true);
    let auth = fixture.authenticator("client-1");

    match auth.challenge() {
        HubMessage::AuthChallenge(challenge) => {
            assert_eq!(challenge.client_id, ClientId::from("client-1"));
            assert_eq!(challenge.hub_id, "hub-1");
            assert_eq!(challenge.hub_name, "Test Hub");
        }
        other => panic!("expected auth_challenge, got {}", other.kind()),
    }
    assert_eq!(auth.state(), &AuthState::Connected);
}

/// **VALUE**: Verifies an approved pairing creates a session and registers the client.
///
/// **WHY THIS MATTERS**: This is the first-contact path for every instance. The
/// reply must hand back the session id and token it will reconnect with.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The session isn't persisted before success is sent
/// - Hostname or tag from the auth payload are dropped
#[tokio::test]
async fn given_approved_pairing_when_auth_then_session_created_and_registered() {
    // GIVEN: A hub that approves pairing
    let fixture = Fixture::new(true);
    let mut auth = fixture.authenticator("client-1");

    // WHEN: The client pairs
    let step = auth.handle_unauthenticated(pairing(Some("laptop"))).await;

    // THEN: Success with a live session, and the client is registered
    assert!(!step.close);
    let success = match &step.replies[..] {
        [HubMessage::AuthSuccess(success)] => success.clone(),
        other => panic!("expected one auth_success, got {:?}", other),
    };
    let session_id = success.session_id.expect("session id on pairing");
    assert!(success.session_token.is_some());
    assert_eq!(success.hub_id, "hub-1");
    assert!(fixture.sessions.validate(&session_id).await);

    let client = step.registered.expect("client registered");
    assert_eq!(client.hostname, "laptop");
    assert_eq!(client.tag.as_deref(), Some("main"));
    assert_eq!(client.client_type, ClientType::Atem);
    assert_eq!(auth.session_id(), Some(session_id.as_str()));
    assert!(matches!(auth.state(), AuthState::Authenticated(_)));
}

/// **VALUE**: Verifies a denied pairing is rejected with pairing_denied.
#[tokio::test]
async fn given_denied_pairing_when_auth_then_rejected_and_closed() {
    let fixture = Fixture::new(false);
    let mut auth = fixture.authenticator("client-1");

    let step = auth.handle_unauthenticated(pairing(Some("laptop"))).await;

    assert!(step.close);
    assert!(step.registered.is_none());
    assert_eq!(error_code(&step.replies[0]), AuthErrorCode::PairingDenied);
    assert_eq!(auth.state(), &AuthState::Rejected);
    assert!(fixture.sessions.get_all_active().await.is_empty());
}

/// **VALUE**: Verifies pairing without a hostname is an invalid request.
#[tokio::test]
async fn given_pairing_without_hostname_when_auth_then_invalid_request() {
    let fixture = Fixture::new(true);
    let mut auth = fixture.authenticator("client-1");

    let step = auth.handle_unauthenticated(pairing(None)).await;

    assert!(step.close);
    assert_eq!(error_code(&step.replies[0]), AuthErrorCode::InvalidRequest);
}

/// **VALUE**: Verifies reconnecting with a live session refreshes it and reuses its hostname.
///
/// **BUG THIS CATCHES**: A reconnect that doesn't slide the seven-day window.
#[tokio::test]
async fn given_valid_session_when_auth_then_refreshed_and_registered() {
    // GIVEN: A session created three days ago
    let fixture = Fixture::new(false);
    let session = fixture.sessions.create("desktop").await;
    fixture.clock.advance(TimeDelta::days(3));
    let mut auth = fixture.authenticator("client-2");

    // WHEN: The client presents it
    let step = auth.handle_unauthenticated(with_session(&session.id)).await;

    // THEN: Registered under the stored hostname, activity bumped
    let client = step.registered.expect("client registered");
    assert_eq!(client.hostname, "desktop");
    let refreshed = fixture.sessions.get(&session.id).await.expect("valid");
    assert_eq!(refreshed.last_activity, fixture.clock.now());
    match &step.replies[0] {
        HubMessage::AuthSuccess(success) => {
            assert_eq!(success.session_id.as_deref(), Some(session.id.as_str()));
            assert!(success.session_token.is_none());
        }
        other => panic!("expected auth_success, got {}", other.kind()),
    }
}

/// **VALUE**: Verifies an expired session is rejected even when pairing would be approved.
#[tokio::test]
async fn given_expired_session_when_auth_then_session_expired() {
    let fixture = Fixture::new(true);
    let session = fixture.sessions.create("desktop").await;
    fixture.clock.advance(TimeDelta::days(8));
    let mut auth = fixture.authenticator("client-2");

    let step = auth.handle_unauthenticated(with_session(&session.id)).await;

    assert!(step.close);
    assert_eq!(error_code(&step.replies[0]), AuthErrorCode::SessionExpired);
}

/// **VALUE**: Verifies session_id takes precedence over pairing_code.
///
/// **BUG THIS CATCHES**: A stale session silently falling back to a new pairing prompt.
#[tokio::test]
async fn given_both_credentials_when_auth_then_session_path_wins() {
    let fixture = Fixture::new(true);
    let mut auth = fixture.authenticator("client-3");

    let step = auth
        .handle_unauthenticated(HubMessage::Auth(AuthPayload {
            session_id: Some(String::from("unknown")),
            pairing_code: Some(String::from("12345678")),
            hostname: Some(String::from("laptop")),
            ..AuthPayload::default()
        }))
        .await;

    assert_eq!(error_code(&step.replies[0]), AuthErrorCode::SessionExpired);
}

/// **VALUE**: Verifies non-auth traffic before authentication is refused.
#[tokio::test]
async fn given_unauthenticated_when_other_message_then_not_authenticated() {
    let fixture = Fixture::new(true);
    let mut auth = fixture.authenticator("client-4");

    let step = auth
        .handle_unauthenticated(HubMessage::UserCommand(UserCommandPayload {
            command: String::from("ls"),
            source: None,
            hostname: None,
            tag: None,
        }))
        .await;

    assert!(step.close);
    assert_eq!(error_code(&step.replies[0]), AuthErrorCode::NotAuthenticated);
    assert_eq!(auth.state(), &AuthState::Rejected);
}

/// **VALUE**: Verifies an auth message with no credentials is invalid.
#[tokio::test]
async fn given_empty_auth_when_handled_then_invalid_request() {
    let fixture = Fixture::new(true);
    let mut auth = fixture.authenticator("client-5");

    let step = auth
        .handle_unauthenticated(HubMessage::Auth(AuthPayload::default()))
        .await;

    assert_eq!(error_code(&step.replies[0]), AuthErrorCode::InvalidRequest);
}

/// **VALUE**: Verifies session verification works before auth and leaves state alone.
///
/// **WHY THIS MATTERS**: Relays ask the hub whether a session is real without
/// ever authenticating themselves.
#[tokio::test]
async fn given_unauthenticated_relay_when_verify_request_then_answered_without_state_change() {
    let fixture = Fixture::new(true);
    let session = fixture.sessions.create("desktop").await;
    let mut auth = fixture.authenticator("relay-1");

    let valid = auth
        .handle_unauthenticated(HubMessage::SessionVerifyRequest(SessionVerifyRequestPayload {
            session_id: session.id.clone(),
            request_id: String::from("r1"),
        }))
        .await;
    let invalid = auth
        .handle_unauthenticated(HubMessage::SessionVerifyRequest(SessionVerifyRequestPayload {
            session_id: String::from("bogus"),
            request_id: String::from("r2"),
        }))
        .await;

    match (&valid.replies[0], &invalid.replies[0]) {
        (HubMessage::SessionVerifyResponse(ok), HubMessage::SessionVerifyResponse(bad)) => {
            assert!(ok.valid);
            assert_eq!(ok.request_id, "r1");
            assert_eq!(ok.hub_id.as_deref(), Some("hub-1"));
            assert!(!bad.valid);
            assert_eq!(bad.request_id, "r2");
            assert!(bad.hub_id.is_none());
        }
        other => panic!("expected verify responses, got {:?}", other),
    }
    assert!(!valid.close && !invalid.close);
    assert_eq!(auth.state(), &AuthState::Connected);
}

/// **VALUE**: Verifies status updates carrying a session id keep it alive.
#[tokio::test]
async fn given_status_update_with_session_when_observed_then_session_refreshed() {
    let fixture = Fixture::new(true);
    let session = fixture.sessions.create("desktop").await;
    let auth = fixture.authenticator("client-6");
    fixture.clock.advance(TimeDelta::days(6));

    auth.observe_authenticated(&HubMessage::StatusUpdate(StatusUpdatePayload {
        status: String::from("idle"),
        session_id: Some(session.id.clone()),
        hostname: None,
        tag: None,
    }))
    .await;
    fixture.clock.advance(TimeDelta::days(2));

    assert!(fixture.sessions.validate(&session.id).await);
}

/// **VALUE**: Verifies a malformed frame rejects the connection with invalid_request.
#[test]
fn given_connected_when_malformed_frame_then_rejected() {
    let fixture = Fixture::new(true);
    let mut auth = fixture.authenticator("client-7");

    let step = auth.reject_malformed("binary frame");

    assert!(step.close);
    assert_eq!(error_code(&step.replies[0]), AuthErrorCode::InvalidRequest);
    assert_eq!(auth.state(), &AuthState::Rejected);
}
