//! Per-connection authentication handshake.
//!
//! `Connected` until the first valid `auth` message, then `Authenticated`
//! (registered with the router) or `Rejected` (error reply, then close 1008).
//! Session-verify requests are answered in any state and never change it.

use crate::auth_grant::AuthGrantController;
use crate::identity::HubIdentity;
use crate::secrets::short_id;
use crate::session_store::SessionStore;

use models::protocol::payloads::{
    AuthChallengePayload, AuthErrorCode, AuthErrorPayload, AuthPayload, AuthSuccessPayload,
    SessionVerifyRequestPayload, SessionVerifyResponsePayload,
};
use models::{AuthRequest, ClientId, ConnectedClient, ConnectedClientBuilder, HubMessage};

use log::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Connected,
    Authenticated(ConnectedClient),
    Rejected,
}

/// What the connection loop must do after one inbound message.
#[derive(Debug, Default)]
pub struct AuthStep {
    pub replies: Vec<HubMessage>,
    /// Set on the transition to `Authenticated`.
    pub registered: Option<ConnectedClient>,
    /// Set on the transition to `Rejected`.
    pub close: bool,
}

impl AuthStep {
    fn reply(message: HubMessage) -> Self {
        Self {
            replies: vec![message],
            ..Self::default()
        }
    }

    fn reject(code: AuthErrorCode, message: &str) -> Self {
        Self {
            replies: vec![auth_error(code, message)],
            registered: None,
            close: true,
        }
    }
}

fn auth_error(code: AuthErrorCode, message: &str) -> HubMessage {
    HubMessage::AuthError(AuthErrorPayload {
        code,
        message: message.to_string(),
    })
}

pub struct ConnectionAuthenticator {
    client_id: ClientId,
    identity: HubIdentity,
    sessions: SessionStore,
    grants: AuthGrantController,
    state: AuthState,
    session_id: Option<String>,
}

impl ConnectionAuthenticator {
    pub fn new(
        client_id: ClientId,
        identity: HubIdentity,
        sessions: SessionStore,
        grants: AuthGrantController,
    ) -> Self {
        Self {
            client_id,
            identity,
            sessions,
            grants,
            state: AuthState::Connected,
            session_id: None,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// The pairing session this connection authenticated with.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn challenge(&self) -> HubMessage {
        HubMessage::AuthChallenge(AuthChallengePayload {
            client_id: self.client_id.clone(),
            hub_id: self.identity.hub_id.clone(),
            hub_name: self.identity.hub_name.clone(),
        })
    }

    /// Handle a message that arrived before authentication completed.
    pub async fn handle_unauthenticated(&mut self, message: HubMessage) -> AuthStep {
        if self.state != AuthState::Connected {
            warn!(
                "Client {} sent {} in state {:?}",
                self.client_id,
                message.kind(),
                self.state
            );
            return AuthStep::default();
        }

        match message {
            HubMessage::Auth(payload) => self.authenticate(payload).await,
            HubMessage::SessionVerifyRequest(request) => {
                AuthStep::reply(self.verify_session(request).await)
            }
            other => {
                warn!(
                    "Client {} sent {} before authenticating",
                    self.client_id,
                    other.kind()
                );
                self.state = AuthState::Rejected;
                AuthStep::reject(AuthErrorCode::NotAuthenticated, "Authentication required")
            }
        }
    }

    /// A frame that failed to decode before authentication.
    pub fn reject_malformed(&mut self, reason: &str) -> AuthStep {
        warn!("Client {} sent malformed frame: {}", self.client_id, reason);
        self.state = AuthState::Rejected;
        AuthStep::reject(AuthErrorCode::InvalidRequest, "Malformed message")
    }

    async fn authenticate(&mut self, payload: AuthPayload) -> AuthStep {
        if let Some(session_id) = payload.session_id.clone().filter(|s| !s.is_empty()) {
            return self.authenticate_session(session_id, payload).await;
        }
        if let Some(code) = payload.pairing_code.clone().filter(|c| !c.is_empty()) {
            return self.authenticate_pairing(code, payload).await;
        }

        self.state = AuthState::Rejected;
        AuthStep::reject(
            AuthErrorCode::InvalidRequest,
            "Auth requires session_id or pairing_code",
        )
    }

    async fn authenticate_session(&mut self, session_id: String, payload: AuthPayload) -> AuthStep {
        let session = match self.sessions.get(&session_id).await {
            Some(session) => session,
            None => {
                info!(
                    "Client {} presented invalid or expired session {}",
                    self.client_id,
                    short_id(&session_id)
                );
                self.state = AuthState::Rejected;
                return AuthStep::reject(AuthErrorCode::SessionExpired, "Session expired");
            }
        };

        self.sessions.refresh(&session_id).await;

        let hostname = payload
            .hostname
            .clone()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(session.hostname);

        let step = self.register(hostname, &payload, Some(session_id.clone()), None);
        if step.registered.is_some() {
            info!(
                "Client {} authenticated with session {}",
                self.client_id,
                short_id(&session_id)
            );
        }
        step
    }

    async fn authenticate_pairing(&mut self, pairing_code: String, payload: AuthPayload) -> AuthStep {
        let Some(hostname) = payload.hostname.clone().filter(|h| !h.trim().is_empty()) else {
            self.state = AuthState::Rejected;
            return AuthStep::reject(AuthErrorCode::InvalidRequest, "Pairing requires hostname");
        };

        let request = AuthRequest {
            session_id: self.client_id.to_string(),
            hostname: hostname.clone(),
            otp: pairing_code,
        };

        let outcome = self.grants.handle_auth_request(request).await;
        if outcome.granted != Some(true) {
            info!("Pairing denied for client {} ({})", self.client_id, hostname);
            self.state = AuthState::Rejected;
            return AuthStep::reject(AuthErrorCode::PairingDenied, "Pairing denied");
        }

        let session = self.sessions.create(&hostname).await;
        let step = self.register(
            hostname,
            &payload,
            Some(session.id.clone()),
            Some(session.token.clone()),
        );
        if step.registered.is_some() {
            info!(
                "Client {} paired as session {}",
                self.client_id,
                short_id(&session.id)
            );
        }
        step
    }

    fn register(
        &mut self,
        hostname: String,
        payload: &AuthPayload,
        session_id: Option<String>,
        session_token: Option<String>,
    ) -> AuthStep {
        let client = ConnectedClientBuilder::default()
            .with_id(self.client_id.clone())
            .with_client_type(payload.client_type.unwrap_or_default())
            .with_hostname(hostname)
            .with_tag(payload.tag.clone())
            .build();

        let client = match client {
            Ok(client) => client,
            Err(e) => {
                warn!("Client {} registration failed: {}", self.client_id, e);
                self.state = AuthState::Rejected;
                return AuthStep::reject(AuthErrorCode::InvalidRequest, "Invalid client identity");
            }
        };

        self.session_id = session_id.clone();
        self.state = AuthState::Authenticated(client.clone());

        AuthStep {
            replies: vec![HubMessage::AuthSuccess(AuthSuccessPayload {
                client_id: self.client_id.clone(),
                session_id,
                session_token,
                hub_id: self.identity.hub_id.clone(),
            })],
            registered: Some(client),
            close: false,
        }
    }

    /// Answer a relay's question about a session without touching this
    /// connection's state. Valid sessions are refreshed.
    pub async fn verify_session(&self, request: SessionVerifyRequestPayload) -> HubMessage {
        let valid = self.sessions.validate(&request.session_id).await;
        if valid {
            self.sessions.refresh(&request.session_id).await;
        }
        debug!(
            "Session verify {} for {}: {}",
            request.request_id,
            short_id(&request.session_id),
            valid
        );

        HubMessage::SessionVerifyResponse(SessionVerifyResponsePayload {
            session_id: request.session_id,
            request_id: request.request_id,
            valid,
            hub_id: valid.then(|| self.identity.hub_id.clone()),
        })
    }

    /// Side effects of an authenticated inbound message that belong to the
    /// session rather than the router.
    pub async fn observe_authenticated(&self, message: &HubMessage) {
        if let HubMessage::StatusUpdate(update) = message {
            if let Some(session_id) = update.session_id.as_deref().filter(|s| !s.is_empty()) {
                self.sessions.refresh(session_id).await;
            }
        }
    }
}
