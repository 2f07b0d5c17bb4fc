//! HTTP clients for the session relay and the speech-agent lifecycle API.
//!
//! No retries: a failed call is reported to the caller, which aborts the
//! current voice cycle.

mod types;

pub use types::{
    AgentJoinRequest, AgentJoinResponse, AgentLeaveRequest, CreateShareLinkRequest,
    CreateVoiceSessionRequest, ShareLink, TriggerResult, VoiceSessionInfo,
};

use crate::error::relay_client::RelayClientError;

use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, Response};
use url::Url;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(15);
const VOICE_SESSIONS_ENDPOINT: &str = "api/voice-sessions";
const RTC_SESSIONS_ENDPOINT: &str = "api/rtc-sessions";
const AGENT_JOIN_ENDPOINT: &str = "api/agents/join";
const AGENT_LEAVE_ENDPOINT: &str = "api/agents/leave";

/// `base_url` with a trailing slash so `join` appends instead of replacing
/// the last path segment.
fn parse_base_url(base_url: &str) -> Result<Url, RelayClientError> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn build_client() -> Result<Client, RelayClientError> {
    Ok(Client::builder().timeout(DEFAULT_TIMEOUT_DURATION).build()?)
}

async fn ensure_success(response: Response) -> Result<Response, RelayClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let status = HttpStatusCode::from(status.as_u16());
    let url = response.url().clone();
    if status.is_server_error() {
        warn!("Relay service failed with {} for {}", status, url);
    } else if status.is_client_error() && !status.is_not_found() {
        debug!("Relay rejected request to {} with {}", url, status);
    }
    Err(RelayClientError::Server {
        status,
        message: response.text().await.unwrap_or_default(),
        location: ErrorLocation::from(Location::caller()),
    })
}

/// Deletes treat "already gone" as success.
fn tolerate_not_found(result: Result<Response, RelayClientError>) -> Result<(), RelayClientError> {
    match result {
        Ok(_) => Ok(()),
        Err(RelayClientError::Server { status, .. }) if status.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

#[derive(Clone)]
pub struct RelayClient {
    base_url: Url,
    client: Client,
}

impl RelayClient {
    pub fn new(base_url_str: &str) -> Result<Self, RelayClientError> {
        Ok(Self {
            base_url: parse_base_url(base_url_str)?,
            client: build_client()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL the speech agent posts LLM turns to for `session_id`.
    pub fn llm_url(&self, llm_path: &str, session_id: &str) -> Result<String, RelayClientError> {
        let mut url = self.base_url.join(llm_path.trim_start_matches('/'))?;
        url.query_pairs_mut().append_pair("session_id", session_id);
        Ok(url.to_string())
    }

    pub async fn create_voice_session(
        &self,
        atem_id: &str,
        channel: &str,
    ) -> Result<VoiceSessionInfo, RelayClientError> {
        let url = self.base_url.join(VOICE_SESSIONS_ENDPOINT)?;
        let body = CreateVoiceSessionRequest {
            atem_id: atem_id.to_string(),
            channel: channel.to_string(),
        };

        let response = self.client.post(url).json(&body).send().await?;
        let session: VoiceSessionInfo = ensure_success(response).await?.json().await?;

        debug!("Created relay voice session {}", session.session_id);
        Ok(session)
    }

    /// Fetch (and clear) the text accumulated in `session_id`.
    pub async fn trigger_voice_session(
        &self,
        session_id: &str,
    ) -> Result<TriggerResult, RelayClientError> {
        let url = self
            .base_url
            .join(&format!("{VOICE_SESSIONS_ENDPOINT}/{session_id}/trigger"))?;

        let response = self.client.post(url).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    pub async fn delete_voice_session(&self, session_id: &str) -> Result<(), RelayClientError> {
        let url = self
            .base_url
            .join(&format!("{VOICE_SESSIONS_ENDPOINT}/{session_id}"))?;

        let response = self.client.delete(url).send().await?;
        tolerate_not_found(ensure_success(response).await)
    }

    pub async fn create_share_link(
        &self,
        request: &CreateShareLinkRequest,
    ) -> Result<ShareLink, RelayClientError> {
        let url = self.base_url.join(RTC_SESSIONS_ENDPOINT)?;
        let response = self.client.post(url).json(request).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    pub async fn revoke_share_link(&self, id: &str) -> Result<(), RelayClientError> {
        let url = self
            .base_url
            .join(&format!("{RTC_SESSIONS_ENDPOINT}/{id}"))?;

        let response = self.client.delete(url).send().await?;
        tolerate_not_found(ensure_success(response).await)
    }
}

#[derive(Clone)]
pub struct AgentClient {
    base_url: Url,
    client: Client,
}

impl AgentClient {
    pub fn new(base_url_str: &str) -> Result<Self, RelayClientError> {
        Ok(Self {
            base_url: parse_base_url(base_url_str)?,
            client: build_client()?,
        })
    }

    /// Start an agent. It is ready once this returns its id.
    pub async fn join(&self, request: &AgentJoinRequest) -> Result<String, RelayClientError> {
        let url = self.base_url.join(AGENT_JOIN_ENDPOINT)?;
        let response = self.client.post(url).json(request).send().await?;
        let joined: AgentJoinResponse = ensure_success(response).await?.json().await?;
        Ok(joined.agent_id)
    }

    pub async fn leave(&self, agent_id: &str) -> Result<(), RelayClientError> {
        let url = self.base_url.join(AGENT_LEAVE_ENDPOINT)?;
        let body = AgentLeaveRequest {
            agent_id: agent_id.to_string(),
        };
        let response = self.client.post(url).json(&body).send().await?;
        tolerate_not_found(ensure_success(response).await)
    }
}
