//! Request and response bodies of the relay and agent HTTP APIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVoiceSessionRequest {
    pub atem_id: String,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSessionInfo {
    pub session_id: String,
    pub atem_id: String,
    pub channel: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResult {
    pub session_id: String,
    #[serde(default)]
    pub accumulated_text: String,
    pub atem_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShareLinkRequest {
    pub app_id: String,
    pub channel: String,
    pub token: String,
    pub host_uid: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareLink {
    pub id: String,
    pub url: String,
}

/// Everything the speech agent needs to join the channel and reach the
/// relay's LLM endpoint for one voice session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentJoinRequest {
    pub channel: String,
    pub agent_uid: String,
    pub token: String,
    /// The uid whose audio the agent transcribes.
    pub remote_uid: String,
    pub llm_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentJoinResponse {
    pub agent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLeaveRequest {
    pub agent_id: String,
}
