//! One payload struct per message kind.
//!
//! Field names are the wire names. Optional metadata is skipped when absent.

use crate::{ClientId, ConnectedClient};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---- authentication ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_type: Option<crate::ClientType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthChallengePayload {
    pub client_id: ClientId,
    pub hub_id: String,
    pub hub_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSuccessPayload {
    pub client_id: ClientId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Only sent once, right after a pairing is approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    pub hub_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorCode {
    SessionExpired,
    PairingDenied,
    NotAuthenticated,
    InvalidRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthErrorPayload {
    pub code: AuthErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionVerifyRequestPayload {
    pub session_id: String,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionVerifyResponsePayload {
    pub session_id: String,
    pub request_id: String,
    pub valid: bool,
    /// Present only when `valid`. The relay reads it as `astation_id`.
    #[serde(
        rename = "astation_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hub_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponsePayload {
    pub session_id: String,
    pub granted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

// ---- registry ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceListPayload {
    pub instances: Vec<ConnectedClient>,
    pub focused_id: Option<ClientId>,
}

// ---- projects / agents ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectListRequestPayload {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectListResponsePayload {
    #[serde(default)]
    pub projects: Vec<ProjectInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentListRequestPayload {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentListResponsePayload {
    #[serde(default)]
    pub agents: Vec<AgentInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

// ---- tokens ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRequestPayload {
    pub channel: String,
    /// Decimal string; validated by the router, not at decode time.
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponsePayload {
    /// Empty on failure.
    pub token: String,
    /// Seconds, as a decimal string. `"0"` on failure.
    pub expires_in: String,
    pub channel: String,
    pub uid: String,
}

// ---- commands / status ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCommandPayload {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdatePayload {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

// ---- mark tasks ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkTaskNotifyPayload {
    pub task_id: String,
    pub status: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkTaskAssignmentPayload {
    pub task_id: String,
    pub description: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkTaskResultPayload {
    pub task_id: String,
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

// ---- voice ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceRequestPayload {
    pub session_id: String,
    pub accumulated_text: String,
    pub relay_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceResponsePayload {
    pub session_id: String,
    pub success: bool,
    #[serde(default)]
    pub message: String,
}
