//! The JSON envelope spoken over the hub socket.
//!
//! Every frame is `{"type": <kind>, "timestamp"?: <ISO-8601>, "data": {...}}`.
//! [`HubMessage`] is the closed set of kinds this hub understands; anything
//! else decodes to [`HubMessage::Unhandled`] rather than an error.

pub mod payloads;

use crate::ProtocolError;

use payloads::*;

use common::ErrorLocation;

use std::panic::Location;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Kinds that decode into a typed [`HubMessage`] variant.
pub const KNOWN_KINDS: &[&str] = &[
    "auth",
    "auth_challenge",
    "auth_success",
    "auth_error",
    "session_verify_request",
    "session_verify_response",
    "auth_request",
    "auth_response",
    "instance_list",
    "project_list_request",
    "project_list_response",
    "agent_list_request",
    "agent_list_response",
    "token_request",
    "token_response",
    "user_command",
    "status_update",
    "mark_task_notify",
    "mark_task_assignment",
    "mark_task_result",
    "voice_request",
    "voice_response",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HubMessage {
    Auth(AuthPayload),
    AuthChallenge(AuthChallengePayload),
    AuthSuccess(AuthSuccessPayload),
    AuthError(AuthErrorPayload),
    SessionVerifyRequest(SessionVerifyRequestPayload),
    SessionVerifyResponse(SessionVerifyResponsePayload),
    AuthRequest(crate::AuthRequest),
    AuthResponse(AuthResponsePayload),
    InstanceList(InstanceListPayload),
    ProjectListRequest(ProjectListRequestPayload),
    ProjectListResponse(ProjectListResponsePayload),
    AgentListRequest(AgentListRequestPayload),
    AgentListResponse(AgentListResponsePayload),
    TokenRequest(TokenRequestPayload),
    TokenResponse(TokenResponsePayload),
    UserCommand(UserCommandPayload),
    StatusUpdate(StatusUpdatePayload),
    MarkTaskNotify(MarkTaskNotifyPayload),
    MarkTaskAssignment(MarkTaskAssignmentPayload),
    MarkTaskResult(MarkTaskResultPayload),
    VoiceRequest(VoiceRequestPayload),
    VoiceResponse(VoiceResponsePayload),
    /// A kind outside [`KNOWN_KINDS`]. Never encoded.
    #[serde(skip)]
    Unhandled { kind: String },
}

impl HubMessage {
    pub fn kind(&self) -> &str {
        match self {
            HubMessage::Auth(_) => "auth",
            HubMessage::AuthChallenge(_) => "auth_challenge",
            HubMessage::AuthSuccess(_) => "auth_success",
            HubMessage::AuthError(_) => "auth_error",
            HubMessage::SessionVerifyRequest(_) => "session_verify_request",
            HubMessage::SessionVerifyResponse(_) => "session_verify_response",
            HubMessage::AuthRequest(_) => "auth_request",
            HubMessage::AuthResponse(_) => "auth_response",
            HubMessage::InstanceList(_) => "instance_list",
            HubMessage::ProjectListRequest(_) => "project_list_request",
            HubMessage::ProjectListResponse(_) => "project_list_response",
            HubMessage::AgentListRequest(_) => "agent_list_request",
            HubMessage::AgentListResponse(_) => "agent_list_response",
            HubMessage::TokenRequest(_) => "token_request",
            HubMessage::TokenResponse(_) => "token_response",
            HubMessage::UserCommand(_) => "user_command",
            HubMessage::StatusUpdate(_) => "status_update",
            HubMessage::MarkTaskNotify(_) => "mark_task_notify",
            HubMessage::MarkTaskAssignment(_) => "mark_task_assignment",
            HubMessage::MarkTaskResult(_) => "mark_task_result",
            HubMessage::VoiceRequest(_) => "voice_request",
            HubMessage::VoiceResponse(_) => "voice_response",
            HubMessage::Unhandled { kind } => kind,
        }
    }

    /// Hostname/tag carried by messages that count as focus activity.
    ///
    /// `None` for kinds without identifying metadata, or when neither field
    /// is present.
    pub fn activity_metadata(&self) -> Option<(Option<&str>, Option<&str>)> {
        let (hostname, tag) = match self {
            HubMessage::UserCommand(p) => (p.hostname.as_deref(), p.tag.as_deref()),
            HubMessage::StatusUpdate(p) => (p.hostname.as_deref(), p.tag.as_deref()),
            HubMessage::ProjectListResponse(p) => (p.hostname.as_deref(), p.tag.as_deref()),
            HubMessage::AgentListResponse(p) => (p.hostname.as_deref(), p.tag.as_deref()),
            _ => return None,
        };
        if hostname.is_none() && tag.is_none() {
            return None;
        }
        Some((hostname, tag))
    }

    /// Decode one text frame.
    #[track_caller]
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        envelope.into_message()
    }

    /// Encode as a text frame stamped with `at`.
    #[track_caller]
    pub fn encode_at(&self, at: DateTime<Utc>) -> Result<String, ProtocolError> {
        let envelope = Envelope::from_message(self, Some(at))?;
        serde_json::to_string(&envelope).map_err(|e| ProtocolError::Encode {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    #[track_caller]
    pub fn encode(&self) -> Result<String, ProtocolError> {
        self.encode_at(Utc::now())
    }
}

/// Untyped frame as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    #[track_caller]
    pub fn from_message(
        message: &HubMessage,
        at: Option<DateTime<Utc>>,
    ) -> Result<Self, ProtocolError> {
        if let HubMessage::Unhandled { kind } = message {
            return Err(ProtocolError::Encode {
                message: format!("Cannot encode unhandled message kind '{kind}'"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let value = serde_json::to_value(message).map_err(|e| ProtocolError::Encode {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let data = match value {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Object(Map::new())),
            _ => Value::Object(Map::new()),
        };

        Ok(Self {
            kind: message.kind().to_string(),
            timestamp: at.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            data,
        })
    }

    /// Sender timestamp, if present and parseable. Malformed timestamps are
    /// ignored rather than failing the frame.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    #[track_caller]
    pub fn into_message(self) -> Result<HubMessage, ProtocolError> {
        if !KNOWN_KINDS.contains(&self.kind.as_str()) {
            return Ok(HubMessage::Unhandled { kind: self.kind });
        }

        let data = match self.data {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        serde_json::from_value(json!({ "type": self.kind, "data": data })).map_err(|e| {
            ProtocolError::Decode {
                message: format!("Invalid '{}' payload: {e}", self.kind),
                location: ErrorLocation::from(Location::caller()),
            }
        })
    }
}
