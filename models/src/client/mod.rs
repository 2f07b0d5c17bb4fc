//! Connected instances as seen by the router.

pub mod builder;

use std::fmt::{Display, Formatter, Result as FormatResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-connection identifier, assigned when the socket is accepted.
///
/// Ephemeral: a reconnecting instance gets a new id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ClientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for ClientId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// A terminal agent instance; the usual routing target.
    #[default]
    Atem,
    /// A relay intermediary.
    Relay,
    Other,
}

/// A registered, authenticated connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedClient {
    pub id: ClientId,
    pub client_type: ClientType,
    pub connected_at: DateTime<Utc>,
    pub hostname: String,
    pub tag: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub is_focused: bool,
}

impl ConnectedClient {
    /// Record activity carrying identifying metadata.
    ///
    /// Absent fields keep their previous value.
    pub fn touch(&mut self, hostname: Option<&str>, tag: Option<&str>, at: DateTime<Utc>) {
        if let Some(hostname) = hostname.filter(|h| !h.is_empty()) {
            self.hostname = hostname.to_string();
        }
        if let Some(tag) = tag {
            self.tag = Some(tag.to_string());
        }
        self.last_activity = at;
    }
}
