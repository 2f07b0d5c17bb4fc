use crate::error::model_error::ModelError;
use crate::{ClientId, ClientType, ConnectedClient};

use common::ErrorLocation;

use std::panic::Location;

use chrono::{DateTime, Utc};

/// Builder for validated [`ConnectedClient`] records.
///
/// The authenticator fills it from the handshake: the id comes from the
/// connection, the hostname from the pairing payload or the stored session.
#[derive(Debug, Default)]
pub struct ConnectedClientBuilder {
    id: Option<ClientId>,
    client_type: Option<ClientType>,
    hostname: Option<String>,
    tag: Option<String>,
    connected_at: Option<DateTime<Utc>>,
}

impl ConnectedClientBuilder {
    pub fn with_id(mut self, id: ClientId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = Some(client_type);
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_connected_at(mut self, connected_at: DateTime<Utc>) -> Self {
        self.connected_at = Some(connected_at);
        self
    }

    /// Build the client. `last_activity` starts at `connected_at`, unfocused.
    #[track_caller]
    pub fn build(self) -> Result<ConnectedClient, ModelError> {
        let id = self.id.ok_or_else(|| ModelError::Validation {
            message: String::from("Client id is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if id.as_str().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Client id cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let hostname = self.hostname.ok_or_else(|| ModelError::Validation {
            message: String::from("Hostname is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if hostname.trim().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Hostname cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let connected_at = self.connected_at.unwrap_or_else(Utc::now);

        Ok(ConnectedClient {
            id,
            client_type: self.client_type.unwrap_or_default(),
            connected_at,
            hostname,
            tag: self.tag.filter(|t| !t.is_empty()),
            last_activity: connected_at,
            is_focused: false,
        })
    }
}
