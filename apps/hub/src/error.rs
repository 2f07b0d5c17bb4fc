use hub_core::error::config::ConfigError;
use hub_core::error::ipc::IpcError;
use hub_core::error::relay_client::RelayClientError;
use hub_core::error::session_store::SessionStoreError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the hub process.
#[derive(Debug, Error)]
pub enum HubError {
    /// Error from this App
    #[error("Hub Error: {message} {location}")]
    Hub {
        message: String,
        location: ErrorLocation,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Error from hub-core startup (server, store, clients)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for HubError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        HubError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IpcError> for HubError {
    #[track_caller]
    fn from(error: IpcError) -> Self {
        HubError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<SessionStoreError> for HubError {
    #[track_caller]
    fn from(error: SessionStoreError) -> Self {
        HubError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<RelayClientError> for HubError {
    #[track_caller]
    fn from(error: RelayClientError) -> Self {
        HubError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
