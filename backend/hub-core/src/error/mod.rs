pub mod config;
pub mod ipc;
pub mod relay_client;
pub mod session_store;
pub mod voice;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Ipc(#[from] ipc::IpcError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    SessionStore(#[from] session_store::SessionStoreError),

    #[error(transparent)]
    RelayClient(#[from] relay_client::RelayClientError),

    #[error(transparent)]
    Voice(#[from] voice::VoiceError),
}
