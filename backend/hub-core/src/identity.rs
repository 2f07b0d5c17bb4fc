//! The hub's own identity, created once at start and passed to every
//! component that announces it.

use crate::config::ServerConfig;

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubIdentity {
    pub hub_id: String,
    pub hub_name: String,
}

impl HubIdentity {
    pub fn new(hub_id: impl Into<String>, hub_name: impl Into<String>) -> Self {
        Self {
            hub_id: hub_id.into(),
            hub_name: hub_name.into(),
        }
    }

    /// Configured id, or a fresh one for this process.
    pub fn from_config(config: &ServerConfig) -> Self {
        let hub_id = config
            .hub_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self::new(hub_id, config.hub_name.clone())
    }
}
