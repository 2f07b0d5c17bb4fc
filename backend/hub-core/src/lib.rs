pub mod auth_grant;
pub mod config;
pub mod error;
pub mod identity;
pub mod ipc;
pub mod relay_client;
pub mod secrets;
pub mod session_store;
pub mod token;
pub mod voice;

#[cfg(test)]
mod tests;

pub const HUB_APP_NAME: &str = "local-hub";
pub const DEFAULT_HUB_PORT: u16 = 8765;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_RELAY_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_RELAY_BASE_URL: &str =
    const_format::concatcp!("http://", DEFAULT_RELAY_HOSTNAME, ":8080");
