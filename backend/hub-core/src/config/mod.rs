use crate::error::config::ConfigError;
use crate::{DEFAULT_BIND_ADDRESS, DEFAULT_HUB_PORT, DEFAULT_RELAY_BASE_URL, HUB_APP_NAME};

use common::{ErrorLocation, RedactedSecret};

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize, Serializer};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;

pub const ENV_APP_ID: &str = "HUB_APP_ID";
pub const ENV_APP_CERTIFICATE: &str = "HUB_APP_CERTIFICATE";
pub const ENV_RELAY_URL: &str = "HUB_RELAY_URL";
pub const ENV_PORT: &str = "HUB_PORT";

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Reject peers that are not on the loopback interface.
    #[serde(default)]
    pub local_only: bool,
    /// Stable hub identity. Generated per start when absent.
    #[serde(default)]
    pub hub_id: Option<String>,
    #[serde(default = "default_hub_name")]
    pub hub_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            local_only: false,
            hub_id: None,
            hub_name: default_hub_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RtcConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default, serialize_with = "serialize_secret")]
    pub app_certificate: RedactedSecret,
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Uid the hub itself joins the channel with.
    #[serde(default = "default_hub_uid")]
    pub hub_uid: u32,
    #[serde(default = "default_expire_seconds")]
    pub token_expire_seconds: u32,
    #[serde(default = "default_expire_seconds")]
    pub privilege_expire_seconds: u32,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_certificate: RedactedSecret::default(),
            channel: default_channel(),
            hub_uid: default_hub_uid(),
            token_expire_seconds: default_expire_seconds(),
            privilege_expire_seconds: default_expire_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default = "default_relay_base_url")]
    pub base_url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: default_relay_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default = "default_relay_base_url")]
    pub base_url: String,
    #[serde(default = "default_agent_uid")]
    pub agent_uid: u32,
    /// Relay path the agent posts LLM turns to.
    #[serde(default = "default_llm_path")]
    pub llm_path: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: default_relay_base_url(),
            agent_uid: default_agent_uid(),
            llm_path: default_llm_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceConfig {
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,
    #[serde(default = "default_silence_trigger_secs")]
    pub silence_trigger_secs: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            join_timeout_secs: default_join_timeout_secs(),
            silence_trigger_secs: default_silence_trigger_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            response_timeout_secs: default_response_timeout_secs(),
        }
    }
}

impl VoiceConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    pub fn silence_trigger(&self) -> Duration {
        Duration::from_secs(self.silence_trigger_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionsConfig {
    #[serde(default = "default_sessions_file_name")]
    pub file_name: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            file_name: default_sessions_file_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub rtc: RtcConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            rtc: RtcConfig::default(),
            relay: RelayConfig::default(),
            agent: AgentConfig::default(),
            voice: VoiceConfig::default(),
            sessions: SessionsConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_port() -> u16 {
    DEFAULT_HUB_PORT
}
fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}
fn default_hub_name() -> String {
    "Local Hub".to_string()
}
fn default_channel() -> String {
    "hub-voice".to_string()
}
fn default_hub_uid() -> u32 {
    1000
}
fn default_agent_uid() -> u32 {
    1001
}
fn default_expire_seconds() -> u32 {
    3600
}
fn default_relay_base_url() -> String {
    DEFAULT_RELAY_BASE_URL.to_string()
}
fn default_llm_path() -> String {
    "/api/llm/chat".to_string()
}
fn default_join_timeout_secs() -> u64 {
    8
}
fn default_silence_trigger_secs() -> u64 {
    5
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_response_timeout_secs() -> u64 {
    60
}
fn default_sessions_file_name() -> String {
    "sessions.json".to_string()
}

fn serialize_secret<S: Serializer>(secret: &RedactedSecret, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose())
}

// ============================================
// DIRECTORIES
// ============================================

/// `<config_dir>/<app>`.
#[track_caller]
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(HUB_APP_NAME))
        .ok_or(ConfigError::DirectoryNotFound {
            location: ErrorLocation::from(Location::caller()),
        })
}

/// `<data_dir>/<app>`: session file and log file.
#[track_caller]
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join(HUB_APP_NAME))
        .ok_or(ConfigError::DirectoryNotFound {
            location: ErrorLocation::from(Location::caller()),
        })
}

// ============================================
// IMPLEMENTATION
// ============================================

impl HubConfig {
    /// Load config from {config_dir}/config.json.
    ///
    /// Returns defaults if the file is missing, an error if it exists but is
    /// unreadable or invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: HubConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Overlay `HUB_*` environment variables, including any loaded from `.env`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`; unparseable values are logged and skipped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(app_id) = lookup(ENV_APP_ID) {
            self.rtc.app_id = app_id;
        }
        if let Some(certificate) = lookup(ENV_APP_CERTIFICATE) {
            self.rtc.app_certificate = RedactedSecret::new(certificate);
        }
        if let Some(url) = lookup(ENV_RELAY_URL) {
            self.relay.base_url = url.clone();
            self.agent.base_url = url;
        }
        if let Some(port) = lookup(ENV_PORT) {
            match port.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => warn!("Ignoring {}={}: {}", ENV_PORT, port, e),
            }
        }
    }

    /// Save config to {config_dir}/config.json via temp file + rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// An empty app id / certificate is allowed: token requests then answer
    /// with the empty token.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "server.port cannot be 0".to_string(),
            });
        }

        for (name, url) in [
            ("relay.base_url", &self.relay.base_url),
            ("agent.base_url", &self.agent.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: format!("Invalid URL format for {}: {}", name, url),
                });
            }
        }

        if self.voice.join_timeout_secs == 0
            || self.voice.silence_trigger_secs == 0
            || self.voice.tick_interval_ms == 0
            || self.voice.response_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "voice timeouts must be non-zero".to_string(),
            });
        }

        if self.sessions.file_name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "sessions.file_name cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}
