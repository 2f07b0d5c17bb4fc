//! Wiring of the hub's long-lived parts, and their shutdown.

use crate::error::HubError;

use hub_core::auth_grant::{Approver, AuthGrantController};
use hub_core::config::HubConfig;
use hub_core::identity::HubIdentity;
use hub_core::ipc::{HubContext, HubEvent, HubServerHandle, RouterHandle, start_hub_server};
use hub_core::relay_client::{AgentClient, RelayClient};
use hub_core::session_store::SessionStore;
use hub_core::token::TokenService;
use hub_core::voice::{MediaEngine, VoiceCoordinator, VoiceDeps, VoiceSettings};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const GRANT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const VOICE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HubRuntime {
    server: HubServerHandle,
    context: HubContext,
    voice: VoiceCoordinator,
    background: Vec<JoinHandle<()>>,
}

impl HubRuntime {
    /// Open the session store under `data_dir`, start the server, router and
    /// voice coordinator, and schedule the sweepers.
    ///
    /// # Errors
    ///
    /// Fails if the session file is unreadable, a relay URL is invalid, or
    /// the listen address cannot be bound.
    pub async fn start(
        config: &HubConfig,
        data_dir: &Path,
        approver: Arc<dyn Approver>,
        media: Arc<dyn MediaEngine>,
    ) -> Result<Self, HubError> {
        let identity = HubIdentity::from_config(&config.server);

        let sessions = SessionStore::open(data_dir.join(&config.sessions.file_name))?;
        let expired = sessions.cleanup_expired().await;
        if expired > 0 {
            info!("Dropped {} expired sessions at startup", expired);
        }

        if config.rtc.app_certificate.is_empty() {
            warn!("No app certificate configured; token requests will get empty tokens");
        }
        let tokens = TokenService::from_config(&config.rtc);
        let grants = AuthGrantController::new(approver);
        let router = RouterHandle::new(tokens.clone(), grants.clone());

        let context = HubContext {
            identity,
            sessions: sessions.clone(),
            grants: grants.clone(),
            router: router.clone(),
        };
        let server = start_hub_server(&config.server, context.clone()).await?;

        let voice = VoiceCoordinator::spawn(
            VoiceSettings::from_config(config),
            VoiceDeps {
                router: router.clone(),
                relay: RelayClient::new(&config.relay.base_url)?,
                agent: AgentClient::new(&config.agent.base_url)?,
                tokens,
                media,
            },
        );

        let background = vec![
            sessions.spawn_sweeper(SESSION_SWEEP_INTERVAL),
            grants.spawn_sweeper(GRANT_SWEEP_INTERVAL),
            spawn_event_log(router.subscribe()),
        ];

        Ok(Self {
            server,
            context,
            voice,
            background,
        })
    }

    pub fn port(&self) -> u16 {
        self.server.port()
    }

    pub fn context(&self) -> &HubContext {
        &self.context
    }

    pub fn voice(&self) -> &VoiceCoordinator {
        &self.voice
    }

    /// Leave voice and wait for its relay and agent cleanup, then stop the
    /// sweepers and stop accepting connections.
    pub async fn shutdown(self) {
        if let Err(e) = self.voice.shutdown(VOICE_SHUTDOWN_TIMEOUT).await {
            warn!("Voice shutdown: {}", e);
        }
        for task in self.background {
            task.abort();
        }
        self.server.shutdown();
        info!("Hub stopped");
    }
}

fn spawn_event_log(mut events: Receiver<HubEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!("Event log skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &HubEvent) {
    match event {
        HubEvent::InstancesChanged(clients) => info!("{} instances connected", clients.len()),
        HubEvent::FocusChanged(Some(id)) => info!("Focus: {}", id),
        HubEvent::FocusChanged(None) => info!("Focus cleared"),
        HubEvent::ProjectList {
            client_id,
            projects,
        } => info!("{} has {} projects", client_id, projects.len()),
        HubEvent::AgentList { client_id, agents } => {
            info!("{} has {} agents", client_id, agents.len())
        }
        HubEvent::UserCommand { client_id, command } => {
            info!("{} ran: {}", client_id, command.command)
        }
        HubEvent::UserStatus { client_id, status } => debug!("{} status: {}", client_id, status),
        HubEvent::MarkTaskUpdated(task) => {
            info!("Task {} is {:?}", task.task_id, task.status)
        }
        HubEvent::VoiceResponse(response) => debug!(
            "Voice response for {}: success={}",
            response.session_id, response.success
        ),
        HubEvent::VoiceStatus(status) => info!("Voice: {}", status),
    }
}
