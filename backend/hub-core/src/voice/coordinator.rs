//! Voice coordinator actor.
//!
//! Owns a [`VoiceMachine`] and performs the effects it asks for: media
//! joins, relay and agent HTTP calls, timers. Async work runs in spawned
//! tasks whose completions come back through the command channel, so the
//! machine is only ever touched from this one task.

use super::machine::{PendingTransition, VoiceEffect, VoiceInput, VoiceMachine, VoiceMode};
use super::media::{JoinRequest, MediaEngine, MediaEvent};

use crate::config::HubConfig;
use crate::error::relay_client::RelayClientError;
use crate::error::voice::VoiceError;
use crate::ipc::{HubEvent, RouterHandle};
use crate::relay_client::{AgentClient, AgentJoinRequest, CreateShareLinkRequest, RelayClient, ShareLink};
use crate::token::{RtcRole, TokenService};

use common::ErrorLocation;

use models::protocol::payloads::VoiceRequestPayload;
use models::{ClientId, HubMessage};

use std::collections::VecDeque;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

const JOIN_TIMEOUT_STATUS: &str = "Voice channel join timed out";

#[derive(Debug, Clone)]
pub struct VoiceSettings {
    pub channel: String,
    pub hub_uid: u32,
    pub agent_uid: u32,
    pub llm_path: String,
    pub join_timeout: Duration,
    pub silence_trigger: Duration,
    pub tick_interval: Duration,
    pub response_timeout: Duration,
}

impl VoiceSettings {
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            channel: config.rtc.channel.clone(),
            hub_uid: config.rtc.hub_uid,
            agent_uid: config.agent.agent_uid,
            llm_path: config.agent.llm_path.clone(),
            join_timeout: config.voice.join_timeout(),
            silence_trigger: config.voice.silence_trigger(),
            tick_interval: config.voice.tick_interval(),
            response_timeout: config.voice.response_timeout(),
        }
    }
}

/// Collaborators the coordinator drives.
#[derive(Clone)]
pub struct VoiceDeps {
    pub router: RouterHandle,
    pub relay: RelayClient,
    pub agent: AgentClient,
    pub tokens: TokenService,
    pub media: Arc<dyn MediaEngine>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceSnapshot {
    pub mode: VoiceMode,
    pub active_session_id: Option<String>,
    pub target_client_id: Option<ClientId>,
    pub is_waiting_for_response: bool,
    pub is_agent_ready: bool,
    pub deferred_stop: bool,
    pub channel_joined: bool,
    pub share_links: usize,
}

#[derive(Debug)]
enum Command {
    StartPtt,
    StartHandsFree,
    Input(VoiceInput),
    Media(MediaEvent),
    JoinTimedOut { attempt: u64 },
    LeaveChannel,
    TrackShareLink(String),
    Shutdown { done: oneshot::Sender<()> },
}

#[derive(Clone)]
pub struct VoiceCoordinator {
    command_tx: mpsc::UnboundedSender<Command>,
    snapshot: Arc<RwLock<VoiceSnapshot>>,
    relay: RelayClient,
    tokens: TokenService,
    channel: String,
}

impl VoiceCoordinator {
    /// Spawn the actor. Must be called inside the runtime.
    pub fn spawn(settings: VoiceSettings, deps: VoiceDeps) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let snapshot = Arc::new(RwLock::new(VoiceSnapshot::default()));

        let handle = Self {
            command_tx: command_tx.clone(),
            snapshot: Arc::clone(&snapshot),
            relay: deps.relay.clone(),
            tokens: deps.tokens.clone(),
            channel: settings.channel.clone(),
        };

        let actor = CoordinatorActor {
            machine: VoiceMachine::new(settings.silence_trigger),
            settings,
            deps,
            command_tx,
            snapshot,
            channel_joined: false,
            join_attempt: 0,
            pending_join: None,
            ticker_enabled: false,
            share_links: Vec::new(),
            cleanup: JoinSet::new(),
        };
        tokio::spawn(actor.run(command_rx));
        info!("Voice coordinator spawned");

        handle
    }

    #[track_caller]
    fn send(&self, command: Command) -> Result<(), VoiceError> {
        self.command_tx.send(command).map_err(|e| VoiceError::Coordinator {
            message: format!("Voice coordinator stopped: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    pub fn start_ptt(&self) -> Result<(), VoiceError> {
        self.send(Command::StartPtt)
    }

    pub fn stop_ptt(&self) -> Result<(), VoiceError> {
        self.send(Command::Input(VoiceInput::StopPtt))
    }

    pub fn start_hands_free(&self) -> Result<(), VoiceError> {
        self.send(Command::StartHandsFree)
    }

    pub fn stop_hands_free(&self) -> Result<(), VoiceError> {
        self.send(Command::Input(VoiceInput::StopHandsFree))
    }

    pub fn notify_speech_activity(&self) -> Result<(), VoiceError> {
        self.send(Command::Input(VoiceInput::SpeechActivity { at: Instant::now() }))
    }

    pub fn handle_voice_response(
        &self,
        session_id: impl Into<String>,
        success: bool,
        message: impl Into<String>,
    ) -> Result<(), VoiceError> {
        self.send(Command::Input(VoiceInput::VoiceResponse {
            session_id: session_id.into(),
            success,
            message: message.into(),
        }))
    }

    pub fn cleanup(&self) -> Result<(), VoiceError> {
        self.send(Command::Input(VoiceInput::Cleanup))
    }

    /// Feed an engine callback.
    pub fn media_event(&self, event: MediaEvent) -> Result<(), VoiceError> {
        self.send(Command::Media(event))
    }

    /// Leave the media channel: revoke share links, drop any in-flight join,
    /// end the current voice session.
    pub fn leave_channel(&self) -> Result<(), VoiceError> {
        self.send(Command::LeaveChannel)
    }

    /// Leave the channel, then wait up to `timeout` for the relay delete,
    /// agent leave and share-link revokes to finish. The coordinator stops
    /// afterwards.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), VoiceError> {
        let (done, rx) = oneshot::channel();
        self.send(Command::Shutdown { done })?;

        let message = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(_)) => String::from("Voice coordinator stopped before cleanup finished"),
            Err(_) => format!("Voice cleanup did not finish within {:?}", timeout),
        };
        Err(VoiceError::Coordinator {
            message,
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Create a relay share link for the voice channel. Revoked on leave.
    pub async fn create_share_link(&self, host_uid: u32) -> Result<ShareLink, RelayClientError> {
        let request = CreateShareLinkRequest {
            app_id: self.tokens.app_id().to_string(),
            channel: self.channel.clone(),
            token: self.tokens.rtc_token(&self.channel, 0, RtcRole::Publisher),
            host_uid,
        };
        let link = self.relay.create_share_link(&request).await?;
        if self.send(Command::TrackShareLink(link.id.clone())).is_err() {
            warn!("Share link {} created after coordinator stopped", link.id);
        }
        Ok(link)
    }

    pub async fn snapshot(&self) -> VoiceSnapshot {
        self.snapshot.read().await.clone()
    }
}

struct CoordinatorActor {
    machine: VoiceMachine,
    settings: VoiceSettings,
    deps: VoiceDeps,
    command_tx: mpsc::UnboundedSender<Command>,
    snapshot: Arc<RwLock<VoiceSnapshot>>,
    channel_joined: bool,
    /// Bumped on every join request and on leave; stale timeouts compare it.
    join_attempt: u64,
    /// `(attempt, cycle)` of a join waiting for its callback.
    pending_join: Option<(u64, u64)>,
    ticker_enabled: bool,
    share_links: Vec<String>,
    /// Best-effort release calls still in flight.
    cleanup: JoinSet<()>,
}

impl CoordinatorActor {
    async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<Command>) {
        let mut ticker = tokio::time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut events = self.deps.router.subscribe();
        let mut events_open = true;

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    let Some(command) = command else { break };
                    if let Command::Shutdown { done } = command {
                        self.leave_channel().await;
                        while self.cleanup.join_next().await.is_some() {}
                        self.publish_snapshot().await;
                        let _ = done.send(());
                        info!("Voice coordinator shut down");
                        return;
                    }
                    let ticker_was_enabled = self.ticker_enabled;
                    self.handle_command(command).await;
                    if self.ticker_enabled && !ticker_was_enabled {
                        ticker.reset();
                    }
                }
                _ = ticker.tick(), if self.ticker_enabled => {
                    self.process(VoiceInput::Tick { at: Instant::now() }).await;
                }
                event = events.recv(), if events_open => match event {
                    Ok(HubEvent::VoiceResponse(response)) => {
                        self.process(VoiceInput::VoiceResponse {
                            session_id: response.session_id,
                            success: response.success,
                            message: response.message,
                        })
                        .await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Voice coordinator missed {} hub events", skipped);
                    }
                    Err(RecvError::Closed) => events_open = false,
                },
            }
            self.publish_snapshot().await;
        }

        self.cleanup.detach_all();
        info!("Voice coordinator stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartPtt => {
                let target = self.deps.router.route_to_focused_atem().await;
                self.process(VoiceInput::StartPtt { target }).await;
            }
            Command::StartHandsFree => {
                let target = self.deps.router.route_to_focused_atem().await;
                self.process(VoiceInput::StartHandsFree { target }).await;
            }
            Command::Input(input) => self.process(input).await,
            Command::Media(event) => self.on_media_event(event).await,
            Command::JoinTimedOut { attempt } => {
                if let Some((pending_attempt, cycle)) = self.pending_join {
                    if pending_attempt == attempt {
                        self.pending_join = None;
                        self.process(VoiceInput::ChannelJoinFailed {
                            cycle,
                            reason: JOIN_TIMEOUT_STATUS.to_string(),
                        })
                        .await;
                    }
                }
            }
            Command::LeaveChannel => self.leave_channel().await,
            Command::TrackShareLink(id) => self.share_links.push(id),
            Command::Shutdown { .. } => {}
        }
    }

    async fn on_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::JoinSuccess { channel, uid } => {
                info!("Joined media channel {} as {}", channel, uid);
                self.channel_joined = true;
                if let Some((_, cycle)) = self.pending_join.take() {
                    self.process(VoiceInput::ChannelJoined { cycle }).await;
                }
            }
            MediaEvent::Leave => {
                self.channel_joined = false;
            }
            MediaEvent::Error { code, message } => {
                warn!("Media engine error {}: {}", code, message);
                if let Some((_, cycle)) = self.pending_join.take() {
                    self.process(VoiceInput::ChannelJoinFailed {
                        cycle,
                        reason: format!("Voice channel error: {message}"),
                    })
                    .await;
                }
            }
            MediaEvent::UserJoined { uid } => debug!("Media user {} joined", uid),
            MediaEvent::UserLeft { uid } => debug!("Media user {} left", uid),
            MediaEvent::AudioFrame { voice_active } => {
                if voice_active {
                    self.process(VoiceInput::SpeechActivity { at: Instant::now() })
                        .await;
                }
            }
        }
    }

    async fn leave_channel(&mut self) {
        self.join_attempt += 1;
        self.pending_join = None;
        if self.channel_joined {
            self.deps.media.leave_channel();
            self.channel_joined = false;
        }

        let share_links: Vec<String> = self.share_links.drain(..).collect();
        for id in share_links {
            let relay = self.deps.relay.clone();
            self.spawn_cleanup(async move {
                if let Err(e) = relay.revoke_share_link(&id).await {
                    warn!("Failed to revoke share link {}: {}", id, e);
                }
            });
        }

        self.process(VoiceInput::Cleanup).await;
    }

    /// Run `input` and every input its effects produce synchronously.
    async fn process(&mut self, input: VoiceInput) {
        let mut queue = VecDeque::from([input]);
        while let Some(input) = queue.pop_front() {
            for effect in self.machine.handle(input) {
                if let Some(next) = self.execute(effect).await {
                    queue.push_back(next);
                }
            }
        }
    }

    async fn execute(&mut self, effect: VoiceEffect) -> Option<VoiceInput> {
        match effect {
            VoiceEffect::JoinChannel { cycle } => return self.join_channel(cycle),
            VoiceEffect::CreateRelaySession { cycle, target } => {
                let relay = self.deps.relay.clone();
                let channel = self.settings.channel.clone();
                let tx = self.command_tx.clone();
                tokio::spawn(async move {
                    let input = match relay.create_voice_session(target.as_str(), &channel).await {
                        Ok(session) => VoiceInput::RelaySessionCreated {
                            cycle,
                            session_id: session.session_id,
                        },
                        Err(e) => VoiceInput::RelaySessionFailed {
                            cycle,
                            reason: e.to_string(),
                        },
                    };
                    let _ = tx.send(Command::Input(input));
                });
            }
            VoiceEffect::SetMicMuted(muted) => self.deps.media.set_mic_muted(muted),
            VoiceEffect::StartAgent { cycle, session_id } => self.start_agent(cycle, session_id),
            VoiceEffect::StopAgent { agent_id } => {
                let agent = self.deps.agent.clone();
                self.spawn_cleanup(async move {
                    if let Err(e) = agent.leave(&agent_id).await {
                        warn!("Failed to stop agent {}: {}", agent_id, e);
                    }
                });
            }
            VoiceEffect::TriggerRelay { cycle, session_id } => {
                let relay = self.deps.relay.clone();
                let tx = self.command_tx.clone();
                tokio::spawn(async move {
                    let input = match relay.trigger_voice_session(&session_id).await {
                        Ok(result) => VoiceInput::TriggerCompleted {
                            cycle,
                            accumulated_text: result.accumulated_text,
                        },
                        Err(e) => VoiceInput::TriggerFailed {
                            cycle,
                            reason: e.to_string(),
                        },
                    };
                    let _ = tx.send(Command::Input(input));
                });
            }
            VoiceEffect::DeleteRelaySession { session_id } => {
                let relay = self.deps.relay.clone();
                self.spawn_cleanup(async move {
                    if let Err(e) = relay.delete_voice_session(&session_id).await {
                        warn!("Failed to delete relay session {}: {}", session_id, e);
                    }
                });
            }
            VoiceEffect::SendVoiceRequest {
                target,
                session_id,
                accumulated_text,
            } => {
                let request = HubMessage::VoiceRequest(VoiceRequestPayload {
                    session_id,
                    accumulated_text,
                    relay_url: self.deps.relay.base_url().to_string(),
                });
                if let Err(e) = self.deps.router.send(target, request).await {
                    warn!("Failed to route voice request: {}", e);
                }
            }
            VoiceEffect::ArmResponseTimeout { cycle, session_id } => {
                let tx = self.command_tx.clone();
                let timeout = self.settings.response_timeout;
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    let _ = tx.send(Command::Input(VoiceInput::ResponseTimedOut {
                        cycle,
                        session_id,
                    }));
                });
            }
            VoiceEffect::StartTicker => self.ticker_enabled = true,
            VoiceEffect::StopTicker => self.ticker_enabled = false,
            VoiceEffect::Status(status) => {
                info!("Voice status: {}", status);
                self.deps.router.publish(HubEvent::VoiceStatus(status));
            }
        }
        None
    }

    fn spawn_cleanup<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        while self.cleanup.try_join_next().is_some() {}
        self.cleanup.spawn(task);
    }

    /// Join unless already joined. Waits at most `join_timeout` for the
    /// engine's success callback.
    fn join_channel(&mut self, cycle: u64) -> Option<VoiceInput> {
        if self.channel_joined {
            return Some(VoiceInput::ChannelJoined { cycle });
        }

        let token = self.deps.tokens.rtc_token(
            &self.settings.channel,
            self.settings.hub_uid,
            RtcRole::Publisher,
        );
        match self
            .deps
            .media
            .join_channel(&self.settings.channel, self.settings.hub_uid, &token)
        {
            JoinRequest::Joined => {
                self.channel_joined = true;
                Some(VoiceInput::ChannelJoined { cycle })
            }
            JoinRequest::Pending => {
                self.join_attempt += 1;
                let attempt = self.join_attempt;
                self.pending_join = Some((attempt, cycle));

                let tx = self.command_tx.clone();
                let timeout = self.settings.join_timeout;
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    let _ = tx.send(Command::JoinTimedOut { attempt });
                });
                None
            }
            JoinRequest::Failed(reason) => Some(VoiceInput::ChannelJoinFailed { cycle, reason }),
        }
    }

    fn start_agent(&self, cycle: u64, session_id: String) {
        let llm_url = match self.deps.relay.llm_url(&self.settings.llm_path, &session_id) {
            Ok(url) => url,
            Err(e) => {
                let _ = self.command_tx.send(Command::Input(VoiceInput::AgentFailed {
                    cycle,
                    reason: e.to_string(),
                }));
                return;
            }
        };

        let request = AgentJoinRequest {
            channel: self.settings.channel.clone(),
            agent_uid: self.settings.agent_uid.to_string(),
            token: self.deps.tokens.rtc_token(
                &self.settings.channel,
                self.settings.agent_uid,
                RtcRole::Publisher,
            ),
            remote_uid: self.settings.hub_uid.to_string(),
            llm_url,
        };

        let agent = self.deps.agent.clone();
        let tx = self.command_tx.clone();
        tokio::spawn(async move {
            let input = match agent.join(&request).await {
                Ok(agent_id) => VoiceInput::AgentReady { cycle, agent_id },
                Err(e) => VoiceInput::AgentFailed {
                    cycle,
                    reason: e.to_string(),
                },
            };
            let _ = tx.send(Command::Input(input));
        });
    }

    async fn publish_snapshot(&self) {
        let mut write = self.snapshot.write().await;
        *write = VoiceSnapshot {
            mode: self.machine.mode(),
            active_session_id: self.machine.active_session_id().map(str::to_string),
            target_client_id: self.machine.target_client_id().cloned(),
            is_waiting_for_response: self.machine.is_waiting_for_response(),
            is_agent_ready: self.machine.is_agent_ready(),
            deferred_stop: self.machine.pending() == Some(PendingTransition::StopPtt),
            channel_joined: self.channel_joined,
            share_links: self.share_links.len(),
        };
    }
}
