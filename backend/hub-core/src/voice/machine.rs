//! Voice session state machine.
//!
//! Pure: every input returns the effects the coordinator must perform.
//! Completions of async effects carry the `cycle` they were issued for; a
//! completion from an older cycle is ignored, so a late HTTP reply never
//! acts on a session that has since been cleaned up.

use models::ClientId;

use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceMode {
    #[default]
    Off,
    Ptt,
    HandsFree,
}

/// A transition requested before its guard held, applied once it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingTransition {
    /// `stop_ptt` arrived before the agent was ready.
    StopPtt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceInput {
    StartPtt { target: Option<ClientId> },
    StopPtt,
    StartHandsFree { target: Option<ClientId> },
    StopHandsFree,
    SpeechActivity { at: Instant },
    Tick { at: Instant },
    ChannelJoined { cycle: u64 },
    ChannelJoinFailed { cycle: u64, reason: String },
    RelaySessionCreated { cycle: u64, session_id: String },
    RelaySessionFailed { cycle: u64, reason: String },
    AgentReady { cycle: u64, agent_id: String },
    AgentFailed { cycle: u64, reason: String },
    TriggerCompleted { cycle: u64, accumulated_text: String },
    TriggerFailed { cycle: u64, reason: String },
    VoiceResponse { session_id: String, success: bool, message: String },
    ResponseTimedOut { cycle: u64, session_id: String },
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEffect {
    JoinChannel { cycle: u64 },
    CreateRelaySession { cycle: u64, target: ClientId },
    SetMicMuted(bool),
    StartAgent { cycle: u64, session_id: String },
    StopAgent { agent_id: String },
    TriggerRelay { cycle: u64, session_id: String },
    DeleteRelaySession { session_id: String },
    SendVoiceRequest { target: ClientId, session_id: String, accumulated_text: String },
    ArmResponseTimeout { cycle: u64, session_id: String },
    StartTicker,
    StopTicker,
    Status(String),
}

#[derive(Debug, Clone)]
pub struct VoiceMachine {
    mode: VoiceMode,
    active_session_id: Option<String>,
    target_client_id: Option<ClientId>,
    is_waiting_for_response: bool,
    is_agent_ready: bool,
    agent_id: Option<String>,
    pending: Option<PendingTransition>,
    last_speech_at: Option<Instant>,
    speech_since_trigger: bool,
    silence_trigger: Duration,
    cycle: u64,
}

impl VoiceMachine {
    pub fn new(silence_trigger: Duration) -> Self {
        Self {
            mode: VoiceMode::Off,
            active_session_id: None,
            target_client_id: None,
            is_waiting_for_response: false,
            is_agent_ready: false,
            agent_id: None,
            pending: None,
            last_speech_at: None,
            speech_since_trigger: false,
            silence_trigger,
            cycle: 0,
        }
    }

    pub fn mode(&self) -> VoiceMode {
        self.mode
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    pub fn target_client_id(&self) -> Option<&ClientId> {
        self.target_client_id.as_ref()
    }

    pub fn is_waiting_for_response(&self) -> bool {
        self.is_waiting_for_response
    }

    pub fn is_agent_ready(&self) -> bool {
        self.is_agent_ready
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        self.pending
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn handle(&mut self, input: VoiceInput) -> Vec<VoiceEffect> {
        match input {
            VoiceInput::StartPtt { target } => self.start(VoiceMode::Ptt, target),
            VoiceInput::StartHandsFree { target } => self.start(VoiceMode::HandsFree, target),
            VoiceInput::StopPtt => self.stop_ptt(),
            VoiceInput::StopHandsFree => {
                if self.mode != VoiceMode::HandsFree {
                    return Vec::new();
                }
                self.cleanup()
            }
            VoiceInput::SpeechActivity { at } => {
                if self.mode == VoiceMode::HandsFree {
                    self.last_speech_at = Some(at);
                    self.speech_since_trigger = true;
                }
                Vec::new()
            }
            VoiceInput::Tick { at } => self.tick(at),
            VoiceInput::ChannelJoined { cycle } if self.is_current(cycle) => {
                match self.target_client_id.clone() {
                    Some(target) => vec![VoiceEffect::CreateRelaySession { cycle, target }],
                    None => self.abort("No instance to send voice to"),
                }
            }
            VoiceInput::ChannelJoinFailed { cycle, reason } if self.is_current(cycle) => {
                warn!("Voice channel join failed: {}", reason);
                self.abort(&reason)
            }
            VoiceInput::RelaySessionCreated { cycle, session_id } if self.is_current(cycle) => {
                self.on_relay_session(cycle, session_id)
            }
            VoiceInput::RelaySessionFailed { cycle, reason } if self.is_current(cycle) => {
                warn!("Relay session create failed: {}", reason);
                self.abort("Voice relay unavailable")
            }
            VoiceInput::AgentReady { cycle, agent_id } if self.is_current(cycle) => {
                self.on_agent_ready(agent_id)
            }
            VoiceInput::AgentFailed { cycle, reason } if self.is_current(cycle) => {
                warn!("Speech agent failed: {}", reason);
                self.abort("Speech agent unavailable")
            }
            VoiceInput::TriggerCompleted {
                cycle,
                accumulated_text,
            } if self.is_current(cycle) => self.on_triggered(cycle, accumulated_text),
            VoiceInput::TriggerFailed { cycle, reason } if self.is_current(cycle) => {
                warn!("Relay trigger failed: {}", reason);
                self.abort("Voice relay unavailable")
            }
            VoiceInput::VoiceResponse {
                session_id,
                success,
                message,
            } => self.on_voice_response(session_id, success, message),
            VoiceInput::ResponseTimedOut { cycle, session_id } if self.is_current(cycle) => {
                if !self.is_waiting_for_response
                    || self.active_session_id.as_deref() != Some(session_id.as_str())
                {
                    return Vec::new();
                }
                warn!("No voice response for session {}", session_id);
                let mut effects = vec![VoiceEffect::Status(String::from(
                    "No response from instance",
                ))];
                effects.extend(self.finish_exchange());
                effects
            }
            VoiceInput::Cleanup => {
                if self.mode == VoiceMode::Off && self.active_session_id.is_none() {
                    return Vec::new();
                }
                self.cleanup()
            }
            stale => {
                debug!("Ignoring stale voice input {:?}", stale);
                Vec::new()
            }
        }
    }

    fn is_current(&self, cycle: u64) -> bool {
        self.mode != VoiceMode::Off && cycle == self.cycle
    }

    fn start(&mut self, mode: VoiceMode, target: Option<ClientId>) -> Vec<VoiceEffect> {
        if self.mode != VoiceMode::Off {
            debug!("Voice start ignored in {:?}", self.mode);
            return Vec::new();
        }

        self.cycle += 1;
        self.mode = mode;
        self.target_client_id = target;
        self.is_agent_ready = false;
        self.is_waiting_for_response = false;
        self.pending = None;
        self.last_speech_at = None;
        self.speech_since_trigger = false;
        info!("Voice {:?} started (cycle {})", mode, self.cycle);

        let mut effects = vec![
            VoiceEffect::Status(String::from("Connecting voice…")),
            VoiceEffect::JoinChannel { cycle: self.cycle },
        ];
        if mode == VoiceMode::HandsFree {
            effects.push(VoiceEffect::StartTicker);
        }
        effects
    }

    fn stop_ptt(&mut self) -> Vec<VoiceEffect> {
        if self.mode != VoiceMode::Ptt {
            return Vec::new();
        }
        if !self.is_agent_ready {
            debug!("Deferring PTT stop until agent is ready");
            self.pending = Some(PendingTransition::StopPtt);
            return Vec::new();
        }
        if self.is_waiting_for_response {
            return Vec::new();
        }
        self.trigger(true)
    }

    fn on_relay_session(&mut self, cycle: u64, session_id: String) -> Vec<VoiceEffect> {
        self.active_session_id = Some(session_id.clone());
        let status = match self.mode {
            VoiceMode::HandsFree => "Listening (hands-free)…",
            _ => "Listening…",
        };
        vec![
            VoiceEffect::SetMicMuted(false),
            VoiceEffect::StartAgent { cycle, session_id },
            VoiceEffect::Status(String::from(status)),
        ]
    }

    fn on_agent_ready(&mut self, agent_id: String) -> Vec<VoiceEffect> {
        self.is_agent_ready = true;
        self.agent_id = Some(agent_id);

        match self.pending.take() {
            Some(PendingTransition::StopPtt) if self.mode == VoiceMode::Ptt => self.trigger(true),
            _ => Vec::new(),
        }
    }

    fn tick(&mut self, now: Instant) -> Vec<VoiceEffect> {
        if self.mode != VoiceMode::HandsFree
            || !self.is_agent_ready
            || self.is_waiting_for_response
            || !self.speech_since_trigger
        {
            return Vec::new();
        }
        let Some(last_speech) = self.last_speech_at else {
            return Vec::new();
        };
        if now.saturating_duration_since(last_speech) < self.silence_trigger {
            return Vec::new();
        }
        self.speech_since_trigger = false;
        self.trigger(false)
    }

    fn trigger(&mut self, mute: bool) -> Vec<VoiceEffect> {
        let Some(session_id) = self.active_session_id.clone() else {
            return self.abort("Voice session missing");
        };
        self.is_waiting_for_response = true;

        let mut effects = Vec::new();
        if mute {
            effects.push(VoiceEffect::SetMicMuted(true));
        }
        effects.push(VoiceEffect::TriggerRelay {
            cycle: self.cycle,
            session_id,
        });
        effects
    }

    fn on_triggered(&mut self, cycle: u64, accumulated_text: String) -> Vec<VoiceEffect> {
        let text = accumulated_text.trim();
        let (Some(session_id), Some(target)) =
            (self.active_session_id.clone(), self.target_client_id.clone())
        else {
            return self.abort("Voice session missing");
        };

        if text.is_empty() {
            debug!("Nothing recognised in session {}", session_id);
            return self.finish_exchange();
        }

        vec![
            VoiceEffect::SendVoiceRequest {
                target,
                session_id: session_id.clone(),
                accumulated_text: text.to_string(),
            },
            VoiceEffect::ArmResponseTimeout { cycle, session_id },
            VoiceEffect::Status(String::from("Sent to instance")),
        ]
    }

    fn on_voice_response(
        &mut self,
        session_id: String,
        success: bool,
        message: String,
    ) -> Vec<VoiceEffect> {
        if self.mode == VoiceMode::Off {
            debug!("Voice response for {} while off", session_id);
            return Vec::new();
        }
        if !self.is_waiting_for_response
            || self.active_session_id.as_deref() != Some(session_id.as_str())
        {
            warn!(
                "Ignoring voice response for {} (active {:?}, waiting {})",
                session_id, self.active_session_id, self.is_waiting_for_response
            );
            return Vec::new();
        }

        let mut effects = Vec::new();
        if !success {
            effects.push(VoiceEffect::Status(format!("Instance failed: {message}")));
        }
        effects.extend(self.finish_exchange());
        effects
    }

    /// End of one trigger/response exchange: PTT cleans up, hands-free
    /// recycles into a fresh relay session.
    fn finish_exchange(&mut self) -> Vec<VoiceEffect> {
        self.is_waiting_for_response = false;
        match self.mode {
            VoiceMode::Ptt => self.cleanup(),
            VoiceMode::HandsFree => self.recycle(),
            VoiceMode::Off => Vec::new(),
        }
    }

    fn recycle(&mut self) -> Vec<VoiceEffect> {
        let mut effects = Vec::new();
        if let Some(session_id) = self.active_session_id.take() {
            effects.push(VoiceEffect::DeleteRelaySession { session_id });
        }
        if let Some(agent_id) = self.agent_id.take() {
            effects.push(VoiceEffect::StopAgent { agent_id });
        }
        self.is_agent_ready = false;
        self.speech_since_trigger = false;

        match self.target_client_id.clone() {
            Some(target) => {
                effects.push(VoiceEffect::CreateRelaySession {
                    cycle: self.cycle,
                    target,
                });
                effects
            }
            None => {
                effects.extend(self.cleanup());
                effects
            }
        }
    }

    fn abort(&mut self, status: &str) -> Vec<VoiceEffect> {
        let mut effects = vec![VoiceEffect::Status(status.to_string())];
        effects.extend(self.cleanup());
        effects
    }

    /// Cancel the ticker, release the relay session and agent, reset, `Off`.
    pub fn cleanup(&mut self) -> Vec<VoiceEffect> {
        let mut effects = vec![VoiceEffect::StopTicker, VoiceEffect::SetMicMuted(true)];
        if let Some(session_id) = self.active_session_id.take() {
            effects.push(VoiceEffect::DeleteRelaySession { session_id });
        }
        if let Some(agent_id) = self.agent_id.take() {
            effects.push(VoiceEffect::StopAgent { agent_id });
        }

        if self.mode != VoiceMode::Off {
            info!("Voice {:?} ended (cycle {})", self.mode, self.cycle);
        }
        self.mode = VoiceMode::Off;
        self.target_client_id = None;
        self.is_waiting_for_response = false;
        self.is_agent_ready = false;
        self.pending = None;
        self.last_speech_at = None;
        self.speech_since_trigger = false;
        effects
    }
}
