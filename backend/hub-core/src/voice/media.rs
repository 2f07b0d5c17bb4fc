//! Seam to the real-time media engine.
//!
//! The engine itself (audio transport, mixing) lives outside this crate. It
//! is driven through [`MediaEngine`] and reports back through
//! [`MediaEvent`]s fed into the coordinator.

/// Outcome of asking the engine to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRequest {
    /// Already in the channel; no callback will follow.
    Joined,
    /// Join started; success arrives as [`MediaEvent::JoinSuccess`].
    Pending,
    Failed(String),
}

pub trait MediaEngine: Send + Sync {
    fn join_channel(&self, channel: &str, uid: u32, token: &str) -> JoinRequest;
    fn leave_channel(&self);
    fn set_mic_muted(&self, muted: bool);
}

/// Engine callbacks, translated into coordinator input.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    JoinSuccess { channel: String, uid: u32 },
    Leave,
    Error { code: i32, message: String },
    UserJoined { uid: u32 },
    UserLeft { uid: u32 },
    /// One captured audio frame; only voice activity matters here.
    AudioFrame { voice_active: bool },
}

/// Engine stand-in for headless runs: joins instantly, carries no audio.
#[derive(Debug, Default)]
pub struct NullMediaEngine;

impl MediaEngine for NullMediaEngine {
    fn join_channel(&self, _channel: &str, _uid: u32, _token: &str) -> JoinRequest {
        JoinRequest::Joined
    }

    fn leave_channel(&self) {}

    fn set_mic_muted(&self, _muted: bool) {}
}
