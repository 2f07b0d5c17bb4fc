//! Push-to-talk and hands-free voice sessions.
//!
//! [`machine`] is the pure state machine; [`coordinator`] runs it as an
//! actor against the relay, the speech agent and the media engine.

pub mod coordinator;
pub mod machine;
pub mod media;

pub use coordinator::{VoiceCoordinator, VoiceDeps, VoiceSettings, VoiceSnapshot};
pub use machine::{PendingTransition, VoiceEffect, VoiceInput, VoiceMachine, VoiceMode};
pub use media::{JoinRequest, MediaEngine, MediaEvent, NullMediaEngine};
