use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum VoiceError {
    #[error("Voice Coordinator Error: {message} {location}")]
    Coordinator {
        message: String,
        location: ErrorLocation,
    },
}
