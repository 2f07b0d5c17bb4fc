use std::path::PathBuf;

use common::ErrorLocation;
use thiserror::Error;

/// Failures touching the session file.
///
/// Store operations log these and keep going; only [`open`] surfaces them.
///
/// [`open`]: crate::session_store::SessionStore::open
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Session File Read Error: {path}: {source} {location}")]
    Read {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session File Parse Error: {path}: {reason} {location}")]
    Parse {
        location: ErrorLocation,
        path: PathBuf,
        reason: String,
    },

    #[error("Session File Write Error: {path}: {source} {location}")]
    Write {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session Serialization Error: {reason} {location}")]
    Serialize {
        location: ErrorLocation,
        reason: String,
    },
}
