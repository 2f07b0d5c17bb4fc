//! Pairing credentials.
//!
//! Two lifetimes coexist: a [`Session`] is the long-lived (7 day, sliding)
//! credential a paired instance reconnects with; an [`AuthSession`] is the
//! 5 minute record of one approval request.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Inactivity window after which a pairing session stops validating.
pub const SESSION_TTL: TimeDelta = TimeDelta::days(7);

/// Age after which an approval record is purged, whatever its outcome.
pub const AUTH_SESSION_TTL: TimeDelta = TimeDelta::minutes(5);

/// A persisted pairing session.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub hostname: String,
    /// 64 lowercase hex characters.
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// `valid <=> now - last_activity < 7 days`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_activity) < SESSION_TTL
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("hostname", &self.hostname)
            .field("token", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("last_activity", &self.last_activity)
            .finish()
    }
}

/// An inbound request for access that a human must approve.
///
/// Also the payload of the `auth_request` wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRequest {
    pub session_id: String,
    pub hostname: String,
    pub otp: String,
}

/// Outcome record of one [`AuthRequest`].
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub session_id: String,
    pub hostname: String,
    pub otp: String,
    pub timestamp: DateTime<Utc>,
    /// `None` while the approval is pending.
    pub granted: Option<bool>,
    /// Set only when granted.
    pub session_token: Option<String>,
}

impl AuthSession {
    pub fn pending(request: &AuthRequest, at: DateTime<Utc>) -> Self {
        Self {
            session_id: request.session_id.clone(),
            hostname: request.hostname.clone(),
            otp: request.otp.clone(),
            timestamp: at,
            granted: None,
            session_token: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.timestamp) >= AUTH_SESSION_TTL
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("session_id", &self.session_id)
            .field("hostname", &self.hostname)
            .field("timestamp", &self.timestamp)
            .field("granted", &self.granted)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}
