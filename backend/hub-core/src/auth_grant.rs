//! Short-lived, human-approved access requests.

use crate::secrets::{generate_session_token, short_id};
use crate::session_store::Clock;

use models::{AuthRequest, AuthSession};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Decides whether a request is allowed, typically by asking a human.
///
/// Implementations own their own timeout; a request nobody answers should
/// resolve to `false`.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn approve(&self, request: &AuthRequest) -> bool;
}

/// Approves or denies everything. Used headless and in tests.
pub struct StaticApprover(pub bool);

#[async_trait]
impl Approver for StaticApprover {
    async fn approve(&self, _request: &AuthRequest) -> bool {
        self.0
    }
}

#[derive(Clone)]
pub struct AuthGrantController {
    approver: Arc<dyn Approver>,
    sessions: Arc<RwLock<HashMap<String, AuthSession>>>,
    clock: Clock,
}

impl AuthGrantController {
    pub fn new(approver: Arc<dyn Approver>) -> Self {
        Self {
            approver,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Ask the approver and record the outcome under `request.session_id`.
    ///
    /// The record is visible as pending while the approver runs.
    pub async fn handle_auth_request(&self, request: AuthRequest) -> AuthSession {
        let pending = AuthSession::pending(&request, (self.clock)());
        self.sessions
            .write()
            .await
            .insert(request.session_id.clone(), pending.clone());

        info!(
            "Auth request {} from {} awaiting approval",
            short_id(&request.session_id),
            request.hostname
        );

        let granted = self.approver.approve(&request).await;

        let mut resolved = pending;
        resolved.granted = Some(granted);
        if granted {
            resolved.session_token = Some(generate_session_token());
            info!("Auth request {} granted", short_id(&request.session_id));
        } else {
            warn!("Auth request {} denied", short_id(&request.session_id));
        }

        self.sessions
            .write()
            .await
            .insert(request.session_id.clone(), resolved.clone());
        resolved
    }

    pub async fn get_session(&self, id: &str) -> Option<AuthSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Purge records older than five minutes, whatever their outcome.
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let now = (self.clock)();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        before - sessions.len()
    }

    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = controller.cleanup_expired_sessions().await;
                if purged > 0 {
                    info!("Purged {} expired auth sessions", purged);
                }
            }
        })
    }
}
