//! Long-lived pairing sessions backed by a JSON file.
//!
//! Reads (`validate`, `get`, `get_all_active`) share a read lock; every write
//! takes the write lock, mutates, and rewrites the whole table before
//! releasing it. A failed write is logged and the in-memory table stays
//! authoritative.

use crate::error::session_store::SessionStoreError;
use crate::secrets::{generate_session_id, generate_session_token, short_id};

use common::ErrorLocation;

use models::Session;

use std::collections::{BTreeMap, HashMap};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Source of "now". Swappable so expiry can be tested without waiting a week.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    path: Option<PathBuf>,
    clock: Clock,
}

impl SessionStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            path: None,
            clock: system_clock(),
        }
    }

    /// Load the table from `path`. A missing file is an empty table.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
        let path = path.into();
        let sessions = load_table(&path)?;
        info!(
            "Session store opened at {} ({} sessions)",
            path.display(),
            sessions.len()
        );
        Ok(Self {
            sessions: Arc::new(RwLock::new(sessions)),
            path: Some(path),
            clock: system_clock(),
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub async fn create(&self, hostname: &str) -> Session {
        let now = self.now();
        let session = Session {
            id: generate_session_id(),
            hostname: hostname.to_string(),
            token: generate_session_token(),
            created_at: now,
            last_activity: now,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        self.persist(&sessions);
        info!(
            "Created session {} for {}",
            short_id(&session.id),
            session.hostname
        );
        session
    }

    pub async fn validate(&self, id: &str) -> bool {
        let now = self.now();
        self.sessions
            .read()
            .await
            .get(id)
            .is_some_and(|session| session.is_valid_at(now))
    }

    /// Bump `last_activity`. No-op for unknown ids.
    pub async fn refresh(&self, id: &str) {
        let now = self.now();
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            debug!("Refresh for unknown session {}", short_id(id));
            return;
        };
        session.last_activity = now;
        self.persist(&sessions);
    }

    /// The session, only while valid.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let now = self.now();
        self.sessions
            .read()
            .await
            .get(id)
            .filter(|session| session.is_valid_at(now))
            .cloned()
    }

    pub async fn delete(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(id).is_some();
        if removed {
            self.persist(&sessions);
            info!("Deleted session {}", short_id(id));
        }
        removed
    }

    pub async fn get_all_active(&self) -> Vec<Session> {
        let now = self.now();
        let mut active: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|session| session.is_valid_at(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        active
    }

    /// Drop every session failing the validity predicate. Returns how many.
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.is_valid_at(now));
        let removed = before - sessions.len();
        if removed > 0 {
            self.persist(&sessions);
            info!("Removed {} expired sessions", removed);
        }
        removed
    }

    /// Run [`cleanup_expired`](Self::cleanup_expired) every `interval`.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.cleanup_expired().await;
            }
        })
    }

    /// Called with the write lock held.
    fn persist(&self, sessions: &HashMap<String, Session>) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_table(path, sessions) {
            error!("Failed to persist sessions (keeping in-memory state): {}", e);
        }
    }
}

fn load_table(path: &Path) -> Result<HashMap<String, Session>, SessionStoreError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| SessionStoreError::Read {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        source: e,
    })?;

    if contents.trim().is_empty() {
        warn!("Session file {} is empty", path.display());
        return Ok(HashMap::new());
    }

    serde_json::from_str(&contents).map_err(|e| SessionStoreError::Parse {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_table(path: &Path, sessions: &HashMap<String, Session>) -> Result<(), SessionStoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SessionStoreError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let ordered: BTreeMap<&String, &Session> = sessions.iter().collect();
    let json =
        serde_json::to_string_pretty(&ordered).map_err(|e| SessionStoreError::Serialize {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, json).map_err(|e| SessionStoreError::Write {
        location: ErrorLocation::from(Location::caller()),
        path: temp_path.clone(),
        source: e,
    })?;

    std::fs::rename(&temp_path, path).map_err(|e| SessionStoreError::Write {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        source: e,
    })
}
