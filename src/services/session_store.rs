// src/services/session_store.rs
use std::collections::HashMap;

use chrono::{Duration, Utc};
use log::debug;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::ThumbError;
use crate::models::*;

/// Idle sessions are dropped after a day.
const SESSION_TTL_HOURS: i64 = 24;

/// In-memory sessions. Values are replaced wholesale on every change.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(SESSION_TTL_HOURS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn create(&self) -> Session {
        let session = Session::new();
        let mut sessions = self.sessions.write().await;
        self.purge_expired(&mut sessions);
        sessions.insert(session.id, session.clone());
        session
    }

    pub async fn get(&self, id: &Uuid) -> Result<Session, ThumbError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ThumbError::NotFound(format!("session {}", id)))
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions.values().map(SessionSummary::from).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    pub async fn update_config(&self, id: &Uuid, event: ConfigEvent) -> Result<GenerationConfig, ThumbError> {
        self.replace(id, |session| Session {
            config: session.config.apply(event),
            ..session
        })
        .await
        .map(|session| session.config)
    }

    pub async fn update_state<F>(&self, id: &Uuid, f: F) -> Result<GenerationState, ThumbError>
    where
        F: FnOnce(GenerationState) -> GenerationState,
    {
        self.replace(id, |session| Session {
            state: f(session.state),
            ..session
        })
        .await
        .map(|session| session.state)
    }

    /// Marks the session as analyzing and hands back the config to generate
    /// from. `check` sees the config under the write lock and yields the
    /// first log line; its error is recorded on the state and returned.
    /// Fails with `Busy` while another attempt is running.
    pub async fn begin_generation<F>(&self, id: &Uuid, check: F) -> Result<GenerationConfig, ThumbError>
    where
        F: FnOnce(&GenerationConfig) -> Result<String, ThumbError>,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .remove(id)
            .ok_or_else(|| ThumbError::NotFound(format!("session {}", id)))?;

        if session.state.is_busy() {
            sessions.insert(*id, session);
            return Err(ThumbError::Busy);
        }

        match check(&session.config) {
            Ok(first_log) => {
                let config = session.config.clone();
                sessions.insert(
                    *id,
                    Session {
                        state: GenerationState::started().with_log(first_log),
                        updated_at: Utc::now(),
                        ..session
                    },
                );
                Ok(config)
            }
            Err(err) => {
                let message = err.to_string();
                sessions.insert(
                    *id,
                    Session {
                        state: session.state.with_error(message),
                        updated_at: Utc::now(),
                        ..session
                    },
                );
                Err(err)
            }
        }
    }

    /// Non-blocking state update for contexts that cannot await. Returns
    /// false when the lock is held elsewhere.
    pub fn try_update_state<F>(&self, id: &Uuid, f: F) -> bool
    where
        F: FnOnce(GenerationState) -> GenerationState,
    {
        let Ok(mut sessions) = self.sessions.try_write() else {
            return false;
        };
        if let Some(session) = sessions.remove(id) {
            sessions.insert(
                *id,
                Session {
                    state: f(session.state),
                    updated_at: Utc::now(),
                    ..session
                },
            );
        }
        true
    }

    async fn replace<F>(&self, id: &Uuid, f: F) -> Result<Session, ThumbError>
    where
        F: FnOnce(Session) -> Session,
    {
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .remove(id)
            .ok_or_else(|| ThumbError::NotFound(format!("session {}", id)))?;

        let next = Session {
            updated_at: Utc::now(),
            ..f(current)
        };
        sessions.insert(*id, next.clone());
        Ok(next)
    }

    fn purge_expired(&self, sessions: &mut HashMap<Uuid, Session>) {
        let cutoff = Utc::now() - self.ttl;
        let before = sessions.len();
        sessions.retain(|_, s| s.updated_at > cutoff);
        let dropped = before - sessions.len();
        if dropped > 0 {
            debug!("Dropped {} idle sessions", dropped);
        }
    }
}
