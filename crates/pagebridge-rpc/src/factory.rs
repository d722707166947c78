// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session factory: the explicit map from session id to live session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use pagebridge_core::config::BridgeConfig;
use pagebridge_core::error::Result;
use pagebridge_core::types::{SessionId, SessionState};
use pagebridge_engine::Engine;
use serde::Serialize;
use tracing::{info, instrument};

use crate::session::BridgeSession;

/// Snapshot of one session for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub pending_calls: usize,
    pub exposed: Vec<String>,
}

/// Creates sessions and keeps the live ones addressable by id.
#[derive(Debug, Default)]
pub struct SessionFactory {
    config: BridgeConfig,
    sessions: Mutex<HashMap<SessionId, BridgeSession>>,
}

impl SessionFactory {
    /// Sessions created by [`SessionFactory::create`] use `config`.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn create(&self, engine: Arc<dyn Engine>) -> Result<BridgeSession> {
        self.create_with(engine, self.config.clone())
    }

    #[instrument(skip_all)]
    pub fn create_with(&self, engine: Arc<dyn Engine>, config: BridgeConfig) -> Result<BridgeSession> {
        let session = BridgeSession::builder(engine).config(config).build()?;
        self.sessions
            .lock()
            .expect("sessions lock poisoned")
            .insert(session.id(), session.clone());
        Ok(session)
    }

    /// Look up a live session.
    pub fn get(&self, id: SessionId) -> Option<BridgeSession> {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        prune(&mut sessions);
        sessions.get(&id).cloned()
    }

    /// Snapshot of every live session, oldest first.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        prune(&mut sessions);
        let mut infos: Vec<SessionInfo> = sessions
            .values()
            .map(|session| SessionInfo {
                id: session.id(),
                state: session.state(),
                created_at: session.created_at(),
                pending_calls: session.pending_calls(),
                exposed: session.exposed(),
            })
            .collect();
        infos.sort_by_key(|info| info.created_at);
        infos
    }

    /// Close and forget one session. Returns whether it was known.
    pub fn close(&self, id: SessionId) -> bool {
        let removed = self
            .sessions
            .lock()
            .expect("sessions lock poisoned")
            .remove(&id);
        match removed {
            Some(session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    /// Close every session; returns how many were open.
    pub fn close_all(&self) -> usize {
        let drained: Vec<BridgeSession> = self
            .sessions
            .lock()
            .expect("sessions lock poisoned")
            .drain()
            .map(|(_, session)| session)
            .collect();
        let count = drained.len();
        for session in drained {
            session.close();
        }
        info!(count, "all bridge sessions closed");
        count
    }

    pub fn len(&self) -> usize {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        prune(&mut sessions);
        sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drop sessions closed behind the factory's back.
fn prune(sessions: &mut HashMap<SessionId, BridgeSession>) {
    sessions.retain(|_, session| session.state() != SessionState::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagebridge_engine::HeadlessEngine;

    fn engine() -> Arc<HeadlessEngine> {
        Arc::new(HeadlessEngine::new().unwrap())
    }

    #[test]
    fn create_get_close() {
        let factory = SessionFactory::default();
        let session = factory.create(engine()).unwrap();
        let id = session.id();

        assert_eq!(factory.get(id).map(|s| s.id()), Some(id));
        assert!(factory.close(id));
        assert!(!factory.close(id));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(factory.get(id).is_none());
    }

    #[test]
    fn snapshot_lists_live_sessions() {
        let factory = SessionFactory::default();
        let a = factory.create(engine()).unwrap();
        let b = factory.create(engine()).unwrap();
        b.expose("ping", || "pong", false).unwrap();

        let infos = factory.sessions();
        assert_eq!(infos.len(), 2);
        let info_b = infos.iter().find(|i| i.id == b.id()).unwrap();
        assert_eq!(info_b.exposed, vec!["ping".to_string()]);
        assert_eq!(info_b.state, SessionState::Active);

        // Closed directly, not through the factory.
        a.close();
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn close_all_closes_everything() {
        let factory = SessionFactory::default();
        let sessions: Vec<_> = (0..3).map(|_| factory.create(engine()).unwrap()).collect();
        assert_eq!(factory.close_all(), 3);
        assert!(factory.is_empty());
        assert!(sessions.iter().all(|s| s.state() == SessionState::Closed));
    }

    #[test]
    fn invalid_config_is_not_registered() {
        let factory = SessionFactory::default();
        let config = BridgeConfig {
            namespace: "1bad".into(),
            ..BridgeConfig::default()
        };
        assert!(factory.create_with(engine(), config).is_err());
        assert!(factory.is_empty());
    }
}
