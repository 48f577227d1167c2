//! Game session registry
//!
//! One [`RoundEngine`] per browser game, keyed by UUID. Sessions untouched
//! for longer than the configured TTL are evicted whenever a new session is
//! created.

use super::audio::ClockedPlayback;
use super::engine::{EngineError, GameSettings, RoundEngine};
use bmq_common::config::GameConfig;
use bmq_common::Catalog;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

pub type SessionEngine = RoundEngine<ClockedPlayback>;

struct Session {
    engine: SessionEngine,
    last_seen: Instant,
}

pub struct GameSessions {
    sessions: RwLock<HashMap<Uuid, Session>>,
    timing: GameConfig,
}

impl GameSessions {
    pub fn new(timing: GameConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timing,
        }
    }

    /// Create a session and start its first round
    pub async fn create(
        &self,
        settings: GameSettings,
        catalog: &Catalog,
    ) -> Result<(Uuid, SessionEngine), EngineError> {
        self.evict_expired().await;

        let engine = RoundEngine::new(ClockedPlayback::new(), self.timing.clone());
        engine.start_game(settings, catalog).await?;

        let id = Uuid::new_v4();
        self.sessions.write().await.insert(
            id,
            Session {
                engine: engine.clone(),
                last_seen: Instant::now(),
            },
        );
        info!("Created game session {}", id);
        Ok((id, engine))
    }

    /// Look up a session and mark it as active
    pub async fn get(&self, id: &Uuid) -> Option<SessionEngine> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id)?;
        session.last_seen = Instant::now();
        Some(session.engine.clone())
    }

    /// Remove a session, stopping its timers
    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.engine.shutdown().await;
                info!("Removed game session {}", id);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for longer than the TTL; returns how many
    pub async fn evict_expired(&self) -> usize {
        let ttl = self.timing.session_ttl();
        let expired: Vec<Session> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, s)| s.last_seen.elapsed() > ttl)
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            session.engine.shutdown().await;
        }
        if !expired.is_empty() {
            debug!("Evicted {} idle game sessions", expired.len());
        }
        expired.len()
    }
}
