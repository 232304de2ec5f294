//! Per-session context registry
//!
//! Each session key owns one `ConversationContext` behind its own mutex.
//! A chat turn holds that mutex for its whole duration, so turns within a
//! session are serialized while different sessions proceed independently.
//!
//! The registry is capped. Opening a session beyond the cap evicts the
//! least recently active context that no turn is currently using.

use crate::memory::cache::{Clock, SystemClock};
use crate::memory::store::ConversationContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Default cap on live sessions
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

pub type SharedContext = Arc<Mutex<ConversationContext>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedContext>>,
    max_history: usize,
    max_sessions: usize,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self::with_clock(max_history, Arc::new(SystemClock))
    }

    pub fn with_clock(max_history: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history,
            max_sessions: DEFAULT_MAX_SESSIONS,
            clock,
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    /// Context for `session_id`, created on first use
    pub async fn get_or_create(&self, session_id: &str) -> SharedContext {
        {
            let sessions = self.sessions.read().await;
            if let Some(context) = sessions.get(session_id) {
                return context.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(session_id) && sessions.len() >= self.max_sessions {
            evict_idle(&mut sessions);
        }

        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!("Creating conversation context for session {}", session_id);
                Arc::new(Mutex::new(ConversationContext::with_clock(
                    self.max_history,
                    self.clock.clone(),
                )))
            })
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Drop the least recently active session not locked by a running turn
fn evict_idle(sessions: &mut HashMap<String, SharedContext>) {
    let oldest = sessions
        .iter()
        .filter_map(|(key, context)| {
            let last_active = context.try_lock().ok()?.last_active();
            Some((key.clone(), last_active))
        })
        .min_by_key(|(_, last_active)| *last_active)
        .map(|(key, _)| key);

    if let Some(key) = oldest {
        info!("Session limit reached, evicting idle session {}", key);
        sessions.remove(&key);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(5)
    }
}
