use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{DomainError, Exchange, Session};

/// In-memory conversation store, bounded to the last `max_history`
/// exchanges per session. Nothing is persisted.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    max_history: usize,
}

impl SessionManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history,
        }
    }

    pub fn create_session(&self) -> String {
        let id = format!("session_{}", Uuid::new_v4().simple());
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Session::new(&id));
        debug!(session_id = %id, "session created");
        id
    }

    /// Records an exchange, creating the session on first use.
    pub fn add_exchange(&self, session_id: &str, query: &str, answer: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id))
            .push_exchange(Exchange::new(query, answer), self.max_history);
    }

    pub fn get_history(&self, session_id: &str) -> Option<String> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .and_then(Session::render_history)
    }

    pub fn clear_session(&self, session_id: &str) -> Result<(), DomainError> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(format!("Session '{session_id}'")))
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(5)
    }
}
