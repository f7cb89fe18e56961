use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::wizard::session::{SessionKey, WizardSession};

/// Keeps wizard sessions between requests.
pub trait SessionStore: Send + Sync {
    fn load(&self, key: &SessionKey) -> Option<WizardSession>;

    fn save(&self, key: &SessionKey, session: &WizardSession);

    /// Drops the session, returning it if there was one.
    fn remove(&self, key: &SessionKey) -> Option<WizardSession>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionKey, WizardSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// A poisoned map still holds whole sessions: every write replaces a value.
impl SessionStore for MemorySessionStore {
    fn load(&self, key: &SessionKey) -> Option<WizardSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn save(&self, key: &SessionKey, session: &WizardSession) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(*key, session.clone());
    }

    fn remove(&self, key: &SessionKey) -> Option<WizardSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}
