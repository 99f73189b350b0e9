use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::location::{ LocationProvider, LocationSampler };
use crate::session::{ RaceSession, SessionOptions };
use crate::store::{ SessionId, SessionStore };

/// Local handle for a session. Store ids only exist after the first save,
/// so the registry hands out its own keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(u64);

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owns every in-memory session for one location provider and store.
pub struct SessionRegistry {
    provider: Arc<dyn LocationProvider>,
    store: Arc<dyn SessionStore>,
    options: SessionOptions,
    next_key: u64,
    sessions: HashMap<SessionKey, RaceSession>,
}

impl SessionRegistry {
    pub fn new(provider: Arc<dyn LocationProvider>, store: Arc<dyn SessionStore>, options: SessionOptions) -> SessionRegistry {
        SessionRegistry {
            provider,
            store,
            options,
            next_key: 0,
            sessions: HashMap::new(),
        }
    }

    pub fn create(&mut self) -> SessionKey {
        let key = SessionKey(self.next_key);
        self.next_key += 1;

        let sampler = LocationSampler::new(self.provider.clone());
        self.sessions.insert(key, RaceSession::new(sampler, self.store.clone(), self.options.clone()));
        debug!["Created session {}", key];
        key
    }

    pub fn get(&self, key: SessionKey) -> Option<&RaceSession> {
        self.sessions.get(&key)
    }

    pub fn get_mut(&mut self, key: SessionKey) -> Option<&mut RaceSession> {
        self.sessions.get_mut(&key)
    }

    pub fn find(&self, id: &SessionId) -> Option<SessionKey> {
        self.sessions
            .iter()
            .find(|(_, session)| session.id() == Some(id))
            .map(|(key, _)| *key)
    }

    /// Removes a session. Dropping the returned value releases its location
    /// watch.
    pub fn dispose(&mut self, key: SessionKey) -> Option<RaceSession> {
        let session = self.sessions.remove(&key);
        if let Some(session) = &session {
            debug!["Disposed session {} in state {}", key, session.state()];
        }
        session
    }

    pub fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.sessions.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
