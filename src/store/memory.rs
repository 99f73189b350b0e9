use std::collections::HashMap;
use std::sync::atomic::{ AtomicBool, Ordering };

use async_std::sync::Mutex;
use async_trait::async_trait;

use super::{ encode, SessionId, SessionRecord, SessionStore };
use crate::error::PersistenceError;

/// Keeps serialized sessions in memory. Can be switched offline to exercise
/// failure handling.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<SessionId, String>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn check_online(&self) -> Result<(), PersistenceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PersistenceError::Backend("store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save_session(&self, id: Option<&SessionId>, record: &SessionRecord) -> Result<SessionId, PersistenceError> {
        self.check_online()?;

        let id = id.cloned().unwrap_or_else(SessionId::generate);
        let json = encode(&id, record)?;
        self.sessions.lock().await.insert(id.clone(), json);

        Ok(id)
    }

    async fn load_session(&self, id: &SessionId) -> Result<SessionRecord, PersistenceError> {
        self.check_online()?;

        let sessions = self.sessions.lock().await;
        let json = sessions.get(id).ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
        Ok(serde_json::from_str(json)?)
    }
}
