pub mod file;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };

use crate::error::PersistenceError;
use crate::location::GpsSample;
use crate::metrics::PerformanceMetrics;
use crate::session::SessionType;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> SessionId {
        SessionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        SessionId(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    pub session_type: SessionType,
    pub route_data: Vec<GpsSample>,
    pub performance_metrics: PerformanceMetrics,
    #[serde(default)]
    pub lap_markers: Vec<u64>,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
}

/// The storage collaborator sessions are persisted to. Saving with an id
/// overwrites that session; saving without one assigns a fresh id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save_session(&self, id: Option<&SessionId>, record: &SessionRecord) -> Result<SessionId, PersistenceError>;

    async fn load_session(&self, id: &SessionId) -> Result<SessionRecord, PersistenceError>;
}

fn encode(id: &SessionId, record: &SessionRecord) -> Result<String, PersistenceError> {
    let mut stored = record.clone();
    stored.session_id = Some(id.clone());
    Ok(serde_json::to_string(&stored)?)
}
