use std::io::ErrorKind;
use std::path::{ Path, PathBuf };

use async_std::fs;
use async_trait::async_trait;

use super::{ encode, SessionId, SessionRecord, SessionStore };
use crate::error::PersistenceError;

/// One `<session id>.json` file per session under a directory.
pub struct JsonFileStore {
    directory: PathBuf,
}

impl JsonFileStore {
    pub fn new(directory: impl Into<PathBuf>) -> JsonFileStore {
        JsonFileStore { directory: directory.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, id: &SessionId) -> Result<PathBuf, PersistenceError> {
        let valid = !id.as_str().is_empty()
            && id.as_str().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PersistenceError::Backend(format!["invalid session id {:?}", id.as_str()]));
        }
        Ok(self.directory.join(format!["{}.json", id]))
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn save_session(&self, id: Option<&SessionId>, record: &SessionRecord) -> Result<SessionId, PersistenceError> {
        let id = id.cloned().unwrap_or_else(SessionId::generate);
        let path = self.path_for(&id)?;
        let json = encode(&id, record)?;

        fs::create_dir_all(&self.directory).await?;
        // Write next to the target and rename so readers never see half a file.
        let staging = self.directory.join(format![".{}.json.tmp", id]);
        let written = match fs::write(&staging, json).await {
            Ok(()) => fs::rename(&staging, &path).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(err.into());
        }

        debug!["Saved session {} to {}", id, path.display()];
        Ok(id)
    }

    async fn load_session(&self, id: &SessionId) -> Result<SessionRecord, PersistenceError> {
        let path = self.path_for(id)?;
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(PersistenceError::NotFound(id.clone())),
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures;
    use pretty_assertions::assert_eq;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!["racetrack-store-{}", SessionId::generate()])
    }

    #[async_std::test]
    async fn round_trip_through_disk() {
        let dir = scratch_dir();
        let store = JsonFileStore::new(&dir);
        let record = fixtures::record();

        let id = store.save_session(None, &record).await.unwrap();
        assert!(dir.join(format!["{}.json", id]).exists());

        let loaded = store.load_session(&id).await.unwrap();
        assert_eq!(record.route_data, loaded.route_data);
        assert_eq!(record.performance_metrics, loaded.performance_metrics);
        assert_eq!(record.race_id, loaded.race_id);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[async_std::test]
    async fn missing_session_is_not_found() {
        let store = JsonFileStore::new(scratch_dir());
        assert!(matches!(
            store.load_session(&SessionId::from("0000")).await,
            Err(PersistenceError::NotFound(_))
        ));
    }

    #[async_std::test]
    async fn failed_rename_leaves_no_staging_file() {
        let dir = scratch_dir();
        let store = JsonFileStore::new(&dir);
        let id = SessionId::from("blocked");

        // A non-empty directory where the session file should go.
        let target = dir.join("blocked.json");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();

        assert!(matches!(
            store.save_session(Some(&id), &fixtures::record()).await,
            Err(PersistenceError::Io(_))
        ));
        assert!(!dir.join(".blocked.json.tmp").exists());
        assert!(target.join("keep").exists());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[async_std::test]
    async fn rejects_ids_that_escape_the_directory() {
        let store = JsonFileStore::new(scratch_dir());
        assert!(matches!(
            store.load_session(&SessionId::from("../etc/passwd")).await,
            Err(PersistenceError::Backend(_))
        ));
    }
}
