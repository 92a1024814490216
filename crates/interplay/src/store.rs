//! Persistence for the application ID and the registered command map
//!
//! Commands are stored as the JSON produced by
//! [`SlashCommand::to_value`](crate::SlashCommand::to_value), keyed by ID,
//! so that a store written by one version can be read leniently by another.

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serenity::model::id::{ApplicationId, CommandId};
use tokio::sync::Mutex;

/// An error arising from reading or writing persisted state
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing file could not be read or written
    #[error("I/O error accessing {0:?}")]
    Io(PathBuf, #[source] std::io::Error),
    /// The backing file contained invalid data
    #[error("Invalid data in command store")]
    Json(#[from] serde_json::Error),
}

/// Everything persisted between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    /// The application ID, once known
    #[serde(default)]
    pub application_id: Option<ApplicationId>,
    /// Persisted command records keyed by command ID
    #[serde(default)]
    pub commands: BTreeMap<CommandId, Value>,
}

/// A persistent key-value store for interaction state
#[async_trait::async_trait]
pub trait CommandStore: std::fmt::Debug + Send + Sync {
    /// Read the full persisted state
    async fn load(&self) -> Result<StoredState, StoreError>;

    /// Record the application ID
    async fn set_application_id(&self, id: ApplicationId) -> Result<(), StoreError>;

    /// Insert or overwrite a command record
    async fn save_command(&self, id: CommandId, record: Value) -> Result<(), StoreError>;

    /// Remove a command record, if present
    async fn remove_command(&self, id: CommandId) -> Result<(), StoreError>;
}

/// A [`CommandStore`] that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore(Mutex<StoredState>);

impl MemoryStore {
    /// Construct a store pre-populated with the given state
    #[must_use]
    pub fn new(state: StoredState) -> Self { Self(Mutex::new(state)) }

    /// A copy of the current state
    pub async fn snapshot(&self) -> StoredState { self.0.lock().await.clone() }
}

#[async_trait::async_trait]
impl CommandStore for MemoryStore {
    async fn load(&self) -> Result<StoredState, StoreError> { Ok(self.snapshot().await) }

    async fn set_application_id(&self, id: ApplicationId) -> Result<(), StoreError> {
        self.0.lock().await.application_id = Some(id);
        Ok(())
    }

    async fn save_command(&self, id: CommandId, record: Value) -> Result<(), StoreError> {
        self.0.lock().await.commands.insert(id, record);
        Ok(())
    }

    async fn remove_command(&self, id: CommandId) -> Result<(), StoreError> {
        self.0.lock().await.commands.remove(&id);
        Ok(())
    }
}

/// A [`CommandStore`] backed by a single JSON file
///
/// Every write rewrites the whole file via a temporary sibling and a rename,
/// so a crash mid-write leaves the previous contents intact.  A missing file
/// reads as empty state.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Construct a store reading and writing the given path
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<StoredState, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(StoredState::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredState::default()),
            Err(e) => Err(StoreError::Io(self.path.clone(), e)),
        }
    }

    async fn write(&self, state: &StoredState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::Io(tmp.clone(), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Io(self.path.clone(), e))
    }

    async fn update(&self, f: impl FnOnce(&mut StoredState) + Send) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut state = self.read().await?;
        f(&mut state);
        self.write(&state).await
    }
}

#[async_trait::async_trait]
impl CommandStore for JsonFileStore {
    async fn load(&self) -> Result<StoredState, StoreError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn set_application_id(&self, id: ApplicationId) -> Result<(), StoreError> {
        self.update(|s| s.application_id = Some(id)).await
    }

    async fn save_command(&self, id: CommandId, record: Value) -> Result<(), StoreError> {
        self.update(|s| {
            s.commands.insert(id, record);
        })
        .await
    }

    async fn remove_command(&self, id: CommandId) -> Result<(), StoreError> {
        self.update(|s| {
            s.commands.remove(&id);
        })
        .await
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::new(&path);

        assert_eq!(store.load().await.unwrap(), StoredState::default());

        store
            .set_application_id(ApplicationId::new(100))
            .await
            .unwrap();
        store
            .save_command(CommandId::new(1), json!({ "name": "a" }))
            .await
            .unwrap();
        store
            .save_command(CommandId::new(2), json!({ "name": "b" }))
            .await
            .unwrap();
        store.remove_command(CommandId::new(1)).await.unwrap();

        let reopened = JsonFileStore::new(&path).load().await.unwrap();
        assert_eq!(reopened.application_id, Some(ApplicationId::new(100)));
        assert_eq!(reopened.commands.len(), 1);
        assert_eq!(reopened.commands[&CommandId::new(2)]["name"], "b");
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        assert!(matches!(
            JsonFileStore::new(&path).load().await,
            Err(StoreError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::default();
        store
            .save_command(CommandId::new(3), json!({}))
            .await
            .unwrap();
        store.remove_command(CommandId::new(4)).await.unwrap();

        let snap = store.snapshot().await;
        assert!(snap.application_id.is_none());
        assert_eq!(snap.commands.keys().copied().collect::<Vec<_>>(), [
            CommandId::new(3)
        ]);
    }
}
