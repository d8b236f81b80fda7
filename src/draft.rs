//! Wizard draft persistence
//!
//! Create-mode drafts survive console restarts through a [`DraftStore`].
//! There is exactly one slot, addressed by a fixed storage key: saving
//! overwrites it, a successful create clears it. Edit-mode changes are never
//! snapshotted, they are saved to the platform directly.

use crate::error::{ConsoleError, Result};
use crate::wizard::WizardData;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Fixed storage key for the wizard draft slot
pub const DRAFT_STORAGE_KEY: &str = "agentdesk.agent_wizard_draft";

/// One saved draft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub data: WizardData,
    pub timestamp: DateTime<Utc>,
}

impl DraftSnapshot {
    pub fn now(data: WizardData) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Storage backend for the draft slot
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Overwrite the draft slot
    async fn save(&self, snapshot: &DraftSnapshot) -> Result<()>;

    /// Load the draft slot, `None` when empty
    async fn load(&self) -> Result<Option<DraftSnapshot>>;

    /// Empty the draft slot. Idempotent.
    async fn clear(&self) -> Result<()>;

    /// Backend name for logging
    fn backend_name(&self) -> &str {
        "unknown"
    }
}

// ============================================================================
// File-Based Draft Store
// ============================================================================

/// File-backed store: one JSON file named after the fixed storage key
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    /// Creates the directory if needed; the file itself appears on first save
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await.map_err(|e| {
            ConsoleError::Storage(format!(
                "failed to create draft directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self {
            path: dir.join(format!("{DRAFT_STORAGE_KEY}.json")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn save(&self, snapshot: &DraftSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;

        // write to a temp file then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            ConsoleError::Storage(format!(
                "failed to create draft file {}: {e}",
                temp_path.display()
            ))
        })?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| ConsoleError::Storage(format!("failed to write draft: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| ConsoleError::Storage(format!("failed to sync draft: {e}")))?;
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            ConsoleError::Storage(format!(
                "failed to move draft into place at {}: {e}",
                self.path.display()
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "draft snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<DraftSnapshot>> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConsoleError::Storage(format!(
                    "failed to read draft file {}: {e}",
                    self.path.display()
                )))
            }
        };
        let snapshot = serde_json::from_str(&json)?;
        Ok(Some(snapshot))
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConsoleError::Storage(format!(
                "failed to remove draft file {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn backend_name(&self) -> &str {
        "file"
    }
}

// ============================================================================
// In-Memory Draft Store (for testing)
// ============================================================================

/// In-memory store; drafts do not survive the process
#[derive(Default)]
pub struct MemoryDraftStore {
    slot: RwLock<Option<DraftSnapshot>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save(&self, snapshot: &DraftSnapshot) -> Result<()> {
        *self.slot.write().await = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<DraftSnapshot>> {
        Ok(self.slot.read().await.clone())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.write().await = None;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_draft() -> WizardData {
        WizardData {
            name: "Support Bot".to_string(),
            description: "Answers support questions".to_string(),
            vector_store_ids: vec!["vs-1".to_string()],
            system_prompt: "Be concise.".to_string(),
            ..WizardData::default()
        }
    }

    #[tokio::test]
    async fn test_file_store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path()).await.unwrap();

        let snapshot = DraftSnapshot::now(sample_draft());
        store.save(&snapshot).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.data, snapshot.data);
        assert_eq!(loaded.timestamp, snapshot.timestamp);
    }

    #[tokio::test]
    async fn test_file_store_load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path()).await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_overwrites_single_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path()).await.unwrap();

        store.save(&DraftSnapshot::now(sample_draft())).await.unwrap();
        let mut second = sample_draft();
        second.name = "Renamed".to_string();
        store.save(&DraftSnapshot::now(second)).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.data.name, "Renamed");
    }

    #[tokio::test]
    async fn test_file_store_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path()).await.unwrap();

        store.save(&DraftSnapshot::now(sample_draft())).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_normalizes_legacy_scalar_ids() {
        // a draft written by an older console stored a single id
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path()).await.unwrap();
        let legacy = format!(
            r#"{{"data":{{"name":"Old","vectorStoreIds":"vs-legacy"}},"timestamp":"{}"}}"#,
            Utc::now().to_rfc3339()
        );
        tokio::fs::write(store.path(), legacy).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.data.vector_store_ids, vec!["vs-legacy".to_string()]);
        assert_eq!(loaded.data.model, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_file_store_corrupt_draft_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path()).await.unwrap();
        tokio::fs::write(store.path(), "{not json").await.unwrap();
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryDraftStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.save(&DraftSnapshot::now(sample_draft())).await.unwrap();
        assert_eq!(
            store.load().await.unwrap().unwrap().data.name,
            "Support Bot"
        );

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert_eq!(store.backend_name(), "memory");
    }
}
