// Credential persistence in a JSON file

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{CredentialSlot, CredentialStore};
use crate::error::StoreError;

/// Credential store backed by a single JSON file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write never leaves a half-written credential file. On unix
/// the file is created with mode 0600.
pub struct FileStore {
    path: PathBuf,

    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, slots: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(slots)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn get(&self, slot: CredentialSlot) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let slots = self.load().await?;
        Ok(slots.get(slot.key()).cloned())
    }

    async fn set(&self, slot: CredentialSlot, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut slots = self.load().await?;
        slots.insert(slot.key().to_string(), value.to_string());
        self.save(&slots).await
    }

    async fn delete(&self, slot: CredentialSlot) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut slots = self.load().await?;
        if slots.remove(slot.key()).is_none() {
            return Ok(());
        }
        self.save(&slots).await
    }
}
