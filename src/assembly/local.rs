//! Local directory assembly backend.
//!
//! Writes `<stack>.template.json` and `manifest.json` under an output
//! directory, `stack.out` by default.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

use super::lock::{LOCK_EXPIRY_SECS, LOCK_FILE, LockInfo};
use super::store::AssemblyStore;
use super::types::{AssemblyManifest, MANIFEST_FILE, StoredAssembly};

/// Default output directory name.
pub const DEFAULT_OUTPUT_DIR: &str = "stack.out";

/// Local directory assembly store.
#[derive(Debug)]
pub struct LocalAssemblyStore {
    /// Output directory.
    base_dir: PathBuf,
    /// Path to the manifest.
    manifest_path: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

impl LocalAssemblyStore {
    /// Creates a store with a custom output directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let manifest_path = base_dir.join(MANIFEST_FILE);
        let lock_path = base_dir.join(LOCK_FILE);

        Self {
            base_dir,
            manifest_path,
            lock_path,
        }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating output directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await.map_err(|e| {
                StoreError::write(format!("Failed to create output directory: {e}"))
            })?;
        }
        Ok(())
    }

    async fn read_optional(path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| StoreError::Corrupted {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Ok(Some(content))
    }

    /// Writes through a temporary file and renames it into place.
    async fn write_atomic(path: &Path, content: &str) -> Result<()> {
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StoreError::write(format!("Failed to create {}: {e}", temp_path.display())))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StoreError::write(format!("Failed to write {}: {e}", temp_path.display())))?;

        file.sync_all()
            .await
            .map_err(|e| StoreError::write(format!("Failed to sync {}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StoreError::write(format!("Failed to rename {}: {e}", path.display())))?;

        Ok(())
    }

    async fn remove_if_exists(path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)
                .await
                .map_err(|e| StoreError::write(format!("Failed to delete {}: {e}", path.display())))?;
        }
        Ok(())
    }

    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        match Self::read_optional(&self.lock_path).await? {
            Some(content) => Ok(Some(LockInfo::from_json(&content)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AssemblyStore for LocalAssemblyStore {
    async fn load(&self) -> Result<Option<StoredAssembly>> {
        let Some(manifest) = self.load_manifest().await? else {
            debug!("No manifest in {}", self.base_dir.display());
            return Ok(None);
        };

        let template_path = self.base_dir.join(&manifest.template_file);
        info!("Loading assembly from: {}", template_path.display());

        let content = Self::read_optional(&template_path).await?.ok_or_else(|| {
            StoreError::Corrupted {
                message: format!(
                    "Manifest names {} but the file is missing",
                    manifest.template_file
                ),
            }
        })?;
        let template = StoredAssembly::parse_template(&content)?;

        Ok(Some(StoredAssembly { manifest, template }))
    }

    async fn load_manifest(&self) -> Result<Option<AssemblyManifest>> {
        match Self::read_optional(&self.manifest_path).await? {
            Some(content) => Ok(Some(AssemblyManifest::from_json(&content)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, assembly: &StoredAssembly) -> Result<()> {
        self.ensure_dir().await?;

        let template_path = self.base_dir.join(&assembly.manifest.template_file);
        info!("Writing template to: {}", template_path.display());
        Self::write_atomic(&template_path, &assembly.template_json()?).await?;
        Self::write_atomic(&self.manifest_path, &assembly.manifest.to_json()?).await?;

        debug!("Assembly saved successfully");
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        if let Some(manifest) = self.load_manifest().await? {
            let template_path = self.base_dir.join(&manifest.template_file);
            info!("Deleting template: {}", template_path.display());
            Self::remove_if_exists(&template_path).await?;
        }

        Self::remove_if_exists(&self.manifest_path).await?;
        Self::remove_if_exists(&self.lock_path).await
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.manifest_path.exists())
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        if let Some(existing) = self.read_lock_file().await? {
            existing.ensure_released()?;
            debug!("Expired lock found, taking over");
        }

        self.ensure_dir().await?;
        let lock_info = LockInfo::for_holder(holder);
        Self::write_atomic(&self.lock_path, &lock_info.to_json()?)
            .await
            .map_err(|e| StoreError::LockFailed {
                message: e.to_string(),
            })?;

        info!(
            "Acquired assembly lock: {} (expires in {}s)",
            lock_info.lock_id, LOCK_EXPIRY_SECS
        );
        Ok(lock_info)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            if existing.lock_id == lock_id {
                Self::remove_if_exists(&self.lock_path).await?;
                info!("Released assembly lock: {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        self.read_lock_file().await
    }

    fn location(&self) -> String {
        self.base_dir.display().to_string()
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StackError;
    use crate::config::StackConfig;
    use crate::stack::assemble;
    use tempfile::TempDir;

    fn create_test_store() -> (LocalAssemblyStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalAssemblyStore::with_base_dir(temp_dir.path().join(DEFAULT_OUTPUT_DIR));
        (store, temp_dir)
    }

    fn assembly() -> StoredAssembly {
        let config = StackConfig::with_emails(["ops@example.com"]);
        StoredAssembly::new(&config, assemble(&config).unwrap())
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _temp) = create_test_store();
        let assembly = assembly();

        store.save(&assembly).await.expect("Failed to save assembly");
        assert!(
            store
                .base_dir()
                .join("applicationmetrics.template.json")
                .exists()
        );

        let loaded = store
            .load()
            .await
            .expect("Failed to load assembly")
            .expect("Assembly should exist");

        assert_eq!(loaded.template, assembly.template);
        assert_eq!(loaded.manifest.template_hash, assembly.manifest.template_hash);
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _temp) = create_test_store();
        assert!(store.load().await.expect("Load should not fail").is_none());
        assert!(!store.exists().await.expect("exists check failed"));
    }

    #[tokio::test]
    async fn test_missing_template_is_corrupted() {
        let (store, _temp) = create_test_store();
        store.save(&assembly()).await.expect("Failed to save assembly");
        std::fs::remove_file(store.base_dir().join("applicationmetrics.template.json")).unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StackError::Store(StoreError::Corrupted { .. })));
    }

    #[tokio::test]
    async fn test_delete_cleans_directory() {
        let (store, _temp) = create_test_store();
        store.save(&assembly()).await.expect("Failed to save assembly");
        store.acquire_lock("ci").await.expect("Failed to lock");

        store.delete().await.expect("Failed to delete");
        assert!(!store.exists().await.unwrap());
        assert!(!store.is_locked().await.unwrap());
        assert!(
            !store
                .base_dir()
                .join("applicationmetrics.template.json")
                .exists()
        );
    }

    #[tokio::test]
    async fn test_lock_acquire_release() {
        let (store, _temp) = create_test_store();

        let lock = store
            .acquire_lock("test-holder")
            .await
            .expect("Failed to acquire lock");
        assert!(store.is_locked().await.expect("is_locked failed"));

        store.release_lock("some-other-id").await.unwrap();
        assert!(store.is_locked().await.unwrap());

        store
            .release_lock(&lock.lock_id)
            .await
            .expect("Failed to release lock");
        assert!(!store.is_locked().await.expect("is_locked failed"));
    }

    #[tokio::test]
    async fn test_lock_conflict() {
        let (store, _temp) = create_test_store();

        let _lock = store
            .acquire_lock("holder-1")
            .await
            .expect("Failed to acquire first lock");

        let err = store.acquire_lock("holder-2").await.unwrap_err();
        assert!(matches!(
            err,
            StackError::Store(StoreError::LockedByOther { .. })
        ));
    }
}
