//! Cloud assembly storage.
//!
//! `synth` writes the rendered template and a manifest describing it to an
//! assembly store; `diff` reads the stored template back to compare against a
//! fresh synthesis. Backends: a local directory or an S3 prefix.

mod local;
mod lock;
mod s3;
mod store;
mod types;

pub use local::{DEFAULT_OUTPUT_DIR, LocalAssemblyStore};
pub use lock::{LOCK_EXPIRY_SECS, LOCK_FILE, LockInfo, generate_holder_id};
pub use s3::S3AssemblyStore;
pub use store::AssemblyStore;
pub use types::{
    AssemblyManifest, MANIFEST_FILE, MANIFEST_VERSION, MAX_HISTORY, StoredAssembly,
    SynthesisEntry, template_file_name,
};

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::{AssemblyBackend, AssemblyConfig, StackConfig};
use crate::error::{ConfigError, Result};
use crate::template::Template;

/// Opens the store described by the `assembly` configuration section.
///
/// A relative local path is resolved against `base_dir`, the directory of the
/// configuration file.
///
/// # Errors
///
/// Returns a validation error if the S3 backend has no bucket.
pub async fn open_store(config: &AssemblyConfig, base_dir: &Path) -> Result<Box<dyn AssemblyStore>> {
    match config.backend {
        AssemblyBackend::Local => {
            let path = config
                .path
                .as_ref()
                .map_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR), PathBuf::from);
            Ok(Box::new(LocalAssemblyStore::with_base_dir(base_dir.join(path))))
        }
        AssemblyBackend::S3 => {
            let bucket = config.bucket.as_deref().ok_or_else(|| {
                ConfigError::validation("S3 bucket not configured", "assembly.bucket")
            })?;
            let store =
                S3AssemblyStore::new(bucket, config.prefix.as_deref(), config.region.as_deref())
                    .await;
            Ok(Box::new(store))
        }
    }
}

/// Saves a template under the assembly lock, continuing the stored history.
///
/// The lock is released whether or not the save succeeded. A failed release
/// is logged and never replaces the save result.
///
/// # Errors
///
/// Returns an error if the lock cannot be taken, or if the previous manifest
/// cannot be read or the new assembly cannot be written.
pub async fn write_locked(
    store: &dyn AssemblyStore,
    config: &StackConfig,
    template: Template,
) -> Result<AssemblyManifest> {
    let lock = store.acquire_lock("").await?;
    let written = write_assembly(store, config, template).await;
    if let Err(e) = store.release_lock(&lock.lock_id).await {
        warn!("Failed to release assembly lock {}: {e}", lock.lock_id);
    }
    written
}

async fn write_assembly(
    store: &dyn AssemblyStore,
    config: &StackConfig,
    template: Template,
) -> Result<AssemblyManifest> {
    let previous = store.load_manifest().await?;
    let mut assembly = StoredAssembly::new(config, template);
    assembly.manifest = assembly.manifest.with_history_from(previous.as_ref());

    store.save(&assembly).await?;
    Ok(assembly.manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StackError, StoreError};
    use crate::stack::assemble;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Local store whose writes and lock releases fail.
    struct BrokenStore(LocalAssemblyStore);

    #[async_trait]
    impl AssemblyStore for BrokenStore {
        async fn load(&self) -> Result<Option<StoredAssembly>> {
            self.0.load().await
        }

        async fn load_manifest(&self) -> Result<Option<AssemblyManifest>> {
            self.0.load_manifest().await
        }

        async fn save(&self, _assembly: &StoredAssembly) -> Result<()> {
            Err(StoreError::write("disk full").into())
        }

        async fn delete(&self) -> Result<()> {
            self.0.delete().await
        }

        async fn exists(&self) -> Result<bool> {
            self.0.exists().await
        }

        async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
            self.0.acquire_lock(holder).await
        }

        async fn release_lock(&self, _lock_id: &str) -> Result<()> {
            Err(StoreError::s3("connection reset").into())
        }

        async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
            self.0.get_lock_info().await
        }

        fn location(&self) -> String {
            self.0.location()
        }

        fn backend_type(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_write_locked_releases_lock() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalAssemblyStore::with_base_dir(temp_dir.path().join(DEFAULT_OUTPUT_DIR));
        let config = StackConfig::with_emails(["ops@example.com"]);

        let first = write_locked(&store, &config, assemble(&config).unwrap()).await.unwrap();
        assert!(!store.is_locked().await.unwrap());
        assert!(first.changed_since_last());

        let second = write_locked(&store, &config, assemble(&config).unwrap()).await.unwrap();
        assert_eq!(second.history.len(), 2);
        assert!(!second.changed_since_last());
    }

    #[tokio::test]
    async fn test_write_error_survives_failed_release() {
        let temp_dir = TempDir::new().unwrap();
        let store = BrokenStore(LocalAssemblyStore::with_base_dir(
            temp_dir.path().join(DEFAULT_OUTPUT_DIR),
        ));
        let config = StackConfig::with_emails(["ops@example.com"]);

        let err = write_locked(&store, &config, assemble(&config).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StackError::Store(StoreError::WriteFailed { .. })));
    }

    #[tokio::test]
    async fn test_open_local_store() {
        let config = AssemblyConfig::default();
        let store = open_store(&config, Path::new("/tmp/project")).await.unwrap();
        assert_eq!(store.backend_type(), "local");
        assert_eq!(store.location(), "/tmp/project/stack.out");
    }

    #[tokio::test]
    async fn test_s3_requires_bucket() {
        let config = AssemblyConfig {
            backend: AssemblyBackend::S3,
            ..AssemblyConfig::default()
        };
        let Err(err) = open_store(&config, Path::new(".")).await else {
            panic!("expected a missing bucket error");
        };
        assert!(matches!(err, StackError::Config(_)));
    }
}
