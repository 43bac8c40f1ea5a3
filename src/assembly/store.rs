//! Assembly store trait definition.
//!
//! This module defines the common interface for assembly storage backends.

use async_trait::async_trait;

use crate::error::Result;

use super::lock::LockInfo;
use super::types::{AssemblyManifest, StoredAssembly};

/// Trait for assembly storage backends.
#[async_trait]
pub trait AssemblyStore: Send + Sync {
    /// Loads the stored assembly.
    ///
    /// Returns `None` if nothing has been synthesized yet.
    async fn load(&self) -> Result<Option<StoredAssembly>>;

    /// Loads only the manifest.
    async fn load_manifest(&self) -> Result<Option<AssemblyManifest>>;

    /// Writes the template, then the manifest.
    async fn save(&self, assembly: &StoredAssembly) -> Result<()>;

    /// Removes the template, the manifest and the lock.
    async fn delete(&self) -> Result<()>;

    /// Checks if a manifest exists.
    async fn exists(&self) -> Result<bool>;

    /// Acquires the assembly lock.
    ///
    /// An empty `holder` is replaced with a generated id.
    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo>;

    /// Releases the lock if `lock_id` matches the current one.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Gets current lock information if a lock file exists.
    async fn get_lock_info(&self) -> Result<Option<LockInfo>>;

    /// Checks if the assembly is locked by a lock that has not expired.
    async fn is_locked(&self) -> Result<bool> {
        Ok(self
            .get_lock_info()
            .await?
            .is_some_and(|lock| !lock.is_expired()))
    }

    /// Human-readable location of the assembly root.
    fn location(&self) -> String;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl AssemblyStore for Box<dyn AssemblyStore> {
    async fn load(&self) -> Result<Option<StoredAssembly>> {
        (**self).load().await
    }

    async fn load_manifest(&self) -> Result<Option<AssemblyManifest>> {
        (**self).load_manifest().await
    }

    async fn save(&self, assembly: &StoredAssembly) -> Result<()> {
        (**self).save(assembly).await
    }

    async fn delete(&self) -> Result<()> {
        (**self).delete().await
    }

    async fn exists(&self) -> Result<bool> {
        (**self).exists().await
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        (**self).acquire_lock(holder).await
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        (**self).release_lock(lock_id).await
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        (**self).get_lock_info().await
    }

    async fn is_locked(&self) -> Result<bool> {
        (**self).is_locked().await
    }

    fn location(&self) -> String {
        (**self).location()
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
