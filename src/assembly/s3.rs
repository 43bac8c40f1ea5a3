//! S3 assembly backend.
//!
//! Stores the template and manifest under a bucket prefix so a pipeline can
//! pick up the pre-rendered template without running the assembler.
//! Credentials come from the default AWS provider chain.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

use super::lock::{LOCK_EXPIRY_SECS, LOCK_FILE, LockInfo};
use super::store::AssemblyStore;
use super::types::{AssemblyManifest, MANIFEST_FILE, StoredAssembly};

/// S3 assembly store.
#[derive(Debug)]
pub struct S3AssemblyStore {
    /// S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
    /// Key prefix, empty or ending in `/`.
    prefix: String,
}

/// Normalizes a key prefix to `""` or `"segment/"`.
fn normalize_prefix(prefix: Option<&str>) -> String {
    prefix
        .map(|p| {
            let p = p.trim_matches('/');
            if p.is_empty() {
                String::new()
            } else {
                format!("{p}/")
            }
        })
        .unwrap_or_default()
}

impl S3AssemblyStore {
    /// Creates a store using the default AWS configuration.
    pub async fn new(bucket: &str, prefix: Option<&str>, region: Option<&str>) -> Self {
        let config = if let Some(region_str) = region {
            aws_config::from_env()
                .region(aws_config::Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Self::with_client(Client::new(&config), bucket, prefix)
    }

    /// Creates a store with an existing client.
    #[must_use]
    pub fn with_client(client: Client, bucket: &str, prefix: Option<&str>) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: normalize_prefix(prefix),
        }
    }

    fn key(&self, file: &str) -> String {
        format!("{}{file}", self.prefix)
    }

    async fn get_object(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(response) => {
                let bytes = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| StoreError::s3(format!("Failed to read S3 object: {e}")))?;

                let content =
                    String::from_utf8(bytes.to_vec()).map_err(|e| StoreError::Corrupted {
                        message: format!("Invalid UTF-8 in S3 object: {e}"),
                    })?;

                Ok(Some(content))
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(StoreError::s3(format!("S3 get error: {service_err}")).into())
                }
            }
        }
    }

    async fn put_object(&self, key: &str, content: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(content.as_bytes().to_vec().into())
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StoreError::s3(format!("S3 put error: {e}")))?;

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::s3(format!("S3 delete error: {e}")))?;

        Ok(())
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::s3(format!("S3 head error: {service_err}")).into())
                }
            }
        }
    }
}

#[async_trait]
impl AssemblyStore for S3AssemblyStore {
    async fn load(&self) -> Result<Option<StoredAssembly>> {
        let Some(manifest) = self.load_manifest().await? else {
            debug!("No assembly found in S3");
            return Ok(None);
        };

        let key = self.key(&manifest.template_file);
        debug!("Loading template from s3://{}/{key}", self.bucket);

        let content = self
            .get_object(&key)
            .await?
            .ok_or_else(|| StoreError::Corrupted {
                message: format!("Manifest names {key} but the object is missing"),
            })?;
        let template = StoredAssembly::parse_template(&content)?;

        info!("Loaded assembly for stack: {}", manifest.stack_name);
        Ok(Some(StoredAssembly { manifest, template }))
    }

    async fn load_manifest(&self) -> Result<Option<AssemblyManifest>> {
        match self.get_object(&self.key(MANIFEST_FILE)).await? {
            Some(json) => Ok(Some(AssemblyManifest::from_json(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, assembly: &StoredAssembly) -> Result<()> {
        let template_key = self.key(&assembly.manifest.template_file);
        info!("Writing template to s3://{}/{template_key}", self.bucket);

        self.put_object(&template_key, &assembly.template_json()?)
            .await?;
        self.put_object(&self.key(MANIFEST_FILE), &assembly.manifest.to_json()?)
            .await?;

        debug!("Assembly saved successfully to S3");
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        if let Some(manifest) = self.load_manifest().await? {
            let template_key = self.key(&manifest.template_file);
            info!("Deleting s3://{}/{template_key}", self.bucket);
            self.delete_object(&template_key).await?;
        }

        self.delete_object(&self.key(MANIFEST_FILE)).await?;
        self.delete_object(&self.key(LOCK_FILE)).await
    }

    async fn exists(&self) -> Result<bool> {
        self.object_exists(&self.key(MANIFEST_FILE)).await
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        if let Some(existing) = self.get_lock_info().await? {
            existing.ensure_released()?;
            debug!("Expired lock found, taking over");
        }

        let lock_info = LockInfo::for_holder(holder);
        self.put_object(&self.key(LOCK_FILE), &lock_info.to_json()?)
            .await?;

        info!(
            "Acquired assembly lock: {} (expires in {}s)",
            lock_info.lock_id, LOCK_EXPIRY_SECS
        );
        Ok(lock_info)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.get_lock_info().await? {
            if existing.lock_id == lock_id {
                self.delete_object(&self.key(LOCK_FILE)).await?;
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
        match self.get_object(&self.key(LOCK_FILE)).await? {
            Some(content) => Ok(Some(LockInfo::from_json(&content)?)),
            None => Ok(None),
        }
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }

    fn backend_type(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(None), "");
        assert_eq!(normalize_prefix(Some("/")), "");
        assert_eq!(normalize_prefix(Some("stacks")), "stacks/");
        assert_eq!(normalize_prefix(Some("/team/stacks/")), "team/stacks/");
    }
}
