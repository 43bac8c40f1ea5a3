//! Assembly locking.
//!
//! A lock file guards the assembly root while a synthesis writes to it, so two
//! concurrent `synth` runs against the same backend cannot interleave the
//! template and manifest writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Lock file name.
pub const LOCK_FILE: &str = "assembly.lock";

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 300;

/// Information about an assembly lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a new lock for `holder`.
    #[must_use]
    pub fn new(holder: &str) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(LOCK_EXPIRY_SECS),
        }
    }

    /// Creates a lock, generating a holder id when `holder` is empty.
    #[must_use]
    pub fn for_holder(holder: &str) -> Self {
        if holder.is_empty() {
            Self::new(&generate_holder_id())
        } else {
            Self::new(holder)
        }
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns the remaining time until expiry in seconds.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }

    /// Fails if this lock is still held.
    ///
    /// # Errors
    ///
    /// Returns a locked-by-other error unless the lock has expired.
    pub fn ensure_released(&self) -> Result<(), StoreError> {
        if self.is_expired() {
            Ok(())
        } else {
            Err(StoreError::LockedByOther {
                holder: self.holder.clone(),
                since: self.acquired_at.to_rfc3339(),
            })
        }
    }

    /// Parses a lock file.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the content is not a lock.
    pub fn from_json(content: &str) -> Result<Self, StoreError> {
        serde_json::from_str(content).map_err(|e| StoreError::Corrupted {
            message: format!("Failed to parse lock file: {e}"),
        })
    }

    /// Serializes the lock.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::serialization(format!("Failed to serialize lock: {e}")))
    }
}

/// Generates a unique holder identifier for the current process.
#[must_use]
pub fn generate_holder_id() -> String {
    let hostname = hostname::get()
        .map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());
    let pid = std::process::id();
    let suffix = Uuid::new_v4().simple().to_string();

    format!("{hostname}-{pid}-{}", &suffix[..8])
}
