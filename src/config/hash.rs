//! Hashing for change detection.
//!
//! Fingerprints of the stack configuration, rendered templates and single
//! resources. Templates are hashed from their canonical JSON encoding, which
//! is stable because every map in the document model is ordered.

use sha2::{Digest, Sha256};

use crate::template::{Resource, Template};

use super::spec::StackConfig;

/// Hasher for computing configuration and template hashes.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the stack configuration.
    ///
    /// Email order matters: it decides subscription order in the template.
    #[must_use]
    pub fn hash_config(&self, config: &StackConfig) -> String {
        let mut hasher = Sha256::new();

        hasher.update(config.stack.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(config.stack.region.as_bytes());

        for email in &config.notifications.emails {
            hasher.update([0u8]);
            hasher.update(email.as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a hash of a whole template.
    #[must_use]
    pub fn hash_template(&self, template: &Template) -> String {
        Self::hash_json(template)
    }

    /// Computes a hash of a single resource.
    #[must_use]
    pub fn hash_resource(&self, resource: &Resource) -> String {
        Self::hash_json(resource)
    }

    fn hash_json<T: serde::Serialize>(value: &T) -> String {
        // Serializing ordered maps of plain data cannot fail.
        let bytes = serde_json::to_vec(value).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes to determine if they are equal.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_hash_deterministic() {
        let hasher = ConfigHasher::new();
        let config = StackConfig::with_emails(["ops@example.com"]);

        assert_eq!(hasher.hash_config(&config), hasher.hash_config(&config));
    }

    #[test]
    fn test_config_hash_depends_on_email_order() {
        let hasher = ConfigHasher::new();
        let a = StackConfig::with_emails(["a@example.com", "b@example.com"]);
        let b = StackConfig::with_emails(["b@example.com", "a@example.com"]);

        assert_ne!(hasher.hash_config(&a), hasher.hash_config(&b));
    }

    #[test]
    fn test_resource_hash_changes_with_properties() {
        let hasher = ConfigHasher::new();
        let a = Resource::new("AWS::SNS::Topic");
        let b = Resource::new("AWS::SNS::Topic")
            .with_properties(serde_json::json!({ "DisplayName": "Errors" }));

        assert_ne!(hasher.hash_resource(&a), hasher.hash_resource(&b));
    }

    #[test]
    fn test_short_hash() {
        let hasher = ConfigHasher::new();
        let short = hasher.short_hash("abcdef1234567890abcdef1234567890");

        assert_eq!(short, "abcdef12");
    }

    #[test]
    fn test_hashes_match() {
        assert!(ConfigHasher::hashes_match("abc123", "abc123"));
        assert!(!ConfigHasher::hashes_match("abc123", "abc124"));
        assert!(!ConfigHasher::hashes_match("abc123", "abc12"));
    }
}
