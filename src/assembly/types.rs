//! Cloud assembly types.
//!
//! A stored assembly is the rendered template plus a manifest describing it.
//! The manifest keeps a short history of previous syntheses so `assembly show`
//! can tell when the output last changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigHasher, StackConfig};
use crate::error::StoreError;
use crate::template::Template;

/// Current version of the manifest format.
pub const MANIFEST_VERSION: &str = "1.0";

/// Manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Number of history entries kept in a manifest.
pub const MAX_HISTORY: usize = 20;

/// Description of a stored template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyManifest {
    /// Manifest format version.
    pub version: String,
    /// Stack name.
    pub stack_name: String,
    /// Region the stack targets.
    pub region: String,
    /// Template file name, relative to the assembly root.
    pub template_file: String,
    /// Hash of the template document.
    pub template_hash: String,
    /// Hash of the configuration it was assembled from.
    pub config_hash: String,
    /// Number of resources in the template.
    pub resource_count: usize,
    /// When the template was synthesized.
    pub created_at: DateTime<Utc>,
    /// Previous syntheses, oldest first.
    #[serde(default)]
    pub history: Vec<SynthesisEntry>,
}

/// A single synthesis recorded in the manifest history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisEntry {
    /// When the synthesis happened.
    pub timestamp: DateTime<Utc>,
    /// Template hash at that time.
    pub template_hash: String,
    /// Number of resources at that time.
    pub resource_count: usize,
}

/// A template together with its manifest.
#[derive(Debug, Clone)]
pub struct StoredAssembly {
    /// Manifest.
    pub manifest: AssemblyManifest,
    /// Template document.
    pub template: Template,
}

/// Returns the template file name of a stack.
#[must_use]
pub fn template_file_name(stack_name: &str) -> String {
    format!("{stack_name}.template.json")
}

impl AssemblyManifest {
    /// Describes a freshly assembled template.
    #[must_use]
    pub fn new(config: &StackConfig, template: &Template) -> Self {
        let hasher = ConfigHasher::new();
        let now = Utc::now();
        let template_hash = hasher.hash_template(template);
        let resource_count = template.resources.len();

        Self {
            version: MANIFEST_VERSION.to_string(),
            stack_name: config.stack_name().to_string(),
            region: config.stack.region.clone(),
            template_file: template_file_name(config.stack_name()),
            template_hash: template_hash.clone(),
            config_hash: hasher.hash_config(config),
            resource_count,
            created_at: now,
            history: vec![SynthesisEntry {
                timestamp: now,
                template_hash,
                resource_count,
            }],
        }
    }

    /// Carries over the history of a previous manifest.
    #[must_use]
    pub fn with_history_from(mut self, previous: Option<&Self>) -> Self {
        if let Some(previous) = previous {
            let mut history = previous.history.clone();
            history.append(&mut self.history);
            let excess = history.len().saturating_sub(MAX_HISTORY);
            self.history = history.split_off(excess);
        }
        self
    }

    /// Returns true if the template differs from the previous synthesis.
    #[must_use]
    pub fn changed_since_last(&self) -> bool {
        match self.history.len() {
            0 | 1 => true,
            n => self.history[n - 2].template_hash != self.template_hash,
        }
    }

    /// Checks that the manifest was written by a compatible version.
    ///
    /// # Errors
    ///
    /// Returns a version mismatch error if the major versions differ.
    pub fn check_version(&self) -> Result<(), StoreError> {
        let major = |v: &str| v.split('.').next().unwrap_or_default().to_string();
        if major(&self.version) == major(MANIFEST_VERSION) {
            Ok(())
        } else {
            Err(StoreError::VersionMismatch {
                expected: MANIFEST_VERSION.to_string(),
                found: self.version.clone(),
            })
        }
    }

    /// Parses a manifest.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the document is not a manifest, or a
    /// version mismatch error.
    pub fn from_json(content: &str) -> Result<Self, StoreError> {
        let manifest: Self = serde_json::from_str(content).map_err(|e| StoreError::Corrupted {
            message: format!("Failed to parse manifest: {e}"),
        })?;
        manifest.check_version()?;
        Ok(manifest)
    }

    /// Serializes the manifest.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::serialization(format!("Failed to serialize manifest: {e}")))
    }
}

impl StoredAssembly {
    /// Pairs a template with a new manifest.
    #[must_use]
    pub fn new(config: &StackConfig, template: Template) -> Self {
        Self {
            manifest: AssemblyManifest::new(config, &template),
            template,
        }
    }

    /// Renders the template file content.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn template_json(&self) -> Result<String, StoreError> {
        self.template
            .to_json_pretty()
            .map_err(|e| StoreError::serialization(e.to_string()))
    }

    /// Parses a stored template file.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the document does not parse.
    pub fn parse_template(content: &str) -> Result<Template, StoreError> {
        Template::from_json(content).map_err(|e| StoreError::Corrupted {
            message: format!("Failed to parse template: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::assemble;

    fn manifest() -> AssemblyManifest {
        let config = StackConfig::with_emails(["ops@example.com"]);
        AssemblyManifest::new(&config, &assemble(&config).unwrap())
    }

    #[test]
    fn test_new_manifest() {
        let manifest = manifest();
        assert_eq!(manifest.stack_name, "applicationmetrics");
        assert_eq!(manifest.template_file, "applicationmetrics.template.json");
        assert_eq!(manifest.history.len(), 1);
        assert!(manifest.changed_since_last());
    }

    #[test]
    fn test_history_is_capped() {
        let mut current = manifest();
        for _ in 0..30 {
            current = manifest().with_history_from(Some(&current));
        }
        assert_eq!(current.history.len(), MAX_HISTORY);
        assert!(!current.changed_since_last());
    }

    #[test]
    fn test_version_check() {
        let mut manifest = manifest();
        assert!(manifest.check_version().is_ok());

        manifest.version = String::from("1.7");
        assert!(manifest.check_version().is_ok());

        manifest.version = String::from("2.0");
        assert!(matches!(
            manifest.check_version(),
            Err(StoreError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_manifest_json() {
        let manifest = manifest();
        let parsed = AssemblyManifest::from_json(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(parsed.template_hash, manifest.template_hash);

        assert!(matches!(
            AssemblyManifest::from_json("{}"),
            Err(StoreError::Corrupted { .. })
        ));
    }
}
