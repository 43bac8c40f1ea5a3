//! Configuration specification types for the stack assembler.
//!
//! This module defines the structs that map to `appmetrics.stack.yaml`. The
//! only input that shapes the assembled resource graph is the notification
//! destination list; the remaining sections name the stack and pick where the
//! rendered assembly is stored.

use serde::{Deserialize, Serialize};

/// Default stack name.
pub const DEFAULT_STACK_NAME: &str = "applicationmetrics";

/// Default deployment region.
pub const DEFAULT_REGION: &str = "us-west-2";

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StackConfig {
    /// Stack identity.
    #[serde(default)]
    pub stack: StackSettings,
    /// Alert notification destinations.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Where rendered assemblies are written.
    #[serde(default)]
    pub assembly: AssemblyConfig,
}

/// Stack identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackSettings {
    /// Stack name, also the template file stem.
    #[serde(default = "default_stack_name")]
    pub name: String,
    /// Region the stack targets.
    #[serde(default = "default_region")]
    pub region: String,
}

/// Alert notification destinations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NotificationConfig {
    /// Email addresses subscribed to the alarm topic, in order.
    #[serde(default)]
    pub emails: Vec<String>,
}

/// Assembly store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AssemblyConfig {
    /// Backend type (local or s3).
    #[serde(default)]
    pub backend: AssemblyBackend,
    /// Local output directory (for local backend).
    #[serde(default)]
    pub path: Option<String>,
    /// S3 bucket name (required for s3 backend).
    #[serde(default)]
    pub bucket: Option<String>,
    /// S3 key prefix (optional).
    #[serde(default)]
    pub prefix: Option<String>,
    /// S3 region (optional, uses AWS default if not specified).
    #[serde(default)]
    pub region: Option<String>,
}

/// Assembly backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyBackend {
    /// Local directory.
    #[default]
    Local,
    /// AWS S3 bucket.
    S3,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            name: default_stack_name(),
            region: default_region(),
        }
    }
}

fn default_stack_name() -> String {
    String::from(DEFAULT_STACK_NAME)
}

fn default_region() -> String {
    String::from(DEFAULT_REGION)
}

impl StackConfig {
    /// Creates a configuration with default stack settings and the given emails.
    #[must_use]
    pub fn with_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            notifications: NotificationConfig {
                emails: emails.into_iter().map(Into::into).collect(),
            },
            ..Self::default()
        }
    }

    /// Returns the stack name.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        &self.stack.name
    }

    /// Returns the notification emails.
    #[must_use]
    pub fn emails(&self) -> &[String] {
        &self.notifications.emails
    }
}

impl std::fmt::Display for AssemblyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::S3 => write!(f, "s3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StackConfig::default();
        assert_eq!(config.stack_name(), "applicationmetrics");
        assert_eq!(config.stack.region, "us-west-2");
        assert!(config.emails().is_empty());
        assert_eq!(config.assembly.backend, AssemblyBackend::Local);
    }

    #[test]
    fn test_with_emails_keeps_order() {
        let config = StackConfig::with_emails(["b@example.com", "a@example.com"]);
        assert_eq!(config.emails(), ["b@example.com", "a@example.com"]);
    }
}
