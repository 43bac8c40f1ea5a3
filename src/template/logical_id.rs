//! Construct paths and logical id allocation.
//!
//! Every resource lives at a path of construct names below the stack. The
//! logical id is derived from that path: a readable part built from the
//! alphanumeric characters of each component, plus a short hash of the full
//! path so that two paths never collapse to the same id.

use sha2::{Digest, Sha256};

/// Maximum length of a logical id.
const MAX_LOGICAL_ID_LEN: usize = 255;

/// Length of the hash suffix.
const HASH_LEN: usize = 8;

/// Components left out of the readable part of a logical id.
const HIDDEN_COMPONENTS: &[&str] = &["Default", "Resource"];

/// Path of a construct below the stack root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructPath {
    components: Vec<String>,
}

impl ConstructPath {
    /// Creates a path from its components.
    #[must_use]
    pub fn new(components: &[&str]) -> Self {
        Self {
            components: components.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    /// Returns a child path.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut components = self.components.clone();
        components.push(name.to_string());
        Self { components }
    }

    /// Returns the path components.
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Returns the path as shown in resource metadata (`stack/a/b`).
    #[must_use]
    pub fn display_under(&self, stack_name: &str) -> String {
        let mut path = String::from(stack_name);
        for component in &self.components {
            path.push('/');
            path.push_str(component);
        }
        path
    }

    /// Allocates the logical id for this path.
    #[must_use]
    pub fn logical_id(&self) -> String {
        if let [only] = self.components.as_slice() {
            let candidate = remove_non_alphanumeric(only);
            if !candidate.is_empty() && candidate.len() <= MAX_LOGICAL_ID_LEN {
                return candidate;
            }
        }

        let human: String = self
            .components
            .iter()
            .filter(|c| !HIDDEN_COMPONENTS.contains(&c.as_str()))
            .map(|c| remove_non_alphanumeric(c))
            .collect();
        let human: String = human.chars().take(MAX_LOGICAL_ID_LEN - HASH_LEN).collect();

        format!("{human}{}", path_hash(&self.components))
    }
}

impl std::fmt::Display for ConstructPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.components.join("/"))
    }
}

fn remove_non_alphanumeric(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn path_hash(components: &[String]) -> String {
    let digest = Sha256::digest(components.join("/").as_bytes());
    hex::encode_upper(digest).chars().take(HASH_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_component_is_verbatim() {
        assert_eq!(ConstructPath::new(&["LambdaLogError"]).logical_id(), "LambdaLogError");
        assert_eq!(ConstructPath::new(&["api_application_metrics"]).logical_id(), "apiapplicationmetrics");
    }

    #[test]
    fn test_nested_path_gets_hash_suffix() {
        let id = ConstructPath::new(&["table", "Resource"]).logical_id();
        assert!(id.starts_with("table"));
        assert_eq!(id.len(), "table".len() + HASH_LEN);
        assert!(id[5..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_hidden_components_still_hashed() {
        let a = ConstructPath::new(&["api", "Default", "applications"]).logical_id();
        let b = ConstructPath::new(&["api", "applications"]).logical_id();
        assert!(a.starts_with("apiapplications"));
        assert!(b.starts_with("apiapplications"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_allocation_is_stable() {
        let path = ConstructPath::new(&["Errors", "ops@example.com"]);
        assert_eq!(path.logical_id(), path.logical_id());
        assert!(path.logical_id().starts_with("Errorsopsexamplecom"));
    }

    #[test]
    fn test_display_under_stack() {
        let path = ConstructPath::new(&["post", "ServiceRole"]).child("Resource");
        assert_eq!(path.display_under("applicationmetrics"), "applicationmetrics/post/ServiceRole/Resource");
    }
}
