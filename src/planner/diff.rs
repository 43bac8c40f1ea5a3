//! Diff engine for comparing a fresh synthesis against a stored template.
//!
//! Resources are matched by logical id and compared by the hash of their
//! declaration. The comparison is purely local: it says what the provisioning
//! engine would see change, without asking it.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::config::ConfigHasher;
use crate::template::{Resource, Template};

/// Engine for computing diffs between two templates.
#[derive(Debug, Default)]
pub struct DiffEngine {
    /// Resource hasher.
    hasher: ConfigHasher,
}

/// Difference for a single resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDiff {
    /// Logical id.
    pub logical_id: String,
    /// Resource type, from the new template when present.
    pub resource_type: String,
    /// Type of difference.
    pub diff_type: DiffType,
    /// Top-level properties whose values changed.
    pub changed_properties: Vec<String>,
    /// Previous hash (if applicable).
    pub old_hash: Option<String>,
    /// New hash (if applicable).
    pub new_hash: Option<String>,
}

/// Type of difference detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffType {
    /// Resource is new.
    Create,
    /// Resource declaration changed.
    Update,
    /// Resource is gone from the new template.
    Delete,
    /// Resource is unchanged.
    NoChange,
}

/// Complete diff result.
#[derive(Debug, Serialize)]
pub struct DiffResult {
    /// All resource diffs, in logical id order.
    pub diffs: Vec<ResourceDiff>,
    /// Number of resources to create.
    pub creates: usize,
    /// Number of resources to update.
    pub updates: usize,
    /// Number of resources to delete.
    pub deletes: usize,
    /// Number of unchanged resources.
    pub unchanged: usize,
    /// Whether the outputs section changed.
    pub outputs_changed: bool,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hasher: ConfigHasher::new(),
        }
    }

    /// Computes the diff from `previous` to `new`.
    ///
    /// With no previous template every resource is a create.
    #[must_use]
    pub fn compute_diff(&self, new: &Template, previous: Option<&Template>) -> DiffResult {
        let empty = Template::new();
        let previous = previous.unwrap_or(&empty);

        let ids: BTreeSet<&String> = new
            .resources
            .keys()
            .chain(previous.resources.keys())
            .collect();

        let diffs: Vec<ResourceDiff> = ids
            .into_iter()
            .map(|id| {
                self.resource_diff(id, new.resources.get(id), previous.resources.get(id))
            })
            .collect();

        let count = |kind: DiffType| diffs.iter().filter(|d| d.diff_type == kind).count();
        let creates = count(DiffType::Create);
        let updates = count(DiffType::Update);
        let deletes = count(DiffType::Delete);
        let unchanged = count(DiffType::NoChange);

        DiffResult {
            creates,
            updates,
            deletes,
            unchanged,
            outputs_changed: new.outputs != previous.outputs,
            diffs,
        }
    }

    fn resource_diff(
        &self,
        logical_id: &str,
        new: Option<&Resource>,
        old: Option<&Resource>,
    ) -> ResourceDiff {
        let new_hash = new.map(|r| self.hasher.hash_resource(r));
        let old_hash = old.map(|r| self.hasher.hash_resource(r));

        let (diff_type, changed_properties) = match (new, old) {
            (Some(_), None) => (DiffType::Create, Vec::new()),
            (None, _) => (DiffType::Delete, Vec::new()),
            (Some(n), Some(o)) => {
                if let (Some(new_hash), Some(old_hash)) = (&new_hash, &old_hash)
                    && ConfigHasher::hashes_match(new_hash, old_hash)
                {
                    (DiffType::NoChange, Vec::new())
                } else {
                    (DiffType::Update, Self::changed_properties(n, o))
                }
            }
        };

        if diff_type != DiffType::NoChange {
            debug!("Resource {logical_id}: {diff_type}");
        }

        ResourceDiff {
            logical_id: logical_id.to_string(),
            resource_type: new
                .or(old)
                .map(|r| r.resource_type.clone())
                .unwrap_or_default(),
            diff_type,
            changed_properties,
            old_hash,
            new_hash,
        }
    }

    /// Names the top-level properties that differ, plus the type and
    /// `DependsOn` when those changed.
    fn changed_properties(new: &Resource, old: &Resource) -> Vec<String> {
        let mut changed = Vec::new();

        if new.resource_type != old.resource_type {
            changed.push(String::from("Type"));
        }

        let names: BTreeSet<&String> = new.properties.keys().chain(old.properties.keys()).collect();
        changed.extend(
            names
                .into_iter()
                .filter(|name| new.properties.get(*name) != old.properties.get(*name))
                .cloned(),
        );

        if new.depends_on != old.depends_on {
            changed.push(String::from("DependsOn"));
        }

        changed
    }
}

impl DiffResult {
    /// Returns true if there are any changes.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.creates > 0 || self.updates > 0 || self.deletes > 0 || self.outputs_changed
    }

    /// Returns the total number of resource changes.
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.creates + self.updates + self.deletes
    }

    /// Filters to only diffs that change something.
    #[must_use]
    pub fn actionable_diffs(&self) -> Vec<&ResourceDiff> {
        self.diffs
            .iter()
            .filter(|d| d.diff_type != DiffType::NoChange)
            .collect()
    }
}

impl std::fmt::Display for DiffType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::NoChange => "no change",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ResourceDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.logical_id, self.resource_type, self.diff_type)?;
        if !self.changed_properties.is_empty() {
            write!(f, " ({})", self.changed_properties.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::stack::{SUBSCRIPTION_TYPE, assemble};

    fn template_for(emails: &[&str]) -> Template {
        assemble(&StackConfig::with_emails(emails.iter().copied())).unwrap()
    }

    #[test]
    fn test_first_synthesis_creates_everything() {
        let template = template_for(&["ops@example.com"]);
        let diff = DiffEngine::new().compute_diff(&template, None);

        assert_eq!(diff.creates, template.resources.len());
        assert_eq!(diff.total_changes(), template.resources.len());
        assert!(diff.outputs_changed);
        assert!(diff.has_changes());
    }

    #[test]
    fn test_identical_templates_have_no_changes() {
        let template = template_for(&["ops@example.com"]);
        let diff = DiffEngine::new().compute_diff(&template, Some(&template));

        assert!(!diff.has_changes());
        assert_eq!(diff.unchanged, template.resources.len());
        assert!(diff.actionable_diffs().is_empty());
    }

    #[test]
    fn test_adding_and_removing_destinations() {
        let before = template_for(&["a@example.com"]);
        let after = template_for(&["b@example.com", "c@example.com"]);
        let diff = DiffEngine::new().compute_diff(&after, Some(&before));

        assert_eq!(diff.creates, 2);
        assert_eq!(diff.deletes, 1);
        assert_eq!(diff.updates, 0);
        assert!(
            diff.actionable_diffs()
                .iter()
                .all(|d| d.resource_type == SUBSCRIPTION_TYPE)
        );
    }

    #[test]
    fn test_changed_property_is_named() {
        let before = template_for(&["a@example.com"]);
        let mut after = before.clone();
        let (id, _) = after.resources_of_type(SUBSCRIPTION_TYPE)[0];
        let id = id.to_string();
        if let Some(resource) = after.resources.get_mut(&id) {
            resource
                .properties
                .insert(String::from("Protocol"), serde_json::json!("sms"));
        }

        let diff = DiffEngine::new().compute_diff(&after, Some(&before));
        assert_eq!(diff.updates, 1);
        let update = diff.actionable_diffs()[0];
        assert_eq!(update.logical_id, id);
        assert_eq!(update.changed_properties, ["Protocol"]);
        assert!(update.to_string().contains("(Protocol)"));
    }
}
