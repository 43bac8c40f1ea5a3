//! The template document.
//!
//! Maps are ordered so that rendering the same graph twice produces the same
//! bytes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AssemblyError;

use super::expr::{Expr, PSEUDO_PARAMETERS};

/// Template format version.
pub const FORMAT_VERSION: &str = "2010-09-09";

/// Metadata key holding the construct path of a resource.
pub const PATH_METADATA_KEY: &str = "aws:cdk:path";

/// A complete template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Format version, always [`FORMAT_VERSION`].
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    /// Human description.
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Input parameters.
    #[serde(rename = "Parameters", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,

    /// Resources keyed by logical id.
    #[serde(rename = "Resources", default)]
    pub resources: BTreeMap<String, Resource>,

    /// Stack outputs.
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

/// A single resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type, e.g. `AWS::SNS::Topic`.
    #[serde(rename = "Type")]
    pub resource_type: String,

    /// Resource properties.
    #[serde(rename = "Properties", default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,

    /// Explicit ordering dependencies.
    #[serde(rename = "DependsOn", default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,

    /// Policy applied when the resource is replaced.
    #[serde(rename = "UpdateReplacePolicy", default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,

    /// Policy applied when the resource is removed from the stack.
    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,

    /// Resource metadata.
    #[serde(rename = "Metadata", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

/// A template parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter type.
    #[serde(rename = "Type")]
    pub parameter_type: String,
    /// Description shown by the provisioning engine.
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A stack output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Output value.
    #[serde(rename = "Value")]
    pub value: Expr,
    /// Optional description.
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    /// A `String` parameter.
    #[must_use]
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            parameter_type: String::from("String"),
            description: Some(description.into()),
        }
    }
}

impl Output {
    /// Creates an output.
    #[must_use]
    pub const fn new(value: Expr) -> Self {
        Self {
            value,
            description: None,
        }
    }
}

impl Resource {
    /// Creates a resource with no properties.
    #[must_use]
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties: Map::new(),
            depends_on: BTreeSet::new(),
            update_replace_policy: None,
            deletion_policy: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Creates a resource whose properties are the serialization of `props`.
    ///
    /// # Errors
    ///
    /// Returns an error if `props` does not serialize to a JSON object.
    pub fn from_properties<T: Serialize>(
        resource_type: impl Into<String>,
        props: &T,
    ) -> Result<Self, AssemblyError> {
        let resource_type = resource_type.into();
        let value = serde_json::to_value(props)
            .map_err(|e| AssemblyError::serialization(resource_type.clone(), e))?;

        match value {
            Value::Object(properties) => Ok(Self {
                properties,
                ..Self::new(resource_type)
            }),
            other => Err(AssemblyError::serialization(
                resource_type,
                format!("properties must be an object, got {other}"),
            )),
        }
    }

    /// Replaces the properties. Non-object values clear them.
    #[must_use]
    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    /// Adds an ordering dependency.
    #[must_use]
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.insert(logical_id.into());
        self
    }

    /// Keeps the resource when it is replaced or removed.
    #[must_use]
    pub fn retained(mut self) -> Self {
        self.update_replace_policy = Some(String::from("Retain"));
        self.deletion_policy = Some(String::from("Retain"));
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Returns the construct path recorded in the metadata.
    #[must_use]
    pub fn construct_path(&self) -> Option<&str> {
        self.metadata.get(PATH_METADATA_KEY).and_then(Value::as_str)
    }

    /// Logical ids referenced from the properties via `Ref` or `Fn::GetAtt`.
    #[must_use]
    pub fn references(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        for value in self.properties.values() {
            collect_references(value, &mut found);
        }
        found
    }
}

fn collect_references(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    found.insert(target.clone());
                    return;
                }
                if let Some(Value::Array(parts)) = map.get("Fn::GetAtt")
                    && let Some(Value::String(target)) = parts.first()
                {
                    found.insert(target.clone());
                    return;
                }
            }
            for nested in map.values() {
                collect_references(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, found);
            }
        }
        _ => {}
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

impl Template {
    /// Creates an empty template.
    #[must_use]
    pub fn new() -> Self {
        Self {
            format_version: String::from(FORMAT_VERSION),
            description: None,
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Adds a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the logical id is already taken.
    pub fn add_resource(
        &mut self,
        logical_id: impl Into<String>,
        resource: Resource,
    ) -> Result<(), AssemblyError> {
        let logical_id = logical_id.into();
        if self.resources.contains_key(&logical_id) || self.parameters.contains_key(&logical_id) {
            return Err(AssemblyError::DuplicateLogicalId { logical_id });
        }
        self.resources.insert(logical_id, resource);
        Ok(())
    }

    /// Adds a parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the logical id is already taken.
    pub fn add_parameter(
        &mut self,
        logical_id: impl Into<String>,
        parameter: Parameter,
    ) -> Result<(), AssemblyError> {
        let logical_id = logical_id.into();
        if self.resources.contains_key(&logical_id) || self.parameters.contains_key(&logical_id) {
            return Err(AssemblyError::DuplicateLogicalId { logical_id });
        }
        self.parameters.insert(logical_id, parameter);
        Ok(())
    }

    /// Adds an output.
    ///
    /// # Errors
    ///
    /// Returns an error if an output with that name exists.
    pub fn add_output(&mut self, name: impl Into<String>, output: Output) -> Result<(), AssemblyError> {
        let name = name.into();
        if self.outputs.contains_key(&name) {
            return Err(AssemblyError::DuplicateLogicalId { logical_id: name });
        }
        self.outputs.insert(name, output);
        Ok(())
    }

    /// Returns a resource by logical id.
    #[must_use]
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Returns all resources of a type, in logical id order.
    #[must_use]
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<(&str, &Resource)> {
        self.resources
            .iter()
            .filter(|(_, r)| r.resource_type == resource_type)
            .map(|(id, r)| (id.as_str(), r))
            .collect()
    }

    /// Counts resources of a type.
    #[must_use]
    pub fn count_of_type(&self, resource_type: &str) -> usize {
        self.resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .count()
    }

    /// Logical ids referenced by a resource. Empty if the resource is unknown.
    #[must_use]
    pub fn references_of(&self, logical_id: &str) -> BTreeSet<String> {
        self.resources
            .get(logical_id)
            .map(Resource::references)
            .unwrap_or_default()
    }

    /// Checks that every reference and dependency resolves.
    ///
    /// # Errors
    ///
    /// Returns the first dangling reference, in logical id order.
    pub fn verify(&self) -> Result<(), AssemblyError> {
        for (id, resource) in &self.resources {
            for target in resource.references() {
                if !self.is_resolvable(&target) {
                    return Err(AssemblyError::DanglingReference {
                        from: id.clone(),
                        target,
                    });
                }
            }
            for target in &resource.depends_on {
                if !self.resources.contains_key(target) {
                    return Err(AssemblyError::DanglingReference {
                        from: id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        for (name, output) in &self.outputs {
            let value = serde_json::to_value(&output.value)
                .map_err(|e| AssemblyError::serialization(format!("output {name}"), e))?;
            let mut found = BTreeSet::new();
            collect_references(&value, &mut found);
            if let Some(target) = found.into_iter().find(|t| !self.is_resolvable(t)) {
                return Err(AssemblyError::DanglingReference {
                    from: format!("Outputs.{name}"),
                    target,
                });
            }
        }

        Ok(())
    }

    fn is_resolvable(&self, target: &str) -> bool {
        self.resources.contains_key(target)
            || self.parameters.contains_key(target)
            || PSEUDO_PARAMETERS.contains(&target)
    }

    /// Renders the template as pretty-printed JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, AssemblyError> {
        let mut rendered = serde_json::to_string_pretty(self)
            .map_err(|e| AssemblyError::serialization("template", e))?;
        rendered.push('\n');
        Ok(rendered)
    }

    /// Renders the template as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, AssemblyError> {
        serde_yaml::to_string(self).map_err(|e| AssemblyError::serialization("template", e))
    }

    /// Parses a previously rendered JSON template.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a template.
    pub fn from_json(text: &str) -> Result<Self, AssemblyError> {
        serde_json::from_str(text).map_err(|e| AssemblyError::serialization("template", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Template {
        let mut template = Template::new();
        template
            .add_resource("Errors", Resource::new("AWS::SNS::Topic"))
            .unwrap();
        template
            .add_resource(
                "ErrorsSub",
                Resource::new("AWS::SNS::Subscription").with_properties(json!({
                    "Protocol": "email",
                    "TopicArn": { "Ref": "Errors" },
                    "Endpoint": "ops@example.com",
                })),
            )
            .unwrap();
        template
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let value = serde_json::to_value(Template::new()).unwrap();
        assert_eq!(
            value,
            json!({ "AWSTemplateFormatVersion": "2010-09-09", "Resources": {} })
        );

        let value = serde_json::to_value(Resource::new("AWS::SNS::Topic")).unwrap();
        assert_eq!(value, json!({ "Type": "AWS::SNS::Topic" }));
    }

    #[test]
    fn test_duplicate_logical_id() {
        let mut template = sample();
        let err = template
            .add_resource("Errors", Resource::new("AWS::SNS::Topic"))
            .unwrap_err();
        assert!(matches!(err, AssemblyError::DuplicateLogicalId { .. }));
    }

    #[test]
    fn test_references() {
        let template = sample();
        let refs = template.references_of("ErrorsSub");
        assert_eq!(refs.into_iter().collect::<Vec<_>>(), vec!["Errors"]);
        assert!(template.references_of("Errors").is_empty());
    }

    #[test]
    fn test_get_att_reference() {
        let resource = Resource::new("AWS::Lambda::Function").with_properties(json!({
            "Role": { "Fn::GetAtt": ["Role", "Arn"] },
            "Environment": { "Variables": { "TABLE_NAME": { "Ref": "table" } } },
        }));
        let refs = resource.references();
        assert!(refs.contains("Role"));
        assert!(refs.contains("table"));
    }

    #[test]
    fn test_verify_dangling_reference() {
        let mut template = sample();
        assert!(template.verify().is_ok());

        template
            .add_resource(
                "Alarm",
                Resource::new("AWS::CloudWatch::Alarm").with_properties(json!({
                    "AlarmActions": [{ "Ref": "Missing" }],
                })),
            )
            .unwrap();
        let err = template.verify().unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::DanglingReference { ref from, ref target } if from == "Alarm" && target == "Missing"
        ));
    }

    #[test]
    fn test_verify_accepts_pseudo_parameters_and_parameters() {
        let mut template = Template::new();
        template
            .add_parameter("CodeBucket", Parameter::string("bucket"))
            .unwrap();
        template
            .add_resource(
                "Fn",
                Resource::new("AWS::Lambda::Function").with_properties(json!({
                    "Code": { "S3Bucket": { "Ref": "CodeBucket" } },
                    "Region": { "Ref": "AWS::Region" },
                })),
            )
            .unwrap();
        assert!(template.verify().is_ok());
    }

    #[test]
    fn test_verify_depends_on() {
        let mut template = Template::new();
        template
            .add_resource("Fn", Resource::new("AWS::Lambda::Function").depends_on("Role"))
            .unwrap();
        assert!(template.verify().is_err());
    }

    #[test]
    fn test_json_roundtrip_preserves_document() {
        let template = sample();
        let rendered = template.to_json_pretty().unwrap();
        assert_eq!(Template::from_json(&rendered).unwrap(), template);
    }

    #[test]
    fn test_resources_of_type() {
        let template = sample();
        assert_eq!(template.resources_of_type("AWS::SNS::Subscription").len(), 1);
        assert_eq!(template.count_of_type("AWS::SNS::Topic"), 1);
        assert_eq!(template.count_of_type("AWS::Lambda::Function"), 0);
    }

    #[test]
    fn test_from_properties_requires_object() {
        let result = Resource::from_properties("AWS::SNS::Topic", &"not an object");
        assert!(result.is_err());
    }
}
