//! The metrics table.

use serde::Serialize;

use crate::error::AssemblyError;
use crate::template::{ConstructPath, Expr, Resource};

use super::Stack;

/// DynamoDB table resource type.
pub const TABLE_TYPE: &str = "AWS::DynamoDB::Table";

/// Partition key attribute.
pub const PARTITION_KEY: &str = "application";

/// Sort key attribute.
pub const SORT_KEY: &str = "created_at";

/// Actions granted to readers of the table.
pub const READ_ACTIONS: &[&str] = &[
    "dynamodb:BatchGetItem",
    "dynamodb:GetRecords",
    "dynamodb:GetShardIterator",
    "dynamodb:Query",
    "dynamodb:GetItem",
    "dynamodb:Scan",
    "dynamodb:ConditionCheckItem",
    "dynamodb:DescribeTable",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TableProperties {
    key_schema: Vec<KeySchemaElement>,
    attribute_definitions: Vec<AttributeDefinition>,
    billing_mode: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct KeySchemaElement {
    attribute_name: &'static str,
    key_type: KeyType,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "UPPERCASE")]
enum KeyType {
    Hash,
    Range,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeDefinition {
    attribute_name: &'static str,
    attribute_type: &'static str,
}

/// Handle to the table.
#[derive(Debug, Clone)]
pub struct TableHandle {
    /// Logical id of the table.
    pub logical_id: String,
}

impl TableHandle {
    /// Table name (`Ref`).
    #[must_use]
    pub fn name(&self) -> Expr {
        Expr::reference(&self.logical_id)
    }

    /// Table ARN.
    #[must_use]
    pub fn arn(&self) -> Expr {
        Expr::get_att(&self.logical_id, "Arn")
    }
}

/// Adds the table: string partition and sort keys, on-demand billing, no
/// secondary indexes.
pub(super) fn add_table(stack: &mut Stack) -> Result<TableHandle, AssemblyError> {
    let props = TableProperties {
        key_schema: vec![
            KeySchemaElement {
                attribute_name: PARTITION_KEY,
                key_type: KeyType::Hash,
            },
            KeySchemaElement {
                attribute_name: SORT_KEY,
                key_type: KeyType::Range,
            },
        ],
        attribute_definitions: vec![
            AttributeDefinition {
                attribute_name: PARTITION_KEY,
                attribute_type: "S",
            },
            AttributeDefinition {
                attribute_name: SORT_KEY,
                attribute_type: "S",
            },
        ],
        billing_mode: "PAY_PER_REQUEST",
    };

    let resource = Resource::from_properties(TABLE_TYPE, &props)?.retained();
    let logical_id = stack.add(&ConstructPath::new(&["table", "Resource"]), resource)?;

    Ok(TableHandle { logical_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_keys() {
        let mut stack = Stack::new("applicationmetrics");
        let table = add_table(&mut stack).unwrap();
        let template = stack.into_template();
        let resource = template.resource(&table.logical_id).unwrap();

        assert_eq!(
            resource.property("KeySchema"),
            Some(&json!([
                { "AttributeName": "application", "KeyType": "HASH" },
                { "AttributeName": "created_at", "KeyType": "RANGE" },
            ]))
        );
        assert_eq!(resource.property("BillingMode"), Some(&json!("PAY_PER_REQUEST")));
        assert!(resource.property("GlobalSecondaryIndexes").is_none());
        assert_eq!(resource.deletion_policy.as_deref(), Some("Retain"));
    }
}
