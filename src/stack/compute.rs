//! The read-path function and its log metric filters.

use serde::Serialize;

use crate::error::AssemblyError;
use crate::template::{ConstructPath, Expr, Parameter, Resource};

use super::Stack;
use super::iam::{self, PolicyStatement};
use super::storage::{READ_ACTIONS, TableHandle};

/// Lambda function resource type.
pub const FUNCTION_TYPE: &str = "AWS::Lambda::Function";

/// Log metric filter resource type.
pub const METRIC_FILTER_TYPE: &str = "AWS::Logs::MetricFilter";

/// Function runtime.
pub const RUNTIME: &str = "python3.6";

/// Function entry point.
pub const HANDLER: &str = "function_post.handler";

/// Directory holding the function code.
pub const ASSET_PATH: &str = "lambdas/applications";

/// Parameter naming the bucket the function code is uploaded to.
pub const CODE_BUCKET_PARAMETER: &str = "FunctionCodeS3Bucket";

/// Parameter naming the key of the uploaded function code.
pub const CODE_KEY_PARAMETER: &str = "FunctionCodeS3Key";

/// Environment variable carrying the table name.
pub const TABLE_NAME_VARIABLE: &str = "TABLE_NAME";

/// Namespace of the metrics extracted from the function logs.
pub const LOG_METRIC_NAMESPACE: &str = "Lambdas";

/// Metric counting `[ERROR]` log lines.
pub const LOG_ERRORS_METRIC: &str = "LambdaErrors";

/// Metric carrying the memory used per invocation.
pub const LOG_MEMORY_METRIC: &str = "LambdaMemory";

/// Matches the runtime's `REPORT` line and names its fields.
const REPORT_LINE_PATTERN: &str = "[report=\"REPORT\", request_id_name, request_id_value, duration_name, duration_value, duration_unit, duration_billed_name, duration_billed_name_2, duration_billed_value, duration_billed_unit, memory_max_name, memory_max_name_2, memory_max_value, memory_max_unit, memory_used_name, memory_used_name_2, memory_used_name_3, memory_used_value, memory_used_unit]";

const XRAY_ACTIONS: &[&str] = &["xray:PutTraceSegments", "xray:PutTelemetryRecords"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FunctionProperties {
    code: FunctionCode,
    handler: &'static str,
    role: Expr,
    runtime: &'static str,
    environment: FunctionEnvironment,
    tracing_config: TracingConfig,
}

#[derive(Debug, Serialize)]
struct FunctionCode {
    #[serde(rename = "S3Bucket")]
    s3_bucket: Expr,
    #[serde(rename = "S3Key")]
    s3_key: Expr,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FunctionEnvironment {
    variables: std::collections::BTreeMap<&'static str, Expr>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TracingConfig {
    mode: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MetricFilterProperties {
    filter_pattern: String,
    log_group_name: Expr,
    metric_transformations: Vec<MetricTransformation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MetricTransformation {
    metric_name: &'static str,
    metric_namespace: &'static str,
    metric_value: &'static str,
    default_value: f64,
}

/// Handle to the function.
#[derive(Debug, Clone)]
pub struct FunctionHandle {
    /// Logical id of the function.
    pub logical_id: String,
    /// Logical id of the execution role.
    pub role_id: String,
}

impl FunctionHandle {
    /// Function name (`Ref`).
    #[must_use]
    pub fn name(&self) -> Expr {
        Expr::reference(&self.logical_id)
    }

    /// Function ARN.
    #[must_use]
    pub fn arn(&self) -> Expr {
        Expr::get_att(&self.logical_id, "Arn")
    }

    /// Name of the log group the runtime writes to.
    #[must_use]
    pub fn log_group_name(&self) -> Expr {
        Expr::join("", vec![Expr::literal("/aws/lambda/"), self.name()])
    }
}

/// Adds the function, its role and read grant on the table, and the two log
/// metric filters.
pub(super) fn add_function(
    stack: &mut Stack,
    table: &TableHandle,
) -> Result<FunctionHandle, AssemblyError> {
    stack.add_parameter(
        CODE_BUCKET_PARAMETER,
        Parameter::string(format!("S3 bucket holding the code of {ASSET_PATH}")),
    )?;
    stack.add_parameter(
        CODE_KEY_PARAMETER,
        Parameter::string(format!("S3 key of the zipped {ASSET_PATH}")),
    )?;

    let path = ConstructPath::new(&["post"]);
    let role = iam::service_role(
        stack,
        &path.child("ServiceRole"),
        "lambda.amazonaws.com",
        &["service-role/AWSLambdaBasicExecutionRole"],
    )?;
    let policy_id = iam::default_policy(
        stack,
        &role,
        vec![
            PolicyStatement::allow(XRAY_ACTIONS, vec![Expr::literal("*")]),
            PolicyStatement::allow(READ_ACTIONS, vec![table.arn()]),
        ],
    )?;

    let props = FunctionProperties {
        code: FunctionCode {
            s3_bucket: Expr::reference(CODE_BUCKET_PARAMETER),
            s3_key: Expr::reference(CODE_KEY_PARAMETER),
        },
        handler: HANDLER,
        role: role.arn(),
        runtime: RUNTIME,
        environment: FunctionEnvironment {
            variables: [(TABLE_NAME_VARIABLE, table.name())].into_iter().collect(),
        },
        tracing_config: TracingConfig { mode: "Active" },
    };

    let resource = Resource::from_properties(FUNCTION_TYPE, &props)?
        .depends_on(&role.logical_id)
        .depends_on(policy_id)
        .with_metadata("aws:asset:path", ASSET_PATH)
        .with_metadata("aws:asset:property", "Code");
    let logical_id = stack.add(&path.child("Resource"), resource)?;

    let function = FunctionHandle {
        logical_id,
        role_id: role.logical_id,
    };

    add_metric_filter(
        stack,
        "LambdaLogErrorReport",
        &function,
        String::from("\"[ERROR]\""),
        LOG_ERRORS_METRIC,
        "1",
    )?;
    add_metric_filter(
        stack,
        "LambdaLogMemoryUsage",
        &function,
        String::from(REPORT_LINE_PATTERN),
        LOG_MEMORY_METRIC,
        "$memory_used_value",
    )?;

    Ok(function)
}

fn add_metric_filter(
    stack: &mut Stack,
    name: &str,
    function: &FunctionHandle,
    filter_pattern: String,
    metric_name: &'static str,
    metric_value: &'static str,
) -> Result<String, AssemblyError> {
    let props = MetricFilterProperties {
        filter_pattern,
        log_group_name: function.log_group_name(),
        metric_transformations: vec![MetricTransformation {
            metric_name,
            metric_namespace: LOG_METRIC_NAMESPACE,
            metric_value,
            default_value: 0.0,
        }],
    };

    stack.add(
        &ConstructPath::new(&[name, "Resource"]),
        Resource::from_properties(METRIC_FILTER_TYPE, &props)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::storage;
    use serde_json::json;

    fn assembled() -> (crate::template::Template, FunctionHandle, TableHandle) {
        let mut stack = Stack::new("applicationmetrics");
        let table = storage::add_table(&mut stack).unwrap();
        let function = add_function(&mut stack, &table).unwrap();
        (stack.into_template(), function, table)
    }

    #[test]
    fn test_function_settings() {
        let (template, function, table) = assembled();
        let resource = template.resource(&function.logical_id).unwrap();

        assert_eq!(resource.property("Runtime"), Some(&json!("python3.6")));
        assert_eq!(resource.property("Handler"), Some(&json!("function_post.handler")));
        assert_eq!(resource.property("TracingConfig"), Some(&json!({ "Mode": "Active" })));
        assert_eq!(
            resource.property("Environment"),
            Some(&json!({ "Variables": { "TABLE_NAME": { "Ref": table.logical_id } } }))
        );
        assert!(resource.depends_on.contains(&function.role_id));
    }

    #[test]
    fn test_read_grant_covers_table() {
        let (template, function, table) = assembled();
        let (_, policy) = template
            .resources_of_type(iam::POLICY_TYPE)
            .into_iter()
            .next()
            .unwrap();

        let statements = policy.properties["PolicyDocument"]["Statement"].as_array().unwrap();
        let read = statements
            .iter()
            .find(|s| s["Resource"] == json!([{ "Fn::GetAtt": [table.logical_id, "Arn"] }]))
            .unwrap();
        assert_eq!(read["Action"].as_array().unwrap().len(), READ_ACTIONS.len());
        assert!(!read["Action"].as_array().unwrap().contains(&json!("dynamodb:PutItem")));
        assert_eq!(policy.properties["Roles"], json!([{ "Ref": function.role_id }]));
    }

    #[test]
    fn test_metric_filters() {
        let (template, function, _) = assembled();
        let filters = template.resources_of_type(METRIC_FILTER_TYPE);
        assert_eq!(filters.len(), 2);

        for (_, filter) in filters {
            assert_eq!(
                filter.properties["LogGroupName"],
                json!({ "Fn::Join": ["", ["/aws/lambda/", { "Ref": function.logical_id }]] })
            );
            assert_eq!(
                filter.properties["MetricTransformations"][0]["MetricNamespace"],
                json!("Lambdas")
            );
        }
    }

    #[test]
    fn test_code_parameters_declared() {
        let (template, _, _) = assembled();
        assert!(template.parameters.contains_key(CODE_BUCKET_PARAMETER));
        assert!(template.parameters.contains_key(CODE_KEY_PARAMETER));
    }
}
