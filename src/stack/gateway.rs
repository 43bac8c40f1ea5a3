//! The HTTP entry point.
//!
//! One REST API with a single `/applications` resource carrying two routes:
//! `PUT` writes straight into the table through a service integration, and
//! `POST` hands the request to the function. Both validate their body against
//! a draft-04 model and map the backend reply onto a fixed set of statuses.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;

use crate::error::AssemblyError;
use crate::template::{ConstructPath, Expr, Output, Resource, TokenizedJson};

use super::Stack;
use super::compute::FunctionHandle;
use super::iam::{self, PolicyStatement};
use super::storage::TableHandle;

/// REST API resource type.
pub const REST_API_TYPE: &str = "AWS::ApiGateway::RestApi";

/// API method resource type.
pub const METHOD_TYPE: &str = "AWS::ApiGateway::Method";

/// API path resource type.
pub const API_RESOURCE_TYPE: &str = "AWS::ApiGateway::Resource";

/// Lambda permission resource type.
pub const PERMISSION_TYPE: &str = "AWS::Lambda::Permission";

/// Name of the REST API, also the `ApiName` metric dimension.
pub const API_NAME: &str = "api_application_metrics";

/// Deployment stage.
pub const STAGE_NAME: &str = "prod";

/// Path part of the routed resource.
pub const RESOURCE_PATH_PART: &str = "applications";

const JSON_CONTENT_TYPE: &str = "application/json";

const JSON_SCHEMA_DRAFT4: &str = "http://json-schema.org/draft-04/schema#";

const SUCCESS_BODY: &str = r#"{"state": "Success", "message": "Updated items."}"#;

const FAILURE_BODY: &str = r#"{"state": "Fail", "message": "Error, please contact the admin."}"#;

const POST_SUCCESS_BODY: &str = r#"{"counts":$util.parseJson($input.json('$.response'))}"#;

const POST_VALIDATION_BODY: &str =
    r#" {"state": "Fail","message": "$util.parseJson($input.path('$.errorMessage')).message"} "#;

/// Statuses the `PUT` integration maps, with their selection patterns.
const PUT_ERROR_STATUSES: &[(&str, &str)] = &[
    ("400", ".*400.*"),
    ("401", ".*401.*"),
    ("403", ".*403.*"),
    ("404", ".*404.*"),
    ("413", ".*413.*"),
    ("429", ".*429.*"),
    ("500", r"5\d{2}"),
];

const CORS_RESPONSE_HEADERS: &[(&str, &str)] = &[
    ("Access-Control-Allow-Credentials", "'true'"),
    ("Access-Control-Allow-Origin", "'*'"),
    ("Content-Type", "'application/json'"),
];

const PREFLIGHT_RESPONSE_HEADERS: &[(&str, &str)] = &[
    (
        "Access-Control-Allow-Headers",
        "'Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token,X-Amz-User-Agent'",
    ),
    ("Access-Control-Allow-Methods", "'OPTIONS,GET,PUT,POST,DELETE,PATCH,HEAD'"),
    ("Access-Control-Allow-Origin", "'*'"),
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MethodProperties {
    http_method: &'static str,
    resource_id: Expr,
    rest_api_id: Expr,
    authorization_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_validator_id: Option<Expr>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    request_models: BTreeMap<&'static str, Expr>,
    integration: Integration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    method_responses: Vec<MethodResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Integration {
    #[serde(rename = "Type")]
    integration_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    integration_http_method: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credentials: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    passthrough_behavior: Option<&'static str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    request_templates: BTreeMap<&'static str, Expr>,
    integration_responses: Vec<IntegrationResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct IntegrationResponse {
    status_code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    selection_pattern: Option<&'static str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    response_templates: BTreeMap<&'static str, &'static str>,
    response_parameters: BTreeMap<String, &'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MethodResponse {
    status_code: &'static str,
    response_parameters: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    response_models: BTreeMap<&'static str, Expr>,
}

/// Handle to the entry point.
#[derive(Debug, Clone)]
pub struct ApiHandle {
    name: &'static str,
}

impl ApiHandle {
    /// Name used in the `ApiName` metric dimension.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Models referenced by the routes.
struct Models {
    put_request: String,
    post_request: String,
    put_response: String,
    post_response: String,
    error_response: String,
}

fn api_path(components: &[&str]) -> ConstructPath {
    let mut path = ConstructPath::new(&[API_NAME]);
    for component in components {
        path = path.child(component);
    }
    path
}

fn header_key(header: &str) -> String {
    format!("method.response.header.{header}")
}

fn integration_headers(headers: &[(&str, &'static str)]) -> BTreeMap<String, &'static str> {
    headers
        .iter()
        .map(|(name, value)| (header_key(name), *value))
        .collect()
}

fn method_headers(headers: &[(&str, &'static str)]) -> BTreeMap<String, bool> {
    headers
        .iter()
        .map(|(name, _)| (header_key(name), true))
        .collect()
}

fn json_model(model_id: &str) -> BTreeMap<&'static str, Expr> {
    [(JSON_CONTENT_TYPE, Expr::reference(model_id))].into_iter().collect()
}

fn json_template(body: &'static str) -> BTreeMap<&'static str, &'static str> {
    [(JSON_CONTENT_TYPE, body)].into_iter().collect()
}

/// Adds the REST API with its stage, models, validator and both routes.
pub(super) fn add_api(
    stack: &mut Stack,
    table: &TableHandle,
    function: &FunctionHandle,
) -> Result<ApiHandle, AssemblyError> {
    let rest_api_id = stack.add(
        &api_path(&["Resource"]),
        Resource::new(REST_API_TYPE).with_properties(json!({ "Name": API_NAME })),
    )?;
    let rest_api = Expr::reference(&rest_api_id);

    add_account(stack, &rest_api_id)?;

    let resource_id = stack.add(
        &api_path(&["Default", RESOURCE_PATH_PART, "Resource"]),
        Resource::from_properties(
            API_RESOURCE_TYPE,
            &json!({
                "ParentId": Expr::get_att(&rest_api_id, "RootResourceId"),
                "PathPart": RESOURCE_PATH_PART,
                "RestApiId": rest_api,
            }),
        )?,
    )?;

    let validator_id = stack.add(
        &api_path(&["DefaultValidator", "Resource"]),
        Resource::from_properties(
            "AWS::ApiGateway::RequestValidator",
            &json!({ "RestApiId": rest_api, "ValidateRequestBody": true }),
        )?,
    )?;

    let models = add_models(stack, &rest_api)?;

    let mut methods = vec![
        add_preflight(
            stack,
            &api_path(&["Default", "OPTIONS"]),
            Expr::get_att(&rest_api_id, "RootResourceId"),
            &rest_api,
        )?,
        add_preflight(
            stack,
            &api_path(&["Default", RESOURCE_PATH_PART, "OPTIONS"]),
            Expr::reference(&resource_id),
            &rest_api,
        )?,
    ];

    methods.push(add_put_route(stack, table, &rest_api, &resource_id, &validator_id, &models)?);
    methods.push(add_post_route(stack, function, &rest_api, &resource_id, &validator_id, &models)?);

    let mut deployment = Resource::new("AWS::ApiGateway::Deployment").with_properties(json!({
        "RestApiId": rest_api,
        "Description": "Automatically created by the RestApi construct",
    }));
    for dependency in methods
        .iter()
        .chain([&resource_id, &validator_id])
        .chain(models.all())
    {
        deployment = deployment.depends_on(dependency.as_str());
    }
    let deployment_id = stack.add(&api_path(&["Deployment", "Resource"]), deployment)?;

    let stage_component = format!("DeploymentStage.{STAGE_NAME}");
    let stage_id = stack.add(
        &api_path(&[stage_component.as_str(), "Resource"]),
        Resource::from_properties(
            "AWS::ApiGateway::Stage",
            &json!({
                "RestApiId": rest_api,
                "DeploymentId": Expr::reference(&deployment_id),
                "StageName": STAGE_NAME,
                "TracingEnabled": true,
                "MethodSettings": [{
                    "DataTraceEnabled": true,
                    "HttpMethod": "*",
                    "LoggingLevel": "INFO",
                    "MetricsEnabled": true,
                    "ResourcePath": "/*",
                }],
            }),
        )?,
    )?;

    add_invoke_permissions(stack, function, &rest_api_id, &stage_id)?;

    stack.add_output(
        &api_path(&["Endpoint"]).logical_id(),
        Output::new(Expr::join(
            "",
            vec![
                Expr::literal("https://"),
                rest_api.clone(),
                Expr::literal(".execute-api."),
                Expr::region(),
                Expr::literal("."),
                Expr::url_suffix(),
                Expr::literal("/"),
                Expr::reference(&stage_id),
                Expr::literal("/"),
            ],
        )),
    )?;

    Ok(ApiHandle { name: API_NAME })
}

/// Account settings letting the API push logs to CloudWatch.
fn add_account(stack: &mut Stack, rest_api_id: &str) -> Result<(), AssemblyError> {
    let role = iam::service_role(
        stack,
        &api_path(&["CloudWatchRole"]),
        "apigateway.amazonaws.com",
        &["service-role/AmazonAPIGatewayPushToCloudWatchLogs"],
    )?;

    let account = Resource::from_properties(
        "AWS::ApiGateway::Account",
        &json!({ "CloudWatchRoleArn": role.arn() }),
    )?
    .depends_on(rest_api_id);
    stack.add(&api_path(&["Account"]), account)?;
    Ok(())
}

impl Models {
    fn all(&self) -> impl Iterator<Item = &String> {
        [
            &self.put_request,
            &self.post_request,
            &self.put_response,
            &self.post_response,
            &self.error_response,
        ]
        .into_iter()
    }
}

fn add_models(stack: &mut Stack, rest_api: &Expr) -> Result<Models, AssemblyError> {
    let non_empty_string = json!({ "type": "string", "minLength": 1 });
    let string = json!({ "type": "string" });

    let mut add = |name: &str,
                   properties: serde_json::Value,
                   required: &[&str]|
     -> Result<String, AssemblyError> {
        let mut schema = json!({
            "$schema": JSON_SCHEMA_DRAFT4,
            "title": name,
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        stack.add(
            &api_path(&[name, "Resource"]),
            Resource::from_properties(
                "AWS::ApiGateway::Model",
                &json!({
                    "RestApiId": rest_api,
                    "ContentType": JSON_CONTENT_TYPE,
                    "Name": name,
                    "Schema": schema,
                }),
            )?,
        )
    };

    Ok(Models {
        put_request: add(
            "PUTRequestModel",
            json!({
                "application": non_empty_string,
                "operation": non_empty_string,
                "currentMediaTime": { "type": "number", "minLength": 1 },
            }),
            &["application", "operation", "currentMediaTime"],
        )?,
        post_request: add(
            "POSTRequestModel",
            json!({
                "startDate": non_empty_string,
                "endDate": non_empty_string,
                "application": non_empty_string,
            }),
            &["startDate", "endDate", "application"],
        )?,
        put_response: add(
            "PUTResponseModel",
            json!({ "state": string, "message": string }),
            &[],
        )?,
        post_response: add(
            "POSTResponseModel",
            json!({ "counts": { "type": "object" } }),
            &[],
        )?,
        error_response: add(
            "ErrorResponseModel",
            json!({ "state": string, "message": string }),
            &[],
        )?,
    })
}

/// CORS preflight answered by a mock integration.
fn add_preflight(
    stack: &mut Stack,
    path: &ConstructPath,
    resource_id: Expr,
    rest_api: &Expr,
) -> Result<String, AssemblyError> {
    let props = MethodProperties {
        http_method: "OPTIONS",
        resource_id,
        rest_api_id: rest_api.clone(),
        authorization_type: "NONE",
        request_validator_id: None,
        request_models: BTreeMap::new(),
        integration: Integration {
            integration_type: "MOCK",
            integration_http_method: None,
            uri: None,
            credentials: None,
            passthrough_behavior: None,
            request_templates: [(JSON_CONTENT_TYPE, Expr::literal("{ statusCode: 200 }"))]
                .into_iter()
                .collect(),
            integration_responses: vec![IntegrationResponse {
                status_code: "204",
                selection_pattern: None,
                response_templates: BTreeMap::new(),
                response_parameters: integration_headers(PREFLIGHT_RESPONSE_HEADERS),
            }],
        },
        method_responses: vec![MethodResponse {
            status_code: "204",
            response_parameters: method_headers(PREFLIGHT_RESPONSE_HEADERS),
            response_models: BTreeMap::new(),
        }],
    };

    stack.add(
        &path.child("Resource"),
        Resource::from_properties(METHOD_TYPE, &props)?,
    )
}

/// `PUT /applications`: request mapped straight onto `PutItem`.
fn add_put_route(
    stack: &mut Stack,
    table: &TableHandle,
    rest_api: &Expr,
    resource_id: &str,
    validator_id: &str,
    models: &Models,
) -> Result<String, AssemblyError> {
    let role = iam::service_role(
        stack,
        &ConstructPath::new(&["ApiGatewayServiceRole"]),
        "apigateway.amazonaws.com",
        &[],
    )?;
    iam::default_policy(
        stack,
        &role,
        vec![PolicyStatement::allow(&["dynamodb:PutItem"], vec![table.arn()])],
    )?;

    let mut tokens = TokenizedJson::new();
    let table_name = tokens.token(table.name());
    let request_template = tokens.render(&json!({
        "TableName": table_name,
        "Item": {
            "application": { "S": "$util.escapeJavaScript($input.path('$').application)" },
            "operation": { "S": "$util.escapeJavaScript($input.path('$').operation)" },
            "current_media_time": { "N": "$input.path('$').currentMediaTime" },
            "source_ip": { "S": "$context.identity.sourceIp" },
            "user_agent": { "S": "$context.identity.userAgent" },
            "created_at": { "S": "$context.requestTime" },
        },
    }))?;

    let mut integration_responses = vec![IntegrationResponse {
        status_code: "200",
        selection_pattern: None,
        response_templates: json_template(SUCCESS_BODY),
        response_parameters: integration_headers(CORS_RESPONSE_HEADERS),
    }];
    let mut method_responses = vec![MethodResponse {
        status_code: "200",
        response_parameters: method_headers(CORS_RESPONSE_HEADERS),
        response_models: json_model(&models.put_response),
    }];
    for &(status, pattern) in PUT_ERROR_STATUSES {
        integration_responses.push(IntegrationResponse {
            status_code: status,
            selection_pattern: Some(pattern),
            response_templates: json_template(FAILURE_BODY),
            response_parameters: integration_headers(CORS_RESPONSE_HEADERS),
        });
        method_responses.push(MethodResponse {
            status_code: status,
            response_parameters: method_headers(CORS_RESPONSE_HEADERS),
            response_models: json_model(&models.error_response),
        });
    }

    let props = MethodProperties {
        http_method: "PUT",
        resource_id: Expr::reference(resource_id),
        rest_api_id: rest_api.clone(),
        authorization_type: "NONE",
        request_validator_id: Some(Expr::reference(validator_id)),
        request_models: json_model(&models.put_request),
        integration: Integration {
            integration_type: "AWS",
            integration_http_method: Some("POST"),
            uri: Some(Expr::join(
                "",
                vec![
                    Expr::literal("arn:"),
                    Expr::partition(),
                    Expr::literal(":apigateway:"),
                    Expr::region(),
                    Expr::literal(":dynamodb:action/PutItem"),
                ],
            )),
            credentials: Some(role.arn()),
            passthrough_behavior: Some("NEVER"),
            request_templates: [(JSON_CONTENT_TYPE, request_template)].into_iter().collect(),
            integration_responses,
        },
        method_responses,
    };

    stack.add(
        &api_path(&["Default", RESOURCE_PATH_PART, "PUT", "Resource"]),
        Resource::from_properties(METHOD_TYPE, &props)?,
    )
}

/// `POST /applications`: non-proxy invocation of the function.
fn add_post_route(
    stack: &mut Stack,
    function: &FunctionHandle,
    rest_api: &Expr,
    resource_id: &str,
    validator_id: &str,
    models: &Models,
) -> Result<String, AssemblyError> {
    let request_template = TokenizedJson::new().render(&json!({
        "start_date": "$util.escapeJavaScript($input.path('$').startDate)",
        "end_date": "$util.escapeJavaScript($input.path('$').endDate)",
        "application": "$util.escapeJavaScript($input.path('$').application)",
    }))?;

    let integration_responses = vec![
        IntegrationResponse {
            status_code: "200",
            selection_pattern: None,
            response_templates: json_template(POST_SUCCESS_BODY),
            response_parameters: integration_headers(CORS_RESPONSE_HEADERS),
        },
        IntegrationResponse {
            status_code: "400",
            selection_pattern: Some(".*ValidationException.*"),
            response_templates: json_template(POST_VALIDATION_BODY),
            response_parameters: integration_headers(CORS_RESPONSE_HEADERS),
        },
        IntegrationResponse {
            status_code: "500",
            selection_pattern: Some("(\n|.)+"),
            response_templates: json_template(FAILURE_BODY),
            response_parameters: integration_headers(CORS_RESPONSE_HEADERS),
        },
    ];

    let method_responses = [
        ("200", &models.post_response),
        ("400", &models.error_response),
        ("500", &models.error_response),
    ]
    .into_iter()
    .map(|(status, model)| MethodResponse {
        status_code: status,
        response_parameters: method_headers(CORS_RESPONSE_HEADERS),
        response_models: json_model(model),
    })
    .collect();

    let props = MethodProperties {
        http_method: "POST",
        resource_id: Expr::reference(resource_id),
        rest_api_id: rest_api.clone(),
        authorization_type: "NONE",
        request_validator_id: Some(Expr::reference(validator_id)),
        request_models: json_model(&models.post_request),
        integration: Integration {
            integration_type: "AWS",
            integration_http_method: Some("POST"),
            uri: Some(Expr::join(
                "",
                vec![
                    Expr::literal("arn:"),
                    Expr::partition(),
                    Expr::literal(":apigateway:"),
                    Expr::region(),
                    Expr::literal(":lambda:path/2015-03-31/functions/"),
                    function.arn(),
                    Expr::literal("/invocations"),
                ],
            )),
            credentials: None,
            passthrough_behavior: Some("NEVER"),
            request_templates: [(JSON_CONTENT_TYPE, request_template)].into_iter().collect(),
            integration_responses,
        },
        method_responses,
    };

    stack.add(
        &api_path(&["Default", RESOURCE_PATH_PART, "POST", "Resource"]),
        Resource::from_properties(METHOD_TYPE, &props)?,
    )
}

/// Lets the deployed stage and the console test stage invoke the function.
fn add_invoke_permissions(
    stack: &mut Stack,
    function: &FunctionHandle,
    rest_api_id: &str,
    stage_id: &str,
) -> Result<(), AssemblyError> {
    let route = format!("/POST/{RESOURCE_PATH_PART}");
    let sources = [
        ("", Expr::reference(stage_id)),
        ("Test", Expr::literal("test-invoke-stage")),
    ];

    for (prefix, stage) in sources {
        let source_arn = Expr::join(
            "",
            vec![
                Expr::literal("arn:"),
                Expr::partition(),
                Expr::literal(":execute-api:"),
                Expr::region(),
                Expr::literal(":"),
                Expr::account(),
                Expr::literal(":"),
                Expr::reference(rest_api_id),
                Expr::literal("/"),
                stage,
                Expr::literal(route.as_str()),
            ],
        );

        let name = format!("ApiPermission.{prefix}{API_NAME}.POST..{RESOURCE_PATH_PART}");
        stack.add(
            &api_path(&["Default", RESOURCE_PATH_PART, "POST", name.as_str()]),
            Resource::from_properties(
                PERMISSION_TYPE,
                &json!({
                    "Action": "lambda:InvokeFunction",
                    "FunctionName": function.arn(),
                    "Principal": "apigateway.amazonaws.com",
                    "SourceArn": source_arn,
                }),
            )?,
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{compute, storage};
    use crate::template::Template;

    fn assembled() -> (Template, ApiHandle, TableHandle, FunctionHandle) {
        let mut stack = Stack::new("applicationmetrics");
        let table = storage::add_table(&mut stack).unwrap();
        let function = compute::add_function(&mut stack, &table).unwrap();
        let api = add_api(&mut stack, &table, &function).unwrap();
        (stack.into_template(), api, table, function)
    }

    fn method_id(template: &Template, http_method: &str) -> String {
        template
            .resources_of_type(METHOD_TYPE)
            .into_iter()
            .find(|(_, m)| m.properties["HttpMethod"] == json!(http_method))
            .map(|(id, _)| id.to_string())
            .unwrap()
    }

    #[test]
    fn test_two_routes_plus_preflight() {
        let (template, api, _, _) = assembled();
        let methods: Vec<&str> = template
            .resources_of_type(METHOD_TYPE)
            .into_iter()
            .filter_map(|(_, m)| m.properties["HttpMethod"].as_str())
            .collect();

        assert_eq!(methods.iter().filter(|m| **m == "OPTIONS").count(), 2);
        assert_eq!(methods.iter().filter(|m| **m != "OPTIONS").count(), 2);
        assert_eq!(template.count_of_type(REST_API_TYPE), 1);
        let (_, rest_api) = template.resources_of_type(REST_API_TYPE)[0];
        assert_eq!(rest_api.properties["Name"], json!(api.name()));
    }

    #[test]
    fn test_put_route_writes_table_directly() {
        let (template, _, table, function) = assembled();
        let put_id = method_id(&template, "PUT");
        let put = template.resource(&put_id).unwrap();
        let integration = &put.properties["Integration"];

        assert_eq!(integration["Type"], json!("AWS"));
        assert_eq!(integration["PassthroughBehavior"], json!("NEVER"));
        assert_eq!(
            integration["IntegrationResponses"].as_array().unwrap().len(),
            PUT_ERROR_STATUSES.len() + 1
        );

        let refs = template.references_of(&put_id);
        assert!(refs.contains(&table.logical_id));
        assert!(!refs.contains(&function.logical_id));
    }

    #[test]
    fn test_put_role_only_puts_items() {
        let (template, _, table, _) = assembled();
        let policies = template.resources_of_type(iam::POLICY_TYPE);
        let put_policy = policies
            .iter()
            .find(|(id, _)| id.starts_with("ApiGatewayServiceRoleDefaultPolicy"))
            .map(|(_, p)| p)
            .unwrap();

        assert_eq!(
            put_policy.properties["PolicyDocument"]["Statement"],
            json!([{
                "Action": ["dynamodb:PutItem"],
                "Effect": "Allow",
                "Resource": [{ "Fn::GetAtt": [table.logical_id, "Arn"] }],
            }])
        );
    }

    #[test]
    fn test_post_route_calls_function_only() {
        let (template, _, table, function) = assembled();
        let post_id = method_id(&template, "POST");
        let post = template.resource(&post_id).unwrap();
        let responses = post.properties["Integration"]["IntegrationResponses"]
            .as_array()
            .unwrap();

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[1]["SelectionPattern"], json!(".*ValidationException.*"));
        assert_eq!(responses[2]["StatusCode"], json!("500"));

        let refs = template.references_of(&post_id);
        assert!(refs.contains(&function.logical_id));
        assert!(!refs.contains(&table.logical_id));
    }

    #[test]
    fn test_stage_settings() {
        let (template, _, _, _) = assembled();
        let (_, stage) = template.resources_of_type("AWS::ApiGateway::Stage")[0];

        assert_eq!(stage.properties["StageName"], json!("prod"));
        assert_eq!(stage.properties["TracingEnabled"], json!(true));
        assert_eq!(stage.properties["MethodSettings"][0]["LoggingLevel"], json!("INFO"));
    }

    #[test]
    fn test_endpoint_output_and_permissions() {
        let (template, _, _, _) = assembled();
        assert_eq!(template.outputs.len(), 1);
        assert_eq!(template.count_of_type(PERMISSION_TYPE), 2);
        assert!(template.verify().is_ok());
    }
}
