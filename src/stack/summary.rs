//! Summary of an assembled template.

use serde::Serialize;
use serde_json::Value;

use crate::template::{Resource, Template};

use super::alerting::{SUBSCRIPTION_TYPE, TOPIC_TYPE};
use super::compute::FUNCTION_TYPE;
use super::gateway::{API_RESOURCE_TYPE, METHOD_TYPE, REST_API_TYPE};
use super::monitoring::{ALARM_TYPE, DASHBOARD_TYPE};
use super::storage::TABLE_TYPE;

/// An HTTP route of the entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    /// HTTP method.
    pub method: String,
    /// Resource path, e.g. `/applications`.
    pub path: String,
    /// Logical id of the method resource.
    pub logical_id: String,
}

/// What a template declares, by kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StackSummary {
    /// Total number of resources.
    pub resources: usize,
    /// Number of tables.
    pub tables: usize,
    /// Number of REST APIs.
    pub rest_apis: usize,
    /// Routes, excluding CORS preflight methods.
    pub routes: Vec<Route>,
    /// Number of functions.
    pub functions: usize,
    /// Alarm names.
    pub alarms: Vec<String>,
    /// Dashboard names.
    pub dashboards: Vec<String>,
    /// Number of alert topics.
    pub topics: usize,
    /// Subscribed endpoints, in logical id order.
    pub subscriptions: Vec<String>,
}

impl StackSummary {
    /// Summarizes a template.
    #[must_use]
    pub fn from_template(template: &Template) -> Self {
        let routes = template
            .resources_of_type(METHOD_TYPE)
            .into_iter()
            .filter_map(|(id, method)| {
                let http_method = method.property("HttpMethod")?.as_str()?;
                if http_method == "OPTIONS" {
                    return None;
                }
                Some(Route {
                    method: http_method.to_string(),
                    path: resource_path(template, method.property("ResourceId")),
                    logical_id: id.to_string(),
                })
            })
            .collect();

        Self {
            resources: template.resources.len(),
            tables: template.count_of_type(TABLE_TYPE),
            rest_apis: template.count_of_type(REST_API_TYPE),
            routes,
            functions: template.count_of_type(FUNCTION_TYPE),
            alarms: construct_names(template, ALARM_TYPE),
            dashboards: construct_names(template, DASHBOARD_TYPE),
            topics: template.count_of_type(TOPIC_TYPE),
            subscriptions: template
                .resources_of_type(SUBSCRIPTION_TYPE)
                .into_iter()
                .filter_map(|(_, r)| r.property("Endpoint")?.as_str().map(String::from))
                .collect(),
        }
    }
}

/// Construct names (first path component below the stack) of a type.
fn construct_names(template: &Template, resource_type: &str) -> Vec<String> {
    template
        .resources_of_type(resource_type)
        .into_iter()
        .map(|(id, r)| {
            r.construct_path()
                .and_then(|path| path.split('/').nth(1))
                .unwrap_or(id)
                .to_string()
        })
        .collect()
}

/// Walks `ParentId` links up to the API root.
fn resource_path(template: &Template, resource_id: Option<&Value>) -> String {
    let mut parts = Vec::new();
    let mut current = resource_id.and_then(referenced_resource(template));

    while let Some(resource) = current {
        if let Some(part) = resource.property("PathPart").and_then(Value::as_str) {
            parts.push(part);
        }
        current = resource.property("ParentId").and_then(referenced_resource(template));
    }

    parts.reverse();
    format!("/{}", parts.join("/"))
}

fn referenced_resource<'a>(template: &'a Template) -> impl Fn(&Value) -> Option<&'a Resource> + 'a {
    move |value| {
        let id = value.get("Ref")?.as_str()?;
        template
            .resource(id)
            .filter(|r| r.resource_type == API_RESOURCE_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::stack::assemble;

    #[test]
    fn test_summary_of_assembled_stack() {
        let template = assemble(&StackConfig::with_emails(["ops@example.com"])).unwrap();
        let summary = StackSummary::from_template(&template);

        let mut routes: Vec<String> = summary
            .routes
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect();
        routes.sort();
        assert_eq!(routes, ["POST /applications", "PUT /applications"]);

        assert_eq!(summary.alarms.len(), 8);
        assert!(summary.alarms.contains(&String::from("LambdaLogError")));
        assert_eq!(summary.dashboards.len(), 2);
        assert!(summary.dashboards.contains(&String::from("LambdaPOST")));
        assert_eq!(summary.subscriptions, ["ops@example.com"]);
    }
}
