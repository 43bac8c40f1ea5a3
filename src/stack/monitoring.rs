//! Alarms and dashboards.
//!
//! Every alarm watches one signal of the function, the API or the table and
//! notifies the alarm topic. Dashboards are laid out row by row on the
//! 24-column grid; each row starts below the tallest widget of the previous
//! one.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::AssemblyError;
use crate::template::{ConstructPath, Expr, Resource, TokenizedJson};

use super::Stack;
use super::alerting::TopicHandle;
use super::compute::{FunctionHandle, LOG_ERRORS_METRIC, LOG_MEMORY_METRIC, LOG_METRIC_NAMESPACE};
use super::gateway::ApiHandle;
use super::storage::TableHandle;

/// Alarm resource type.
pub const ALARM_TYPE: &str = "AWS::CloudWatch::Alarm";

/// Dashboard resource type.
pub const DASHBOARD_TYPE: &str = "AWS::CloudWatch::Dashboard";

/// Period every alarm evaluates over.
pub const ALARM_PERIOD_SECS: u32 = 60;

/// Width of the dashboard grid.
pub const GRID_WIDTH: u32 = 24;

const GRAPH_HEIGHT: u32 = 6;

const SINGLE_VALUE_HEIGHT: u32 = 3;

/// Aggregation applied to a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Statistic {
    /// Number of data points.
    SampleCount,
    /// Mean value.
    Average,
    /// Sum of values.
    Sum,
    /// Lowest value.
    Minimum,
    /// Highest value.
    Maximum,
}

/// How the statistic is compared with the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonOperator {
    /// `>`.
    GreaterThanThreshold,
    /// `>=`.
    GreaterThanOrEqualToThreshold,
    /// `<`.
    LessThanThreshold,
    /// `<=`.
    LessThanOrEqualToThreshold,
}

/// How periods without data are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TreatMissingData {
    /// Missing data breaches the threshold.
    Breaching,
    /// Missing data is within the threshold.
    NotBreaching,
    /// The alarm keeps its current state.
    Ignore,
    /// The alarm looks further back for data.
    Missing,
}

/// A metric and the statistic applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    namespace: &'static str,
    name: &'static str,
    dimensions: Vec<(&'static str, Expr)>,
    statistic: Statistic,
}

impl Metric {
    /// A metric averaged over the period.
    #[must_use]
    pub const fn new(namespace: &'static str, name: &'static str) -> Self {
        Self {
            namespace,
            name,
            dimensions: Vec::new(),
            statistic: Statistic::Average,
        }
    }

    /// Adds a dimension.
    #[must_use]
    pub fn with_dimension(mut self, name: &'static str, value: Expr) -> Self {
        self.dimensions.push((name, value));
        self
    }

    /// Replaces the statistic.
    #[must_use]
    pub fn with_statistic(mut self, statistic: Statistic) -> Self {
        self.statistic = statistic;
        self
    }

    fn lambda(function: &FunctionHandle, name: &'static str, statistic: Statistic) -> Self {
        Self::new("AWS/Lambda", name)
            .with_dimension("FunctionName", function.name())
            .with_statistic(statistic)
    }

    fn api_gateway(api: &ApiHandle, name: &'static str) -> Self {
        Self::new("AWS/ApiGateway", name).with_dimension("ApiName", Expr::literal(api.name()))
    }

    /// Renders the metric as a dashboard metric array.
    fn render(&self, tokens: &mut TokenizedJson, options: Value) -> Value {
        let mut parts = vec![json!(self.namespace), json!(self.name)];
        for (name, value) in &self.dimensions {
            parts.push(json!(name));
            parts.push(match value.as_literal() {
                Some(text) => json!(text),
                None => json!(tokens.token(value.clone())),
            });
        }
        parts.push(options);
        Value::Array(parts)
    }
}

/// One alarm and the constants it is built from.
#[derive(Debug, Clone)]
pub struct AlarmSpec {
    /// Construct name.
    pub name: &'static str,
    /// Human description.
    pub description: Option<&'static str>,
    /// Watched metric.
    pub metric: Metric,
    /// Threshold compared with the statistic.
    pub threshold: f64,
    /// Comparison operator.
    pub comparison: ComparisonOperator,
    /// Consecutive periods that must breach.
    pub evaluation_periods: u32,
    /// Period in seconds.
    pub period_secs: u32,
    /// Treatment of missing data.
    pub treat_missing: TreatMissingData,
}

impl AlarmSpec {
    fn breach_above(name: &'static str, metric: Metric, threshold: f64) -> Self {
        Self {
            name,
            description: None,
            metric,
            threshold,
            comparison: ComparisonOperator::GreaterThanThreshold,
            evaluation_periods: 1,
            period_secs: ALARM_PERIOD_SECS,
            treat_missing: TreatMissingData::NotBreaching,
        }
    }

    const fn described(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    /// Checks the embedded constants.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::InvalidConstant`] for a non-finite threshold,
    /// zero evaluation periods, or a period that is not a multiple of 60.
    pub fn validate(&self) -> Result<(), AssemblyError> {
        if !self.threshold.is_finite() {
            return Err(AssemblyError::invalid_constant(
                self.name,
                format!("threshold {} is not finite", self.threshold),
            ));
        }
        if self.evaluation_periods == 0 {
            return Err(AssemblyError::invalid_constant(
                self.name,
                "evaluation periods must be at least 1",
            ));
        }
        if self.period_secs == 0 || self.period_secs % 60 != 0 {
            return Err(AssemblyError::invalid_constant(
                self.name,
                format!("period {}s is not a positive multiple of 60", self.period_secs),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AlarmProperties {
    actions_enabled: bool,
    alarm_actions: Vec<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alarm_description: Option<&'static str>,
    comparison_operator: ComparisonOperator,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dimensions: Vec<Dimension>,
    evaluation_periods: u32,
    metric_name: &'static str,
    namespace: &'static str,
    period: u32,
    statistic: Statistic,
    threshold: f64,
    treat_missing_data: TreatMissingData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Dimension {
    name: &'static str,
    value: Expr,
}

/// Resources whose signals are watched.
#[derive(Debug, Clone, Copy)]
pub struct Watched<'a> {
    /// The read-path function.
    pub function: &'a FunctionHandle,
    /// The entry point.
    pub api: &'a ApiHandle,
    /// The table.
    pub table: &'a TableHandle,
}

/// Handle to an alarm.
#[derive(Debug, Clone)]
pub struct AlarmHandle {
    /// Construct name.
    pub name: &'static str,
    /// Logical id.
    pub logical_id: String,
}

impl AlarmHandle {
    /// Alarm ARN.
    #[must_use]
    pub fn arn(&self) -> Expr {
        Expr::get_att(&self.logical_id, "Arn")
    }
}

/// The alarms of the stack.
fn alarm_specs(watched: Watched<'_>) -> Vec<AlarmSpec> {
    let Watched { function, api, table } = watched;

    vec![
        AlarmSpec::breach_above(
            "LambdaLogError",
            Metric::new(LOG_METRIC_NAMESPACE, LOG_ERRORS_METRIC),
            0.0,
        )
        .described("Looks for logs reported as errors and reports if any is found."),
        AlarmSpec::breach_above(
            "LambdaLogMemory",
            Metric::new(LOG_METRIC_NAMESPACE, LOG_MEMORY_METRIC).with_statistic(Statistic::Maximum),
            110.0,
        )
        .described("Reads memory usage in MB reported in logs and reports if too high."),
        AlarmSpec {
            comparison: ComparisonOperator::GreaterThanOrEqualToThreshold,
            treat_missing: TreatMissingData::Ignore,
            ..AlarmSpec::breach_above(
                "LambdaDuration",
                Metric::lambda(function, "Duration", Statistic::Maximum),
                1000.0,
            )
        }
        .described("Uses AWS metrics to graph duration for the Lambda function."),
        AlarmSpec::breach_above(
            "LambdaError",
            Metric::lambda(function, "Errors", Statistic::Maximum),
            0.0,
        )
        .described("Uses AWS metrics to count errors for the Lambda function."),
        AlarmSpec::breach_above(
            "LambdaThrottles",
            Metric::lambda(function, "Throttles", Statistic::Sum),
            0.0,
        )
        .described("Counts throttled invocations of the Lambda function."),
        AlarmSpec::breach_above("ApiGateway4XXError", Metric::api_gateway(api, "4XXError"), 0.0),
        AlarmSpec::breach_above("ApiGateway5XXError", Metric::api_gateway(api, "5XXError"), 0.0),
        AlarmSpec::breach_above(
            "TableWriteThrottles",
            Metric::new("AWS/DynamoDB", "WriteThrottleEvents")
                .with_dimension("TableName", table.name())
                .with_statistic(Statistic::Sum),
            0.0,
        )
        .described("Counts write requests throttled by the table."),
    ]
}

/// Adds every alarm, each notifying `topic`.
pub(super) fn add_alarms(
    stack: &mut Stack,
    watched: Watched<'_>,
    topic: &TopicHandle,
) -> Result<Vec<AlarmHandle>, AssemblyError> {
    alarm_specs(watched)
        .into_iter()
        .map(|spec| add_alarm(stack, spec, topic))
        .collect()
}

fn add_alarm(
    stack: &mut Stack,
    spec: AlarmSpec,
    topic: &TopicHandle,
) -> Result<AlarmHandle, AssemblyError> {
    spec.validate()?;

    let metric = spec.metric;
    let props = AlarmProperties {
        actions_enabled: true,
        alarm_actions: vec![topic.arn()],
        alarm_description: spec.description,
        comparison_operator: spec.comparison,
        dimensions: metric
            .dimensions
            .into_iter()
            .map(|(name, value)| Dimension { name, value })
            .collect(),
        evaluation_periods: spec.evaluation_periods,
        metric_name: metric.name,
        namespace: metric.namespace,
        period: spec.period_secs,
        statistic: metric.statistic,
        threshold: spec.threshold,
        treat_missing_data: spec.treat_missing,
    };

    let logical_id = stack.add(
        &ConstructPath::new(&[spec.name, "Resource"]),
        Resource::from_properties(ALARM_TYPE, &props)?,
    )?;
    debug!(alarm = spec.name, %logical_id, "Added alarm");

    Ok(AlarmHandle {
        name: spec.name,
        logical_id,
    })
}

/// A metric drawn on a widget.
#[derive(Debug, Clone)]
struct Plot {
    metric: Metric,
    color: &'static str,
    label: Option<&'static str>,
}

impl Plot {
    const fn new(metric: Metric, color: &'static str) -> Self {
        Self {
            metric,
            color,
            label: None,
        }
    }

    const fn labelled(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    fn render(&self, tokens: &mut TokenizedJson) -> Value {
        let mut options = json!({ "color": self.color, "stat": self.metric.statistic });
        if let Some(label) = self.label {
            options["label"] = json!(label);
        }
        self.metric.render(tokens, options)
    }
}

/// A dashboard widget.
#[derive(Debug, Clone)]
enum Widget {
    Graph {
        title: &'static str,
        width: u32,
        plots: Vec<Plot>,
    },
    SingleValue {
        width: u32,
        plots: Vec<Plot>,
    },
    Alarm {
        title: &'static str,
        width: u32,
        alarm: Expr,
    },
}

impl Widget {
    const fn width(&self) -> u32 {
        match self {
            Self::Graph { width, .. } | Self::SingleValue { width, .. } | Self::Alarm { width, .. } => {
                *width
            }
        }
    }

    const fn height(&self) -> u32 {
        match self {
            Self::SingleValue { .. } => SINGLE_VALUE_HEIGHT,
            Self::Graph { .. } | Self::Alarm { .. } => GRAPH_HEIGHT,
        }
    }

    fn render(&self, tokens: &mut TokenizedJson, x: u32, y: u32) -> Value {
        let region = tokens.token(Expr::region());
        let properties = match self {
            Self::Graph { title, plots, .. } => {
                let metrics: Vec<Value> = plots.iter().map(|p| p.render(tokens)).collect();
                json!({
                    "view": "timeSeries",
                    "title": title,
                    "region": region,
                    "metrics": metrics,
                    "yAxis": {},
                })
            }
            Self::SingleValue { plots, .. } => {
                let metrics: Vec<Value> = plots.iter().map(|p| p.render(tokens)).collect();
                json!({
                    "view": "singleValue",
                    "region": region,
                    "metrics": metrics,
                })
            }
            Self::Alarm { title, alarm, .. } => {
                let alarm = tokens.token(alarm.clone());
                json!({
                    "title": title,
                    "region": region,
                    "annotations": { "alarms": [alarm] },
                    "yAxis": {},
                })
            }
        };

        json!({
            "type": "metric",
            "width": self.width(),
            "height": self.height(),
            "x": x,
            "y": y,
            "properties": properties,
        })
    }
}

/// A dashboard: rows of widgets.
#[derive(Debug, Clone)]
struct Dashboard {
    name: &'static str,
    rows: Vec<Vec<Widget>>,
}

impl Dashboard {
    fn validate(&self) -> Result<(), AssemblyError> {
        for (i, row) in self.rows.iter().enumerate() {
            let mut total = 0;
            for widget in row {
                let width = widget.width();
                if !(1..=GRID_WIDTH).contains(&width) {
                    return Err(AssemblyError::invalid_constant(
                        self.name,
                        format!("widget width {width} in row {i} is outside 1..={GRID_WIDTH}"),
                    ));
                }
                total += width;
            }
            if total > GRID_WIDTH {
                return Err(AssemblyError::invalid_constant(
                    self.name,
                    format!("row {i} is {total} columns wide, the grid has {GRID_WIDTH}"),
                ));
            }
        }
        Ok(())
    }

    fn body(&self) -> Result<Expr, AssemblyError> {
        let mut tokens = TokenizedJson::new();
        let mut widgets = Vec::new();
        let mut y = 0;

        for row in &self.rows {
            let mut x = 0;
            for widget in row {
                widgets.push(widget.render(&mut tokens, x, y));
                x += widget.width();
            }
            y += row.iter().map(Widget::height).max().unwrap_or(0);
        }

        tokens.render(&json!({ "widgets": widgets }))
    }
}

fn find_alarm<'a>(alarms: &'a [AlarmHandle], name: &str) -> Result<&'a AlarmHandle, AssemblyError> {
    alarms
        .iter()
        .find(|a| a.name == name)
        .ok_or_else(|| AssemblyError::invalid_constant(name, "dashboard refers to an unknown alarm"))
}

fn alarm_widget(
    alarms: &[AlarmHandle],
    title: &'static str,
    name: &str,
    width: u32,
) -> Result<Widget, AssemblyError> {
    Ok(Widget::Alarm {
        title,
        width,
        alarm: find_alarm(alarms, name)?.arn(),
    })
}

fn spread(metric: &Metric) -> Vec<Plot> {
    [
        ("Maximum", "#ff4d4d", Statistic::Maximum),
        ("Minimum", "#5cd65c", Statistic::Minimum),
        ("Average", "#ff8000", Statistic::Average),
    ]
    .into_iter()
    .map(|(label, color, statistic)| {
        Plot::new(metric.clone().with_statistic(statistic), color).labelled(label)
    })
    .collect()
}

fn dashboards(watched: Watched<'_>, alarms: &[AlarmHandle]) -> Result<Vec<Dashboard>, AssemblyError> {
    let Watched { function, api, .. } = watched;
    let log_errors = Metric::new(LOG_METRIC_NAMESPACE, LOG_ERRORS_METRIC);
    let memory = Metric::new(LOG_METRIC_NAMESPACE, LOG_MEMORY_METRIC);
    let duration = Metric::lambda(function, "Duration", Statistic::Average);
    let errors = Metric::lambda(function, "Errors", Statistic::Sum);

    let api_dashboard = Dashboard {
        name: "ApiGateway",
        rows: vec![
            vec![Widget::Graph {
                title: "HTTP Errors",
                width: 24,
                plots: vec![
                    Plot::new(Metric::api_gateway(api, "4XXError"), "#ff8000"),
                    Plot::new(Metric::api_gateway(api, "5XXError"), "#ff4d4d"),
                ],
            }],
            vec![
                alarm_widget(alarms, "4xxErrorAlarms", "ApiGateway4XXError", 12)?,
                alarm_widget(alarms, "5xxErrorAlarms", "ApiGateway5XXError", 12)?,
            ],
        ],
    };

    let function_dashboard = Dashboard {
        name: "LambdaPOST",
        rows: vec![
            vec![Widget::SingleValue {
                width: 24,
                plots: vec![
                    Plot::new(Metric::lambda(function, "Invocations", Statistic::Sum), "#0052cc"),
                    Plot::new(errors.clone(), "#ff3333"),
                    Plot::new(Metric::lambda(function, "Throttles", Statistic::Sum), "#ffff1a"),
                    Plot::new(duration.clone().with_statistic(Statistic::Maximum), "#5cd65c")
                        .labelled("Duration (max)"),
                    Plot::new(memory.clone().with_statistic(Statistic::Maximum), "#ff8000")
                        .labelled("Memory (max)"),
                ],
            }],
            vec![
                Widget::Graph {
                    title: "Error",
                    width: 6,
                    plots: vec![Plot::new(errors, "#ff4d4d").labelled("Errors")],
                },
                Widget::Graph {
                    title: "LogError",
                    width: 6,
                    plots: vec![Plot::new(log_errors, "#ff4d4d").labelled("Errors")],
                },
                Widget::Graph {
                    title: "Memory",
                    width: 6,
                    plots: spread(&memory),
                },
                Widget::Graph {
                    title: "Duration",
                    width: 6,
                    plots: spread(&duration),
                },
            ],
            vec![
                alarm_widget(alarms, "ErrorAlarms", "LambdaError", 6)?,
                alarm_widget(alarms, "LogErrorAlarms", "LambdaLogError", 6)?,
                alarm_widget(alarms, "MemoryAlarms", "LambdaLogMemory", 6)?,
                alarm_widget(alarms, "DurationAlarms", "LambdaDuration", 6)?,
            ],
        ],
    };

    Ok(vec![api_dashboard, function_dashboard])
}

/// Adds the dashboards and returns their logical ids.
pub(super) fn add_dashboards(
    stack: &mut Stack,
    watched: Watched<'_>,
    alarms: &[AlarmHandle],
) -> Result<Vec<String>, AssemblyError> {
    dashboards(watched, alarms)?
        .into_iter()
        .map(|dashboard| -> Result<String, AssemblyError> {
            dashboard.validate()?;
            let body = dashboard.body()?;
            stack.add(
                &ConstructPath::new(&[dashboard.name, "Resource"]),
                Resource::from_properties(DASHBOARD_TYPE, &json!({ "DashboardBody": body }))?,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::alerting::{self, NotificationDestinations};
    use crate::stack::{compute, gateway, storage};
    use crate::template::Template;

    struct Fixture {
        template: Template,
        alarms: Vec<AlarmHandle>,
        dashboards: Vec<String>,
        topic: TopicHandle,
    }

    fn assembled() -> Fixture {
        let mut stack = Stack::new("applicationmetrics");
        let table = storage::add_table(&mut stack).unwrap();
        let function = compute::add_function(&mut stack, &table).unwrap();
        let api = gateway::add_api(&mut stack, &table, &function).unwrap();
        let topic = alerting::add_topic(&mut stack, &NotificationDestinations::default()).unwrap();
        let watched = Watched {
            function: &function,
            api: &api,
            table: &table,
        };
        let alarms = add_alarms(&mut stack, watched, &topic).unwrap();
        let dashboards = add_dashboards(&mut stack, watched, &alarms).unwrap();

        Fixture {
            template: stack.into_template(),
            alarms,
            dashboards,
            topic,
        }
    }

    fn alarm<'a>(fixture: &'a Fixture, name: &str) -> &'a Resource {
        let handle = fixture.alarms.iter().find(|a| a.name == name).unwrap();
        fixture.template.resource(&handle.logical_id).unwrap()
    }

    #[test]
    fn test_every_alarm_notifies_topic() {
        let fixture = assembled();
        assert_eq!(fixture.template.count_of_type(ALARM_TYPE), 8);

        for (_, alarm) in fixture.template.resources_of_type(ALARM_TYPE) {
            assert_eq!(
                alarm.properties["AlarmActions"],
                json!([{ "Ref": fixture.topic.logical_id }])
            );
            assert_eq!(alarm.properties["Period"], json!(60));
            assert_eq!(alarm.properties["EvaluationPeriods"], json!(1));
        }
    }

    #[test]
    fn test_duration_alarm() {
        let fixture = assembled();
        let duration = alarm(&fixture, "LambdaDuration");

        assert_eq!(
            duration.properties["ComparisonOperator"],
            json!("GreaterThanOrEqualToThreshold")
        );
        assert_eq!(duration.properties["Statistic"], json!("Maximum"));
        assert_eq!(duration.properties["TreatMissingData"], json!("ignore"));
        assert_eq!(duration.properties["Threshold"], json!(1000.0));
    }

    #[test]
    fn test_api_alarm_dimension() {
        let fixture = assembled();
        let alarm = alarm(&fixture, "ApiGateway5XXError");

        assert_eq!(
            alarm.properties["Dimensions"],
            json!([{ "Name": "ApiName", "Value": "api_application_metrics" }])
        );
        assert_eq!(alarm.properties["TreatMissingData"], json!("notBreaching"));
    }

    #[test]
    fn test_invalid_constants_fail() {
        let mut spec = AlarmSpec::breach_above("Broken", Metric::new("Lambdas", "LambdaErrors"), 0.0);
        assert!(spec.validate().is_ok());

        spec.threshold = f64::NAN;
        assert!(spec.validate().is_err());

        spec.threshold = 0.0;
        spec.evaluation_periods = 0;
        assert!(spec.validate().is_err());

        spec.evaluation_periods = 1;
        spec.period_secs = 90;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_row_wider_than_grid_fails() {
        let dashboard = Dashboard {
            name: "Broken",
            rows: vec![vec![
                Widget::Alarm {
                    title: "a",
                    width: 12,
                    alarm: Expr::literal("arn"),
                },
                Widget::Alarm {
                    title: "b",
                    width: 13,
                    alarm: Expr::literal("arn"),
                },
            ]],
        };
        assert!(dashboard.validate().is_err());
    }

    #[test]
    fn test_dashboards_render_and_reference_alarms() {
        let fixture = assembled();
        assert_eq!(fixture.dashboards.len(), 2);

        for id in &fixture.dashboards {
            let refs = fixture.template.references_of(id);
            assert!(!refs.is_empty());
            assert!(refs.iter().all(|r| fixture.alarms.iter().any(|a| &a.logical_id == r)
                || r.starts_with("post")
                || r.starts_with("AWS::")));
        }
        assert!(fixture.template.verify().is_ok());
    }

    #[test]
    fn test_layout_rows_stack_vertically() {
        let dashboard = Dashboard {
            name: "Layout",
            rows: vec![
                vec![Widget::SingleValue {
                    width: 24,
                    plots: Vec::new(),
                }],
                vec![
                    Widget::Alarm {
                        title: "a",
                        width: 6,
                        alarm: Expr::literal("arn:a"),
                    },
                    Widget::Alarm {
                        title: "b",
                        width: 6,
                        alarm: Expr::literal("arn:b"),
                    },
                ],
            ],
        };

        let mut tokens = TokenizedJson::new();
        let second = dashboard.rows[1][1].render(&mut tokens, 6, SINGLE_VALUE_HEIGHT);
        assert_eq!(second["x"], json!(6));
        assert_eq!(second["y"], json!(3));
        assert!(dashboard.validate().is_ok());
        assert!(dashboard.body().is_ok());
    }
}
