//! The application-metrics stack.
//!
//! [`StackAssembler`] turns a [`StackConfig`] into a [`Template`]. The only
//! input that changes the resource graph is the notification destination
//! list; everything else is fixed here:
//!
//! - `storage`: the metrics table
//! - `compute`: the read-path function and its log metric filters
//! - `gateway`: the REST API with its `PUT` and `POST` routes
//! - `alerting`: the alarm topic and one email subscription per destination
//! - `monitoring`: alarms on the function, API and table, and two dashboards
//!
//! Assembly is pure: no I/O, and the same input always renders to the same
//! bytes.

mod alerting;
mod compute;
mod gateway;
mod iam;
mod monitoring;
mod storage;
mod summary;

pub use alerting::{NotificationDestinations, SUBSCRIPTION_TYPE, TOPIC_TYPE};
pub use compute::FUNCTION_TYPE;
pub use gateway::{API_NAME, METHOD_TYPE, REST_API_TYPE, STAGE_NAME};
pub use monitoring::{
    ALARM_TYPE, AlarmSpec, ComparisonOperator, DASHBOARD_TYPE, Metric, Statistic, TreatMissingData,
};
pub use storage::TABLE_TYPE;
pub use summary::{Route, StackSummary};

use tracing::{debug, info, warn};

use crate::config::StackConfig;
use crate::error::{AssemblyError, Result};
use crate::template::{ConstructPath, Output, PATH_METADATA_KEY, Parameter, Resource, Template};

use monitoring::Watched;

const DESCRIPTION: &str =
    "Application metrics: REST API, metrics table, read function, alarms and alert topic";

/// Resource graph under construction.
///
/// Allocates logical ids from construct paths and records the path in each
/// resource's metadata.
#[derive(Debug)]
pub(crate) struct Stack {
    name: String,
    template: Template,
}

impl Stack {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            template: Template::new(),
        }
    }

    /// Adds a resource at `path` and returns its logical id.
    pub(crate) fn add(
        &mut self,
        path: &ConstructPath,
        resource: Resource,
    ) -> std::result::Result<String, AssemblyError> {
        let logical_id = path.logical_id();
        let resource = resource.with_metadata(PATH_METADATA_KEY, path.display_under(&self.name));
        self.template.add_resource(logical_id.clone(), resource)?;
        debug!(%logical_id, %path, "Added resource");
        Ok(logical_id)
    }

    pub(crate) fn add_parameter(
        &mut self,
        name: &str,
        parameter: Parameter,
    ) -> std::result::Result<(), AssemblyError> {
        self.template.add_parameter(name, parameter)
    }

    pub(crate) fn add_output(
        &mut self,
        name: &str,
        output: Output,
    ) -> std::result::Result<(), AssemblyError> {
        self.template.add_output(name, output)
    }

    pub(crate) fn into_template(self) -> Template {
        self.template
    }
}

/// Assembles the stack template from a configuration.
#[derive(Debug)]
pub struct StackAssembler<'a> {
    config: &'a StackConfig,
}

impl<'a> StackAssembler<'a> {
    /// Creates an assembler for the given configuration.
    #[must_use]
    pub const fn new(config: &'a StackConfig) -> Self {
        Self { config }
    }

    /// Assembles the template.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a destination is not an email
    /// address, or an assembly error if the embedded constants are malformed.
    pub fn assemble(&self) -> Result<Template> {
        let destinations = NotificationDestinations::parse(self.config.emails())?;
        if destinations.is_empty() {
            warn!("No notification destinations: alarms will fire but nobody is notified");
        }

        info!(
            stack = self.config.stack_name(),
            destinations = destinations.len(),
            "Assembling stack"
        );
        let template = Self::build(self.config.stack_name(), &destinations)?;

        info!(
            resources = template.resources.len(),
            "Stack assembled"
        );
        Ok(template)
    }

    fn build(
        stack_name: &str,
        destinations: &NotificationDestinations,
    ) -> std::result::Result<Template, AssemblyError> {
        let mut stack = Stack::new(stack_name);

        let table = storage::add_table(&mut stack)?;
        let function = compute::add_function(&mut stack, &table)?;
        let api = gateway::add_api(&mut stack, &table, &function)?;
        let topic = alerting::add_topic(&mut stack, destinations)?;

        let watched = Watched {
            function: &function,
            api: &api,
            table: &table,
        };
        let alarms = monitoring::add_alarms(&mut stack, watched, &topic)?;
        monitoring::add_dashboards(&mut stack, watched, &alarms)?;

        let mut template = stack.into_template();
        template.description = Some(String::from(DESCRIPTION));
        template.verify()?;
        Ok(template)
    }
}

/// Assembles the template for a configuration.
///
/// # Errors
///
/// See [`StackAssembler::assemble`].
pub fn assemble(config: &StackConfig) -> Result<Template> {
    StackAssembler::new(config).assemble()
}
