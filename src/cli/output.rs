//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::assembly::{AssemblyManifest, LockInfo};
use crate::config::{ConfigHasher, StackConfig, ValidationResult};
use crate::planner::{DiffResult, DiffType};
use crate::stack::StackSummary;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Diff row for table display.
#[derive(Tabled)]
struct DiffRow {
    #[tabled(rename = "Change")]
    change: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Properties")]
    properties: String,
}

/// Route row for table display.
#[derive(Tabled)]
struct RouteRow {
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a validation result with the configuration it checked.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &StackConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&ValidationJson {
                valid: result.is_valid(),
                stack: config.stack_name(),
                region: &config.stack.region,
                destinations: config.emails().len(),
                errors: result.errors.iter().map(ToString::to_string).collect(),
                warnings: &result.warnings,
            }),
            OutputFormat::Text => {
                let mut output = String::new();

                if result.is_valid() {
                    let _ = writeln!(output, "{} Configuration is valid!", "✓".green());
                } else {
                    let _ = writeln!(
                        output,
                        "{} Configuration has {} error(s):",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output.push_str("\nConfiguration summary:\n");
                let _ = writeln!(output, "   Stack: {}", config.stack_name());
                let _ = writeln!(output, "   Region: {}", config.stack.region);
                let _ = writeln!(output, "   Notification emails: {}", config.emails().len());
                let _ = writeln!(output, "   Assembly backend: {}", config.assembly.backend);
                output
            }
        }
    }

    /// Formats the summary of a stack.
    #[must_use]
    pub fn format_summary(&self, stack_name: &str, summary: &StackSummary) -> String {
        match self.format {
            OutputFormat::Json => to_json(&SummaryJson {
                stack: stack_name,
                summary,
            }),
            OutputFormat::Text => {
                let mut output = String::new();

                let _ = write!(output, "\nStack: {}\n\n", stack_name.bold());
                let _ = writeln!(output, "   Resources: {}", summary.resources);
                let _ = writeln!(output, "   Tables: {}", summary.tables);
                let _ = writeln!(output, "   REST APIs: {}", summary.rest_apis);
                let _ = writeln!(output, "   Functions: {}", summary.functions);
                let _ = writeln!(output, "   Alarms: {}", summary.alarms.join(", "));
                let _ = writeln!(output, "   Dashboards: {}", summary.dashboards.join(", "));

                if summary.subscriptions.is_empty() {
                    let _ = writeln!(
                        output,
                        "   Subscriptions: {}",
                        "none (alarms notify nobody)".yellow()
                    );
                } else {
                    let _ = writeln!(output, "   Subscriptions: {}", summary.subscriptions.join(", "));
                }

                let rows: Vec<RouteRow> = summary
                    .routes
                    .iter()
                    .map(|r| RouteRow {
                        method: r.method.clone(),
                        path: r.path.clone(),
                        logical_id: r.logical_id.clone(),
                    })
                    .collect();
                if !rows.is_empty() {
                    output.push('\n');
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                output
            }
        }
    }

    /// Formats a template diff.
    #[must_use]
    pub fn format_diff(&self, diff: &DiffResult) -> String {
        match self.format {
            OutputFormat::Json => to_json(diff),
            OutputFormat::Text => Self::format_diff_text(diff),
        }
    }

    fn format_diff_text(diff: &DiffResult) -> String {
        if !diff.has_changes() {
            return format!(
                "{} No differences - the stored assembly is up to date.\n",
                "✓".green()
            );
        }

        let mut output = String::new();

        let rows: Vec<DiffRow> = diff
            .actionable_diffs()
            .into_iter()
            .map(|d| DiffRow {
                change: Self::format_diff_type(d.diff_type),
                logical_id: d.logical_id.clone(),
                resource_type: d.resource_type.clone(),
                properties: Self::truncate(&d.changed_properties.join(", "), 40),
            })
            .collect();

        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if diff.outputs_changed {
            let _ = writeln!(output, "\n{} Outputs changed", "~".yellow());
        }

        let _ = write!(
            output,
            "\nDiff: {} to create, {} to update, {} to delete\n",
            diff.creates.to_string().green(),
            diff.updates.to_string().yellow(),
            diff.deletes.to_string().red()
        );

        output
    }

    /// Formats a stored manifest and its lock.
    #[must_use]
    pub fn format_manifest(
        &self,
        location: &str,
        manifest: &AssemblyManifest,
        lock: Option<&LockInfo>,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&ManifestJson {
                location,
                manifest,
                lock,
            }),
            OutputFormat::Text => {
                let mut output = String::new();

                let _ = write!(output, "\nAssembly: {location}\n\n");
                let _ = writeln!(output, "   Version: {}", manifest.version);
                let _ = writeln!(output, "   Stack: {}", manifest.stack_name);
                let _ = writeln!(output, "   Region: {}", manifest.region);
                let _ = writeln!(output, "   Template: {}", manifest.template_file);
                let _ = writeln!(output, "   Template hash: {}", Self::short(&manifest.template_hash));
                let _ = writeln!(output, "   Resources: {}", manifest.resource_count);
                let _ = writeln!(output, "   Created: {}", manifest.created_at);

                match lock {
                    Some(lock) if !lock.is_expired() => {
                        let _ = writeln!(
                            output,
                            "   Lock: {} by {} ({}s left)",
                            lock.lock_id.yellow(),
                            lock.holder,
                            lock.remaining_secs()
                        );
                    }
                    Some(lock) => {
                        let _ = writeln!(output, "   Lock: {} (expired)", lock.lock_id.dimmed());
                    }
                    None => {}
                }

                if !manifest.history.is_empty() {
                    let _ = writeln!(output, "\n   Recent history ({}):", manifest.history.len());
                    for entry in manifest.history.iter().rev().take(5) {
                        let _ = writeln!(
                            output,
                            "     {} {} ({} resources)",
                            entry.timestamp.format("%Y-%m-%d %H:%M"),
                            Self::short(&entry.template_hash),
                            entry.resource_count
                        );
                    }
                }

                output
            }
        }
    }

    /// Formats a diff type with color.
    fn format_diff_type(diff_type: DiffType) -> String {
        match diff_type {
            DiffType::Create => "+create".green().to_string(),
            DiffType::Update => "~update".yellow().to_string(),
            DiffType::Delete => "-delete".red().to_string(),
            DiffType::NoChange => "unchanged".dimmed().to_string(),
        }
    }

    fn short(hash: &str) -> String {
        ConfigHasher::new().short_hash(hash)
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.status_line("success", "✓".green().to_string(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.status_line("warning", "⚠".yellow().to_string(), message)
    }

    fn status_line(&self, status: &str, symbol: String, message: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "status": status,
                "message": message,
            })),
            OutputFormat::Text => format!("{symbol} {message}"),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// JSON serialization helpers

#[derive(Serialize)]
struct ValidationJson<'a> {
    valid: bool,
    stack: &'a str,
    region: &'a str,
    destinations: usize,
    errors: Vec<String>,
    warnings: &'a [String],
}

#[derive(Serialize)]
struct SummaryJson<'a> {
    stack: &'a str,
    #[serde(flatten)]
    summary: &'a StackSummary,
}

#[derive(Serialize)]
struct ManifestJson<'a> {
    location: &'a str,
    manifest: &'a AssemblyManifest,
    lock: Option<&'a LockInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::DiffEngine;
    use crate::stack::assemble;

    #[test]
    fn test_diff_json_counts() {
        let template = assemble(&StackConfig::with_emails(["ops@example.com"])).unwrap();
        let diff = DiffEngine::new().compute_diff(&template, None);

        let formatter = OutputFormatter::new(OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&formatter.format_diff(&diff)).unwrap();
        assert_eq!(value["creates"], template.resources.len());
        assert_eq!(value["diffs"][0]["diff_type"], "create");
    }

    #[test]
    fn test_summary_json_is_flat() {
        let template = assemble(&StackConfig::default()).unwrap();
        let summary = StackSummary::from_template(&template);

        let formatter = OutputFormatter::new(OutputFormat::Json);
        let value: serde_json::Value =
            serde_json::from_str(&formatter.format_summary("applicationmetrics", &summary))
                .unwrap();
        assert_eq!(value["stack"], "applicationmetrics");
        assert_eq!(value["functions"], 1);
    }

    #[test]
    fn test_manifest_text_shows_short_hash() {
        let config = StackConfig::with_emails(["ops@example.com"]);
        let manifest = AssemblyManifest::new(&config, &assemble(&config).unwrap());

        let formatter = OutputFormatter::new(OutputFormat::Text);
        let text = formatter.format_manifest("stack.out", &manifest, None);
        assert!(text.contains(&format!("Template hash: {}\n", &manifest.template_hash[..8])));
        assert!(!text.contains(&manifest.template_hash));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_status_line_text() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        assert_eq!(formatter.success("Wrote template"), "✓ Wrote template");
    }
}
