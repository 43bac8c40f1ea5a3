//! CLI module for the stack assembler.
//!
//! This module provides the command-line interface for assembling,
//! inspecting and storing the application-metrics template.

mod commands;
mod output;

pub use commands::{AssemblyCommands, Cli, Commands, OutputFormat, TemplateFormat};
pub use output::OutputFormatter;
