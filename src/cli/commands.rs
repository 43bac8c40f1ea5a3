//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// appmetrics - Application metrics stack assembler.
#[derive(Parser, Debug)]
#[command(name = "appmetrics")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "APPMETRICS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new stack configuration.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the stack configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,

        /// Treat warnings as errors.
        #[arg(long)]
        strict: bool,
    },

    /// List the stacks the application defines.
    List,

    /// Assemble the template and write the cloud assembly.
    Synth {
        /// Print the template instead of storing it.
        #[arg(long)]
        stdout: bool,

        /// Template format when printing.
        #[arg(long, default_value = "json")]
        format: TemplateFormat,

        /// Treat configuration warnings as errors.
        #[arg(long)]
        strict: bool,
    },

    /// Compare a fresh synthesis with the stored assembly.
    Diff,

    /// Manage the stored assembly.
    Assembly {
        /// Assembly subcommand.
        #[command(subcommand)]
        command: AssemblyCommands,
    },
}

/// Assembly management subcommands.
#[derive(Subcommand, Debug)]
pub enum AssemblyCommands {
    /// Show the stored manifest.
    Show,

    /// Unlock the assembly.
    Unlock {
        /// Lock ID to unlock.
        #[arg(long)]
        lock_id: Option<String>,

        /// Remove whatever lock is present.
        #[arg(long)]
        force: bool,
    },

    /// Delete the stored template, manifest and lock.
    Clean,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Template encodings for `synth --stdout`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TemplateFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_synth() {
        let cli = Cli::try_parse_from(["appmetrics", "synth", "--stdout", "--format", "yaml"])
            .unwrap();
        match cli.command {
            Commands::Synth {
                stdout,
                format,
                strict,
            } => {
                assert!(stdout);
                assert_eq!(format, TemplateFormat::Yaml);
                assert!(!strict);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "appmetrics",
            "assembly",
            "unlock",
            "--force",
            "-c",
            "stack.yaml",
            "--output",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("stack.yaml")));
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Assembly {
                command: AssemblyCommands::Unlock { force: true, .. }
            }
        ));
    }

    #[test]
    fn test_command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
