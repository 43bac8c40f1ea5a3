//! appmetrics CLI entrypoint.
//!
//! This is the main entrypoint for the appmetrics command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use appmetrics_stack::assembly::{AssemblyStore, open_store, write_locked};
use appmetrics_stack::cli::{AssemblyCommands, Cli, Commands, OutputFormat, OutputFormatter, TemplateFormat};
use appmetrics_stack::config::{ConfigParser, ConfigValidator, StackConfig, find_config_file};
use appmetrics_stack::error::{ConfigError, Result, StackError};
use appmetrics_stack::planner::DiffEngine;
use appmetrics_stack::stack::{StackSummary, assemble};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(hint) = error_hint(&e) {
                eprintln!("Hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// Logs go to stderr so `synth --stdout` output stays a clean template.
/// `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings, strict } => {
            cmd_validate(config_path, warnings, strict, &formatter)
        }
        Commands::List => cmd_list(config_path, cli.output),
        Commands::Synth {
            stdout,
            format,
            strict,
        } => cmd_synth(config_path, stdout, format, strict, &formatter).await,
        Commands::Diff => cmd_diff(config_path, &formatter).await,
        Commands::Assembly { command } => cmd_assembly(config_path, command, &formatter).await,
    }
}

/// Initialize a new stack configuration.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing stack configuration in: {}", path.display());

    let config_path = path.join("appmetrics.stack.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&config_path, include_str!("../templates/appmetrics.stack.yaml"))?;
    eprintln!("Created: {}", config_path.display());

    std::fs::write(&env_path, include_str!("../templates/.env.example"))?;
    eprintln!("Created: {}", env_path.display());

    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        let has_env = existing.lines().any(|l| l.trim() == ".env");
        let has_out = existing.lines().any(|l| l.trim() == "stack.out/");
        if !has_env || !has_out {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# appmetrics")?;
            if !has_env {
                writeln!(file, ".env")?;
            }
            if !has_out {
                writeln!(file, "stack.out/")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, ".env\nstack.out/\n")?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nStack configuration initialized.");
    eprintln!("Next steps:");
    eprintln!("  1. List the alert recipients under notifications.emails");
    eprintln!("  2. Run 'appmetrics validate' to check the configuration");
    eprintln!("  3. Run 'appmetrics synth' to write the template to stack.out/");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&Path>,
    show_warnings: bool,
    strict: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;

    let result = ConfigValidator::collect(&config);
    emit(&formatter.format_validation(&config, &result, show_warnings || strict))?;

    if let Some(first) = result.errors.first() {
        return Err(ConfigError::validation(&first.message, &first.field).into());
    }
    if strict && let Some(first) = result.warnings.first() {
        return Err(ConfigError::validation_general(format!("{first} (strict mode)")).into());
    }
    Ok(())
}

/// List the stacks the application defines.
fn cmd_list(config_path: Option<&Path>, output: OutputFormat) -> Result<()> {
    let (config, _) = load_config(config_path)?;

    match output {
        OutputFormat::Json => emit(&serde_json::json!([config.stack_name()]).to_string()),
        OutputFormat::Text => emit(config.stack_name()),
    }
}

/// Assemble and print or store the template.
async fn cmd_synth(
    config_path: Option<&Path>,
    to_stdout: bool,
    format: TemplateFormat,
    strict: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, base_dir) = load_config(config_path)?;
    ConfigValidator::new().strict(strict).validate(&config)?;

    let template = assemble(&config)?;

    if to_stdout {
        let rendered = match format {
            TemplateFormat::Json => template.to_json_pretty()?,
            TemplateFormat::Yaml => template.to_yaml()?,
        };
        return emit(rendered.trim_end());
    }

    if format == TemplateFormat::Yaml {
        warn!("--format only applies with --stdout; the stored template is JSON");
    }

    let summary = StackSummary::from_template(&template);
    let store = open_store(&config.assembly, &base_dir).await?;

    let manifest = write_locked(&*store, &config, template).await?;

    emit(&formatter.format_summary(config.stack_name(), &summary))?;
    let message = if manifest.changed_since_last() {
        format!(
            "Wrote {} to {}",
            manifest.template_file,
            store.location()
        )
    } else {
        format!("{} unchanged in {}", manifest.template_file, store.location())
    };
    emit(&formatter.success(&message))
}

/// Compare a fresh synthesis with the stored one.
async fn cmd_diff(config_path: Option<&Path>, formatter: &OutputFormatter) -> Result<()> {
    let (config, base_dir) = load_config(config_path)?;
    ConfigValidator::new().validate(&config)?;

    let template = assemble(&config)?;
    let store = open_store(&config.assembly, &base_dir).await?;
    let stored = store.load().await?;

    if stored.is_none() {
        emit(&formatter.warning(&format!(
            "No stored assembly in {}; every resource is new",
            store.location()
        )))?;
    }

    let diff = DiffEngine::new().compute_diff(&template, stored.as_ref().map(|s| &s.template));
    emit(&formatter.format_diff(&diff))
}

/// Assembly management commands.
async fn cmd_assembly(
    config_path: Option<&Path>,
    command: AssemblyCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, base_dir) = load_config(config_path)?;
    let store = open_store(&config.assembly, &base_dir).await?;

    match command {
        AssemblyCommands::Show => {
            if let Some(manifest) = store.load_manifest().await? {
                let lock = store.get_lock_info().await?;
                emit(&formatter.format_manifest(&store.location(), &manifest, lock.as_ref()))?;
            } else {
                emit(&formatter.warning(&format!("No assembly in {}", store.location())))?;
            }
        }
        AssemblyCommands::Unlock { lock_id, force } => {
            if force {
                if let Some(lock_info) = store.get_lock_info().await? {
                    store.release_lock(&lock_info.lock_id).await?;
                    emit(&formatter.success("Assembly forcefully unlocked."))?;
                } else {
                    emit(&formatter.warning("Assembly is not locked."))?;
                }
            } else if let Some(id) = lock_id {
                store.release_lock(&id).await?;
                emit(&formatter.success("Assembly unlocked."))?;
            } else {
                eprintln!("Please provide --lock-id or use --force");
            }
        }
        AssemblyCommands::Clean => {
            if store.is_locked().await? {
                let holder = store
                    .get_lock_info()
                    .await?
                    .map(|l| l.holder)
                    .unwrap_or_default();
                warn!("Removing an assembly still locked by {holder}");
            }
            store.delete().await?;
            emit(&formatter.success(&format!("Cleaned {}", store.location())))?;
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Suggests a next step for errors the user can act on.
const fn error_hint(error: &StackError) -> Option<&'static str> {
    if error.is_assembly_failure() {
        Some("the resource graph is inconsistent; this is a bug in appmetrics, please report it")
    } else if error.is_retryable() {
        Some("the assembly backend may be temporarily unavailable; retry the command")
    } else {
        None
    }
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&Path>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.to_path_buf()))
}

/// Loads the configuration with `.env` and environment overrides.
///
/// Returns the configuration and the directory it was loaded from.
fn load_config(config_path: Option<&Path>) -> Result<(StackConfig, PathBuf)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let base_dir = config_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let parser = ConfigParser::new().with_base_path(&base_dir);
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    Ok((config, base_dir))
}

/// Writes command output to stdout.
fn emit(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}").map_err(StackError::from)
}
