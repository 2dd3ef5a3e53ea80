use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use extractors::{load_catalog, BillPostProcessor, ProviderRegistry};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

mod commands;
mod settings;

use commands::ValidateOptions;
use settings::CheckConfig;

#[derive(Parser, Debug)]
#[command(
    name = "billcheck",
    version,
    about = "Normalize utility bill extractions and reconcile their totals"
)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize and validate extracted bill JSON files
    Validate {
        /// Provider id, name or alias; detected from each record when omitted
        #[arg(long)]
        provider: Option<String>,

        /// Directory for normalized records
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Print full JSON reports instead of summary lines
        #[arg(long)]
        json: bool,

        /// Count skipped checks as failures
        #[arg(long)]
        strict: bool,

        /// Extraction files holding one record or an array of records
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// List known providers
    Providers,

    /// Print a provider schema as JSON
    ShowProvider {
        /// Provider id, name or alias
        id: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref());

    let (config, config_path) =
        CheckConfig::load(cli.config.as_deref()).context("Failed to load billcheck config")?;
    tracing::debug!("Config resolved from {:?}", config_path);

    let registry = build_registry(&config)?;

    match cli.command {
        Command::Validate {
            provider,
            output,
            json,
            strict,
            files,
        } => {
            let mut settings = config.settings();
            settings.strict |= strict;

            let processor = BillPostProcessor::new(registry, settings);
            let options = ValidateOptions {
                provider: provider.as_deref(),
                output: output.as_deref(),
                json,
            };

            if !commands::validate(&processor, &files, &options)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Providers => commands::list_providers(&registry),
        Command::ShowProvider { id } => commands::show_provider(&registry, &id)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn build_registry(config: &CheckConfig) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::builtin().context("Built-in provider catalog is invalid")?;

    for catalog in &config.providers.catalogs {
        let providers = load_catalog(catalog)
            .with_context(|| format!("Failed to load provider catalog at {:?}", catalog))?;
        for spec in providers {
            registry.register(spec)?;
        }
    }

    Ok(registry)
}

/// Logs go to stderr so stdout stays usable for reports
fn init_tracing(log_file: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_target(true)
        .with_writer(std::io::stderr);

    match log_file {
        Some(log_path) => {
            let file_appender = tracing_appender::rolling::never(
                log_path.parent().unwrap_or(Path::new(".")),
                log_path
                    .file_name()
                    .unwrap_or(std::ffi::OsStr::new("billcheck.log")),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .try_init();
            None
        }
    }
}
