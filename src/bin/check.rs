//! Configuration Checker CLI
//!
//! Validates a device configuration against a directory of component manifests.
//!
//! Exit status: 0 when the configuration is valid, 1 when errors were
//! reported, 2 when the run could not complete.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use fwconf::config::{CheckConfig, ReportFormat};
use fwconf::report::{config_json, render_emit, render_json, render_text};
use fwconf::{check_file, ComponentRegistry, ManifestRegistry, MemoizedRegistry, ValidationResult};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fwconf-check")]
#[command(about = "Validate a firmware configuration and resolve its identifiers")]
struct Cli {
    /// Configuration file (JSON)
    config: PathBuf,

    /// Directory of component manifests (overrides settings)
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(short, long)]
    settings: Option<String>,

    /// Report format (overrides settings)
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Print the validated configuration when it is valid
    #[arg(long)]
    show_config: bool,

    /// Print the validated configuration and symbol table as JSON
    #[arg(long)]
    emit: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for ReportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => ReportFormat::Text,
            Format::Json => ReportFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings =
        CheckConfig::load_from(cli.settings.as_deref()).context("failed to load settings")?;
    if let Some(path) = cli.registry {
        settings.registry.path = path;
    }
    if let Some(format) = cli.format {
        settings.output.format = format.into();
    }
    settings.output.show_config |= cli.show_config;

    let registry_dir = settings.registry_path();
    let manifests = ManifestRegistry::load(&registry_dir)
        .with_context(|| format!("failed to load manifests from {}", registry_dir.display()))?;

    let result = if settings.registry.memoize {
        check(&cli.config, MemoizedRegistry::new(manifests))?
    } else {
        check(&cli.config, manifests)?
    };

    if cli.emit {
        println!("{}", serde_json::to_string_pretty(&render_emit(&result))?);
    }

    if !result.is_valid() {
        match settings.output.format {
            ReportFormat::Text => print!("{}", render_text(result.errors(), true)),
            ReportFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&render_json(result.errors()))?)
            }
        }
        return Ok(ExitCode::from(1));
    }

    info!(
        domains = result.config().len(),
        symbols = result.symbols().len(),
        "configuration is valid"
    );
    if settings.output.show_config && !cli.emit {
        println!("{}", serde_json::to_string_pretty(&config_json(result.config()))?);
    }
    Ok(ExitCode::SUCCESS)
}

fn check<R: ComponentRegistry>(path: &Path, registry: R) -> anyhow::Result<ValidationResult> {
    debug!(path = %path.display(), "validating");
    check_file(path, registry).map_err(|e| {
        let what = if e.is_source_error() {
            "cannot read"
        } else {
            "rejected"
        };
        anyhow::Error::new(e).context(format!("{} {}", what, path.display()))
    })
}
