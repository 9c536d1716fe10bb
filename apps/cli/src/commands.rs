//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use intake_core::{IntakeOrchestrator, UiState, report};
use intake_directory::{DirectoryClient, HubSpotClient, ScriptedDirectory};
use intake_shared::{
    AppConfig, IntakeError, init_config, load_config, validate, validate_hubspot,
};
use serde_json::Value;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Contact intake for listing inquiries.
#[derive(Parser)]
#[command(
    name = "intake",
    version,
    about = "Validate listing inquiries and push them into HubSpot.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Serve the inquiry endpoint over HTTP.
    Serve {
        /// Address to listen on (overrides [server].bind).
        #[arg(long, env = "INTAKE_BIND")]
        bind: Option<String>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Run one submission from a JSON file ("-" for stdin).
    Submit {
        /// Payload file.
        file: PathBuf,

        /// Use an in-memory directory instead of HubSpot.
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Validate a payload file without contacting the directory.
    Validate {
        /// Payload file ("-" for stdin).
        file: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags that override config file values for a run.
#[derive(Args, Debug, Default)]
pub(crate) struct Overrides {
    /// Delay before the consent update, in ms (0 disables).
    #[arg(long, env = "HUBSPOT_CONSENT_DELAY_MS")]
    pub consent_delay_ms: Option<u64>,

    /// HubSpot portal id.
    #[arg(long, env = "HUBSPOT_PORTAL_ID")]
    pub portal_id: Option<String>,

    /// HubSpot form GUID.
    #[arg(long, env = "HUBSPOT_FORM_GUID")]
    pub form_guid: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "intake=info",
        1 => "intake=debug,tower_http=debug",
        _ => "intake=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { bind, overrides } => cmd_serve(bind, &overrides).await,
        Command::Submit {
            file,
            dry_run,
            overrides,
        } => cmd_submit(&file, dry_run, &overrides).await,
        Command::Validate { file } => cmd_validate(&file),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Load the config file and apply flag/env overrides.
fn resolve_config(overrides: &Overrides) -> Result<AppConfig> {
    let mut config = load_config()?;
    apply_overrides(&mut config, overrides);
    Ok(config)
}

fn apply_overrides(config: &mut AppConfig, overrides: &Overrides) {
    if let Some(ms) = overrides.consent_delay_ms {
        config.intake.consent_delay_ms = ms;
    }
    if let Some(portal_id) = &overrides.portal_id {
        config.hubspot.portal_id = portal_id.clone();
    }
    if let Some(form_guid) = &overrides.form_guid {
        config.hubspot.form_guid = form_guid.clone();
    }
}

fn hubspot_orchestrator(config: &AppConfig) -> Result<IntakeOrchestrator> {
    validate_hubspot(&config.hubspot)?;
    let client = HubSpotClient::new(config.hubspot.clone())?;
    Ok(IntakeOrchestrator::new(Arc::new(client), config.intake.clone()))
}

fn read_payload(file: &Path) -> Result<Value> {
    let content = if file == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).wrap_err("failed to read payload from stdin")?
    } else {
        std::fs::read_to_string(file).map_err(|e| IntakeError::io(file, e))?
    };

    let value = serde_json::from_str(&content).map_err(|e| {
        IntakeError::validation(format!(
            "payload '{}' is not valid JSON: {e}",
            file.display()
        ))
    })?;
    Ok(value)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(bind: Option<String>, overrides: &Overrides) -> Result<()> {
    let config = resolve_config(overrides)?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    let orchestrator = hubspot_orchestrator(&config)?;

    info!(
        %bind,
        consent_delay_ms = config.intake.consent_delay_ms,
        listing_object_type = %config.hubspot.listing_object_type,
        "starting intake endpoint"
    );

    intake_server::serve(&bind, Arc::new(orchestrator)).await?;
    Ok(())
}

async fn cmd_submit(file: &Path, dry_run: bool, overrides: &Overrides) -> Result<()> {
    let config = resolve_config(overrides)?;
    let raw = read_payload(file)?;

    let response = match validate(&raw) {
        Err(errors) => report::rejected(errors),
        Ok(record) => {
            let orchestrator = if dry_run {
                let directory: Arc<dyn DirectoryClient> =
                    Arc::new(ScriptedDirectory::all_succeed());
                IntakeOrchestrator::new(directory, config.intake.clone())
            } else {
                hubspot_orchestrator(&config)?
            };

            info!(dry_run, email = %record.email(), "submitting payload");
            let run = orchestrator.run(&record).await;
            if let Some(reason) = &run.failure_reason {
                tracing::error!(%reason, "intake failed");
            }
            report::from_run(&run)
        }
    };

    println!("{}", serde_json::to_string_pretty(&response.body)?);

    match UiState::from(&response) {
        UiState::Submitted => Ok(()),
        UiState::Error(text) => Err(eyre!("HTTP {}: {text}", response.status_code)),
    }
}

fn cmd_validate(file: &Path) -> Result<()> {
    let raw = read_payload(file)?;

    match validate(&raw) {
        Ok(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                println!("  {:<22} {}", error.field, error.message);
            }
            Err(eyre!("{} field error(s)", errors.len()))
        }
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
