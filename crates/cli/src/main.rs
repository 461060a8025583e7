//! Namespace capacity CLI
//!
//! Builds a list of namespace sizing requests, summarizes them by
//! environment, finalizes costs against the cost service and manages the
//! organizational metadata attached to the request.

mod client;
mod commands;
mod config;
mod output;
mod session;

use anyhow::Result;
use capacity_core::{CapacityError, SizeTier};
use clap::{Parser, Subcommand};
use commands::{finalize, meta, namespaces, org, summary, AppContext};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Namespace capacity CLI
#[derive(Parser)]
#[command(name = "capctl")]
#[command(author, version, about = "CLI for namespace capacity cost estimation", long_about = None)]
pub struct Cli {
    /// Cost service URL (can also be set via CAPCTL_API_URL env var)
    #[arg(long, env = "CAPCTL_API_URL")]
    pub api_url: Option<String>,

    /// Session file (defaults to ~/.config/capctl/session.json)
    #[arg(long, env = "CAPCTL_SESSION")]
    pub session: Option<String>,

    /// Organization directory JSON (uses the built-in directory if not specified)
    #[arg(long, env = "CAPCTL_ORG_MAPPING")]
    pub org_mapping: Option<String>,

    /// Cost service request timeout in seconds
    #[arg(long, env = "CAPCTL_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a namespace
    Add(namespaces::AddArgs),

    /// List namespaces
    List,

    /// Force a node tier for a namespace
    Override {
        /// Namespace ID
        id: u64,

        /// Tier1, Tier2, Tier3 or Tier4
        tier: SizeTier,
    },

    /// Remove all namespaces
    Reset,

    /// Replace all namespaces from a JSON file
    Import {
        /// JSON array of namespace results
        file: PathBuf,
    },

    /// Write namespaces as JSON
    Export {
        /// Output file (stdout if not specified)
        file: Option<PathBuf>,
    },

    /// Summarize costs and sizing by environment
    Summary {
        /// Grouping key
        #[arg(long, value_enum, default_value = "env")]
        by: summary::GroupBy,
    },

    /// Finalize costs with the cost service
    Finalize,

    /// Request metadata and tags
    #[command(subcommand)]
    Meta(MetaCommands),

    /// Organization directory
    #[command(subcommand)]
    Org(OrgCommands),
}

#[derive(Subcommand)]
pub enum MetaCommands {
    /// Set a metadata field
    Set {
        /// Field name (e.g. productOwner, targetDate, duration)
        field: String,

        value: String,
    },

    /// Show all tags
    Show,
}

#[derive(Subcommand)]
pub enum OrgCommands {
    /// List tribes, squads and approvers
    Tribes,

    /// Select a tribe
    SelectTribe {
        tribe: String,
    },

    /// Select a squad of the selected tribe
    SelectSquad {
        squad: String,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_context(cli: &Cli) -> Result<AppContext> {
    let file_config = config::Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring CLI config file");
        config::Config::default()
    });

    let api_url = cli
        .api_url
        .clone()
        .or(file_config.api_url)
        .unwrap_or_else(|| config::DEFAULT_API_URL.to_string());
    let format = cli
        .format
        .or_else(|| {
            file_config
                .default_format
                .as_deref()
                .and_then(output::OutputFormat::from_config)
        })
        .unwrap_or_default();
    let org_mapping = cli
        .org_mapping
        .clone()
        .or(file_config.org_mapping_path)
        .map(PathBuf::from);

    let session_path = config::session_path(cli.session.as_deref())?;
    let session = session::Session::load(&session_path)?;

    Ok(AppContext {
        api_url,
        timeout: Duration::from_secs(cli.timeout_secs),
        org_mapping,
        format,
        session_path,
        session,
    })
}

async fn run(cli: Cli) -> Result<()> {
    let mut ctx = build_context(&cli)?;

    match cli.command {
        Commands::Add(args) => namespaces::add(&mut ctx, args)?,
        Commands::List => namespaces::list(&ctx)?,
        Commands::Override { id, tier } => namespaces::override_size(&mut ctx, id, tier)?,
        Commands::Reset => namespaces::reset(&mut ctx)?,
        Commands::Import { file } => namespaces::import(&mut ctx, &file)?,
        Commands::Export { file } => namespaces::export(&ctx, file.as_deref())?,
        Commands::Summary { by } => summary::show(&ctx, by)?,
        Commands::Finalize => finalize::run(&mut ctx).await?,
        Commands::Meta(meta_cmd) => match meta_cmd {
            MetaCommands::Set { field, value } => meta::set(&mut ctx, &field, &value)?,
            MetaCommands::Show => meta::show(&mut ctx)?,
        },
        Commands::Org(org_cmd) => match org_cmd {
            OrgCommands::Tribes => org::tribes(&ctx)?,
            OrgCommands::SelectTribe { tribe } => org::select_tribe(&mut ctx, &tribe)?,
            OrgCommands::SelectSquad { squad } => org::select_squad(&mut ctx, &squad)?,
        },
    }

    Ok(())
}

/// Print user-facing messages for known errors, the full chain otherwise
fn report(error: &anyhow::Error) {
    match error.downcast_ref::<CapacityError>() {
        Some(capacity_error) => {
            for message in capacity_error.user_messages() {
                output::print_error(&message);
            }
        }
        None => output::print_error(&format!("{:#}", error)),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        report(&e);
        std::process::exit(1);
    }
}
