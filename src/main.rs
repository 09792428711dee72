mod commands;
mod render;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use calsync_core::config::CalSyncConfig;
use calsync_core::store::Store;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calsync")]
#[command(about = "Replay remote calendar change streams into a local event store")]
struct Cli {
    /// Log debug output to stderr (overrides CALSYNC_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: AccountCommand,
    },
    /// Manage calendars
    Calendar {
        #[command(subcommand)]
        command: CalendarCommand,
    },
    /// Merge a recorded change stream (or a CalDAV .ics resource) into a calendar
    Pull {
        /// Calendar to merge into
        calendar: String,

        /// JSON-lines notification stream, or an .ics file with --ics
        file: PathBuf,

        /// Treat the file as a single CalDAV resource
        #[arg(long)]
        ics: bool,

        /// Resource URL recorded on the event (with --ics)
        #[arg(long, requires = "ics")]
        url: Option<String>,

        /// Resource etag recorded as the event sync token (with --ics)
        #[arg(long, requires = "ics")]
        etag: Option<String>,

        /// Remote sync token of the calendar at the time of the pull
        #[arg(long)]
        sync_token: Option<String>,
    },
    /// Show what the store holds
    Status {
        /// Only show this calendar
        #[arg(short, long)]
        calendar: Option<String>,
    },
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Register an account
    Add {
        id: String,

        /// Provider name (e.g., "caldav")
        #[arg(long)]
        provider: Option<String>,

        /// User name on the provider
        #[arg(long)]
        user: Option<String>,
    },
    /// Remove an account together with all of its calendars and records
    Remove { id: String },
}

#[derive(Subcommand)]
enum CalendarCommand {
    /// Register a calendar under an account
    Add {
        account: String,
        id: String,

        /// Display name (defaults to the id)
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = CalSyncConfig::load()?;
    let store = open_store(&config)?;

    match cli.command {
        Commands::Account { command } => match command {
            AccountCommand::Add { id, provider, user } => {
                commands::account::add(&store, id, provider, user)
            }
            AccountCommand::Remove { id } => commands::account::remove(&store, &id),
        },
        Commands::Calendar { command } => match command {
            CalendarCommand::Add { account, id, name } => {
                commands::calendar::add(&store, &account, id, name)
            }
        },
        Commands::Pull {
            calendar,
            file,
            ics,
            url,
            etag,
            sync_token,
        } => {
            let source = if ics {
                commands::pull::Source::Ics { path: file, url, etag }
            } else {
                commands::pull::Source::JsonLines(file)
            };
            commands::pull::run(&store, &config, &calendar, source, sync_token).await
        }
        Commands::Status { calendar } => commands::status::run(&store, calendar.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("CALSYNC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &CalSyncConfig) -> Result<Store> {
    let path = config.store_path();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(Store::open(path)?)
}
