//! Brigada CLI - operator command line over the Brigada data layer.
//!
//! Opens the same local store the app uses and drives the repositories
//! directly. Useful for seeding, inspecting incidents and sending alerts
//! from a terminal.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use br_core::config::{AppConfig, ConfigHandle};
use br_core::error::BrResult;
use br_core::logging;

/// Brigada - incident reporting and alerts.
#[derive(Parser)]
#[command(
    name = "brigada",
    version,
    about = "Brigada incident reporting CLI",
    long_about = "A command-line interface over the Brigada local store.\n\
                   Report and dispatch incidents, broadcast alerts and read notifications."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Keep database, photos and logs inside this directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Email or username to act as.
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Password for --user (prompted when omitted).
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

/// Who the command runs as.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the local store and seed the demo accounts.
    Init,
    /// Accounts: login check, registration, profile.
    Account {
        #[command(subcommand)]
        action: commands::account::AccountAction,
    },
    /// List, report, take and close incidents.
    Incidents {
        #[command(subcommand)]
        action: commands::incidents::IncidentsAction,
    },
    /// Broadcast and withdraw alerts (administrators).
    Alerts {
        #[command(subcommand)]
        action: commands::alerts::AlertsAction,
    },
    /// Read and manage your notifications.
    Notifications {
        #[command(subcommand)]
        action: commands::alerts::NotificationsAction,
    },
    /// Talk to support.
    Chat {
        #[command(subcommand)]
        action: commands::chat::ChatAction,
    },
    /// Database maintenance.
    Db {
        #[command(subcommand)]
        action: commands::db::DbAction,
    },
    /// View configuration.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn load_config(cli: &Cli) -> BrResult<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_default()?,
    };
    if let Some(dir) = &cli.data_dir {
        let rooted = AppConfig::rooted_at(dir);
        config.database.path = rooted.database.path;
        config.logging.directory = rooted.logging.directory;
        config.media.photo_dir = rooted.media.photo_dir;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> BrResult<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let log_dir = config.effective_log_dir()?;
    let _guard = logging::init_logging(&config.logging, &log_dir)?;

    info!("Brigada CLI v{}", br_core::constants::APP_VERSION);

    let config = ConfigHandle::new(config);
    let credentials = Credentials {
        user: cli.user,
        password: cli.password,
    };

    let result = match cli.command {
        Commands::Init => commands::init::run(config, cli.format).await,
        Commands::Account { action } => {
            commands::account::run(config, credentials, action, cli.format).await
        }
        Commands::Incidents { action } => {
            commands::incidents::run(config, credentials, action, cli.format).await
        }
        Commands::Alerts { action } => {
            commands::alerts::run_alerts(config, credentials, action, cli.format).await
        }
        Commands::Notifications { action } => {
            commands::alerts::run_notifications(config, credentials, action, cli.format).await
        }
        Commands::Chat { action } => {
            commands::chat::run(config, credentials, action, cli.format).await
        }
        Commands::Db { action } => commands::db::run(config, action, cli.format).await,
        Commands::Config { action } => commands::config::run(config, action, cli.format).await,
    };

    if let Err(e) = &result {
        commands::report_error(e);
    }
    result
}
