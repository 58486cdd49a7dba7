//! Command-line interface definition.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use unical_core::Provider;

/// unical - one view over Google, Outlook and Apple calendars and tasks
#[derive(Debug, Parser)]
#[command(name = "unical")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "UNICAL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one sync cycle and print a summary
    Sync {
        /// Only sync this provider (google, outlook, apple)
        #[arg(long, short)]
        provider: Option<Provider>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Sync, then search events and tasks
    Search(SearchArgs),

    /// Keep syncing on the configured interval and print sync signals
    Watch {
        /// Override the interval from the configuration, in minutes
        #[arg(long)]
        interval: Option<u64>,

        /// Log as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct SearchArgs {
    /// Case-insensitive keyword; empty matches everything
    #[arg(default_value = "")]
    pub keyword: String,

    /// First day of the date range (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day of the date range (YYYY-MM-DD), defaults to --from
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,

    /// Restrict to providers (can be repeated)
    #[arg(long = "provider", short, action = clap::ArgAction::Append)]
    pub providers: Vec<Provider>,

    /// Restrict to owners (can be repeated)
    #[arg(long = "owner", action = clap::ArgAction::Append)]
    pub owners: Vec<String>,

    /// Include completed tasks
    #[arg(long)]
    pub include_completed: bool,

    /// Only search events
    #[arg(long, conflicts_with = "tasks_only")]
    pub events_only: bool,

    /// Only search tasks
    #[arg(long)]
    pub tasks_only: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration
    Dump,
    /// Check the configuration and resolve secret references
    Validate,
}
