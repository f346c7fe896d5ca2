//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cadence - Budgets and recurring transactions
#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Budget periods and recurring transaction engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "cadence.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set CADENCE_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server and background scheduler
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires a bearer key from CADENCE_API_KEYS.
        #[arg(long)]
        no_auth: bool,

        /// Do not run the recurrence and closure jobs
        #[arg(long)]
        no_scheduler: bool,
    },

    /// Show database status (encryption, size, counts)
    Status,

    /// Show spend against a user's active budgets
    Budgets {
        /// Owner of the budgets
        #[arg(short, long)]
        user: i64,

        /// Reference date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,

        /// Only budgets with this period: daily, weekly, monthly, yearly
        #[arg(long)]
        period: Option<String>,

        /// Print the overview as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recurring transaction commands
    Recurring {
        #[command(subcommand)]
        action: RecurringAction,
    },

    /// Close elapsed budget periods into history snapshots
    Close {
        /// Only this budget (requires --user)
        #[arg(short, long, requires = "user")]
        budget: Option<i64>,

        /// Owner of --budget
        #[arg(short, long)]
        user: Option<i64>,

        /// Treat this date (YYYY-MM-DD) as now
        #[arg(short, long)]
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RecurringAction {
    /// Materialize every due occurrence now (one scheduler pass)
    Run {
        /// Treat this date (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS) as now
        #[arg(short, long)]
        date: Option<String>,
    },
}
