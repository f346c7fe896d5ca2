//! Cadence CLI - Budgets and recurring transactions
//!
//! Usage:
//!   cadence init                      Initialize database
//!   cadence serve --port 3000         Start web server and scheduler
//!   cadence budgets --user 1          Show budget progress
//!   cadence recurring run             Materialize due recurring transactions
//!   cadence close                     Close elapsed budget periods

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
            no_scheduler,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, no_scheduler, cli.no_encrypt).await,
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt),
        Commands::Budgets {
            user,
            date,
            period,
            json,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_budgets(&db, user, date.as_deref(), period.as_deref(), json)
        }
        Commands::Recurring { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                RecurringAction::Run { date } => commands::cmd_recurring_run(&db, date.as_deref()),
            }
        }
        Commands::Close { budget, user, date } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match (budget, user) {
                (Some(budget_id), Some(user_id)) => {
                    commands::cmd_close_budget(&db, user_id, budget_id, date.as_deref())
                }
                _ => commands::cmd_close_all(&db, date.as_deref()),
            }
        }
    }
}
