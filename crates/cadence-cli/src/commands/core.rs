//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `parse_date_arg` - Reference date parsing for --date flags
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{bail, Context, Result};
use cadence_core::db::Database;
use cadence_core::period::start_of_day;
use chrono::{NaiveDate, NaiveDateTime};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Parse a --date argument, defaulting to the current local time
///
/// A bare day means the start of that day.
pub fn parse_date_arg(value: Option<&str>) -> Result<NaiveDateTime> {
    let Some(value) = value else {
        return Ok(chrono::Local::now().naive_local());
    };

    if let Ok(instant) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(instant);
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(day) => Ok(start_of_day(day)),
        Err(_) => bail!(
            "Invalid date '{}' (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)",
            value
        ),
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    // Opening runs the schema migrations
    let db = open_db(db_path, no_encrypt)?;
    println!("   Schema ready ({} budgets)", db.count_active_budgets()?);

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Start the API and scheduler: cadence serve");
    println!("  2. Check budgets: cadence budgets --user 1");

    Ok(())
}
