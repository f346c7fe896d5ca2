//! Server command implementation

use std::path::Path;

use anyhow::Result;

use super::open_db;
use cadence_server::{parse_api_keys, SchedulerConfig, ServerConfig, API_KEYS_ENV};

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_scheduler: bool,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Cadence web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    // Parse API keys from environment (comma-separated)
    let api_keys = parse_api_keys(&std::env::var(API_KEYS_ENV).unwrap_or_default());

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else if api_keys.is_empty() {
        println!("   ❌ Authentication: no API keys configured ({})", API_KEYS_ENV);
        println!("      Every request will be rejected until keys are set");
    } else {
        println!(
            "   🔑 API keys: {} configured ({})",
            api_keys.len(),
            API_KEYS_ENV
        );
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }

    let scheduler = if no_scheduler {
        println!("   ⏸️  Scheduler: disabled (--no-scheduler)");
        None
    } else {
        let config = SchedulerConfig::from_env();
        println!(
            "   ⏱️  Scheduler: recurrence every {}s, closure {}",
            config.recurring_interval.as_secs(),
            config
                .closure_interval
                .map(|d| format!("every {}h", d.as_secs() / 3600))
                .unwrap_or_else(|| "disabled".to_string())
        );
        Some(config)
    };
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let config = ServerConfig {
        require_auth: !no_auth,
        allowed_origins: vec![],
        api_keys,
    };

    cadence_server::serve_with_config(db, host, port, config, scheduler).await?;

    Ok(())
}
