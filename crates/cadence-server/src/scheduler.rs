//! Background scheduler for recurring transactions and budget closure
//!
//! Two independent jobs share nothing but the database:
//!
//! - recurrence: materializes due occurrences of every active template
//!   (`CADENCE_RECURRING_INTERVAL_SECS`, default 60)
//! - closure: snapshots elapsed budget periods
//!   (`CADENCE_CLOSURE_INTERVAL_HOURS`, default 24, `0` disables)
//!
//! Both run once at startup so downtime is caught up. Each pass runs on the
//! blocking pool and is awaited before the next tick, so a job never overlaps
//! itself; ticks missed while a pass runs are skipped.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use cadence_core::{
    BudgetClosureProcessor, ClosureConfig, Database, ExpanderConfig, RecurrenceExpander,
};

const RECURRING_INTERVAL_ENV: &str = "CADENCE_RECURRING_INTERVAL_SECS";
const RECURRING_MAX_CATCH_UP_ENV: &str = "CADENCE_RECURRING_MAX_CATCH_UP";
const CLOSURE_INTERVAL_ENV: &str = "CADENCE_CLOSURE_INTERVAL_HOURS";
const CLOSURE_BACKFILL_ENV: &str = "CADENCE_CLOSURE_BACKFILL";

/// Configuration for the background jobs
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between recurrence passes
    pub recurring_interval: Duration,
    /// Interval between closure passes, None disables closure
    pub closure_interval: Option<Duration>,
    pub expander: ExpanderConfig,
    pub closure: ClosureConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            recurring_interval: Duration::from_secs(60),
            closure_interval: Some(Duration::from_secs(24 * 3600)),
            expander: ExpanderConfig::default(),
            closure: ClosureConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Parse configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let number = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid {}={:?}", key, raw);
                    None
                }
            }
        };

        let recurring_interval = match number(RECURRING_INTERVAL_ENV) {
            Some(0) => {
                warn!("{} is 0, using 1 second", RECURRING_INTERVAL_ENV);
                Duration::from_secs(1)
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.recurring_interval,
        };

        let closure_interval = match number(CLOSURE_INTERVAL_ENV) {
            Some(0) => {
                warn!("{} is 0, automatic budget closure disabled", CLOSURE_INTERVAL_ENV);
                None
            }
            Some(hours) => Some(Duration::from_secs(hours * 3600)),
            None => defaults.closure_interval,
        };

        let expander = ExpanderConfig {
            max_catch_up: number(RECURRING_MAX_CATCH_UP_ENV)
                .map(|n| n.max(1) as usize)
                .unwrap_or(defaults.expander.max_catch_up),
        };

        let closure = ClosureConfig {
            backfill: number(CLOSURE_BACKFILL_ENV)
                .map(|n| n.max(1) as usize)
                .unwrap_or(defaults.closure.backfill),
        };

        Self {
            recurring_interval,
            closure_interval,
            expander,
            closure,
        }
    }
}

/// Start the background jobs
///
/// Returns the spawned tasks; they run until aborted or the runtime shuts down.
pub fn start_scheduler(db: Database, config: SchedulerConfig) -> Vec<JoinHandle<()>> {
    info!(
        "Starting scheduler: recurrence every {}s, closure {}",
        config.recurring_interval.as_secs(),
        config
            .closure_interval
            .map(|d| format!("every {}h", d.as_secs() / 3600))
            .unwrap_or_else(|| "disabled".to_string())
    );

    let mut handles = vec![spawn_recurring_job(
        db.clone(),
        config.recurring_interval,
        config.expander.clone(),
    )];

    if let Some(closure_interval) = config.closure_interval {
        handles.push(spawn_closure_job(db, closure_interval, config.closure));
    }

    handles
}

fn spawn_recurring_job(db: Database, every: Duration, config: ExpanderConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // First tick completes immediately: catch up at startup
            ticker.tick().await;

            let db = db.clone();
            let config = config.clone();
            let pass = tokio::task::spawn_blocking(move || {
                let now = chrono::Local::now().naive_local();
                RecurrenceExpander::with_config(&db, config).run(now)
            })
            .await;

            // The pass logs its own summary
            match pass {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!("Recurring pass failed: {}", e),
                Err(e) => error!("Recurring pass panicked: {}", e),
            }
        }
    })
}

fn spawn_closure_job(db: Database, every: Duration, config: ClosureConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let db = db.clone();
            let config = config.clone();
            let pass = tokio::task::spawn_blocking(move || {
                let now = chrono::Local::now().naive_local();
                BudgetClosureProcessor::with_config(&db, config).run(now)
            })
            .await;

            match pass {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!("Closure pass failed: {}", e),
                Err(e) => error!("Closure pass panicked: {}", e),
            }
        }
    })
}
