//! Budget period closure
//!
//! Windows are derived from `period`, `start_date` and "now"; closing one
//! writes an immutable snapshot of its final spend. The unique key on
//! `(budget, from, to)` makes closing the same window twice a no-op.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::aggregate::SpendAggregator;
use crate::db::Database;
use crate::error::Result;
use crate::models::{Budget, BudgetPeriodSnapshot};
use crate::period::{compute_range, previous_range, DateRange};

/// Closure configuration
#[derive(Debug, Clone)]
pub struct ClosureConfig {
    /// Most recent elapsed windows closed per budget in one pass
    pub backfill: usize,
}

impl Default for ClosureConfig {
    fn default() -> Self {
        Self { backfill: 12 }
    }
}

/// Results of one closure pass
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureResults {
    pub budgets_checked: usize,
    pub snapshots_created: usize,
    pub budgets_failed: usize,
}

/// Elapsed windows of `budget` still waiting for a snapshot, oldest first
///
/// A window has elapsed once it ends before `now`. Windows ending before the
/// budget starts, or not after `closed_until`, are skipped.
pub fn elapsed_windows(
    budget: &Budget,
    closed_until: Option<NaiveDateTime>,
    now: NaiveDateTime,
    backfill: usize,
) -> Vec<DateRange> {
    let start = budget.start();
    let mut windows = Vec::new();
    let mut window = previous_range(budget.period, compute_range(budget.period, now));

    while windows.len() < backfill
        && window.to >= start
        && closed_until.map_or(true, |closed| window.to > closed)
    {
        windows.push(window);
        window = previous_range(budget.period, window);
    }

    windows.reverse();
    windows
}

/// Writes snapshots for budget periods that have fully elapsed
pub struct BudgetClosureProcessor<'a> {
    db: &'a Database,
    config: ClosureConfig,
}

impl<'a> BudgetClosureProcessor<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            config: ClosureConfig::default(),
        }
    }

    pub fn with_config(db: &'a Database, config: ClosureConfig) -> Self {
        Self { db, config }
    }

    /// Close elapsed windows of every active budget
    ///
    /// A failing budget is logged and counted; the others still close.
    pub fn run(&self, now: NaiveDateTime) -> Result<ClosureResults> {
        let budgets = self.db.list_all_active_budgets()?;
        let mut results = ClosureResults {
            budgets_checked: budgets.len(),
            ..Default::default()
        };

        for budget in &budgets {
            match self.close_elapsed(budget, now) {
                Ok(created) => results.snapshots_created += created.len(),
                Err(e) => {
                    results.budgets_failed += 1;
                    if e.is_transient() {
                        warn!(budget_id = budget.id, error = %e, "Budget closure failed, retrying next pass");
                    } else {
                        error!(budget_id = budget.id, error = %e, "Budget closure failed");
                    }
                }
            }
        }

        if results.snapshots_created > 0 || results.budgets_failed > 0 {
            info!(
                "Closure complete: {} budgets checked, {} periods closed, {} failed",
                results.budgets_checked, results.snapshots_created, results.budgets_failed
            );
        } else {
            debug!(budgets = results.budgets_checked, "No budget periods to close");
        }

        Ok(results)
    }

    /// Force closure of one of the user's budgets outside the schedule
    pub fn close_budget(
        &self,
        user_id: i64,
        budget_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<BudgetPeriodSnapshot>> {
        let budget = self.db.get_budget_for_user(user_id, budget_id)?;
        self.close_elapsed(&budget, now)
    }

    fn close_elapsed(&self, budget: &Budget, now: NaiveDateTime) -> Result<Vec<BudgetPeriodSnapshot>> {
        let closed_until = self.db.latest_snapshot_end(budget.id)?;
        let windows = elapsed_windows(budget, closed_until, now, self.config.backfill);

        let aggregator = SpendAggregator::new(self.db);
        let mut created = Vec::new();

        for window in windows {
            let progress = aggregator.progress_for_window(budget, window)?;
            let clamped = DateRange::new(progress.from, progress.to);

            if let Some(snapshot) =
                self.db
                    .insert_snapshot(budget, clamped, progress.spent, progress.remaining)?
            {
                debug!(
                    budget_id = budget.id,
                    from = %snapshot.period_from,
                    to = %snapshot.period_to,
                    spent = snapshot.spent,
                    "Closed budget period"
                );
                created.push(snapshot);
            }
        }

        Ok(created)
    }
}
