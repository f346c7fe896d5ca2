//! Budget spend aggregation
//!
//! Budgets are grouped by period so each group shares one window. Within a
//! group, budgets that started on or before the window share two grouped sums;
//! budgets that started inside the window get their own clamped point sum.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::db::{Database, SpendFilter, SpendTotals};
use crate::error::Result;
use crate::models::{Budget, BudgetProgress, BudgetsOverview, BudgetsSummary, Period};
use crate::period::{clamp_to_start, compute_range, DateRange};

impl SpendTotals {
    /// Spend that counts against a budget with the given scope
    ///
    /// A category without a wallet adds up that category across every wallet;
    /// no scope at all means the user's whole spend.
    pub fn spent_for(&self, wallet_id: Option<i64>, category_id: Option<i64>) -> f64 {
        match (wallet_id, category_id) {
            (Some(wallet), Some(category)) => self
                .by_wallet_category
                .iter()
                .filter(|(w, c, _)| *w == Some(wallet) && *c == Some(category))
                .map(|(_, _, sum)| sum)
                .sum(),
            (None, Some(category)) => self
                .by_wallet_category
                .iter()
                .filter(|(_, c, _)| *c == Some(category))
                .map(|(_, _, sum)| sum)
                .sum(),
            (Some(wallet), None) => self
                .by_wallet
                .iter()
                .filter(|(w, _)| *w == Some(wallet))
                .map(|(_, sum)| sum)
                .sum(),
            (None, None) => self.by_wallet.iter().map(|(_, sum)| sum).sum(),
        }
    }
}

/// `(remaining, progress)` for a limit and an amount spent
///
/// Remaining never goes below zero and progress is capped at 1.
pub fn remaining_and_progress(limit: f64, spent: f64) -> (f64, f64) {
    let remaining = (limit - spent).max(0.0);
    let progress = if limit > 0.0 {
        (spent / limit).min(1.0)
    } else {
        0.0
    };
    (remaining, progress)
}

/// True when the budget starts after the window opens and needs its own clamped sum
pub fn is_late_start(budget: &Budget, window: &DateRange) -> bool {
    budget.start() > window.from
}

fn progress(budget: &Budget, window: DateRange, spent: f64) -> BudgetProgress {
    let (remaining, progress) = remaining_and_progress(budget.limit, spent);
    BudgetProgress {
        budget_id: budget.id,
        name: budget.name.clone(),
        period: budget.period,
        category_id: budget.category_id,
        wallet_id: budget.wallet_id,
        limit: budget.limit,
        spent,
        remaining,
        progress,
        from: window.from,
        to: window.to,
    }
}

/// Read-only spend calculator for budgets
pub struct SpendAggregator<'a> {
    db: &'a Database,
}

impl<'a> SpendAggregator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Progress of every active budget of `user_id` at `reference`
    ///
    /// The overview's own window is that of the requested period, or of
    /// monthly budgets when no period is given.
    pub fn overview(
        &self,
        user_id: i64,
        reference: NaiveDateTime,
        period: Option<Period>,
    ) -> Result<BudgetsOverview> {
        let overview_period = period.unwrap_or_default();
        let overview_range = compute_range(overview_period, reference);

        let budgets = self.db.list_active_budgets(user_id, period)?;
        if budgets.is_empty() {
            return Ok(BudgetsOverview::empty(overview_period, overview_range));
        }

        let mut groups: BTreeMap<Period, Vec<Budget>> = BTreeMap::new();
        for budget in budgets {
            groups.entry(budget.period).or_default().push(budget);
        }

        let mut results = Vec::new();
        for (group_period, group) in &groups {
            let window = compute_range(*group_period, reference);
            results.extend(self.progress_for_group(user_id, window, group)?);
        }
        results.sort_by_key(|p| p.budget_id);

        let summary = summarize(&results);
        debug!(
            user_id,
            groups = groups.len(),
            budgets = summary.count,
            "Computed budgets overview"
        );

        Ok(BudgetsOverview {
            period: overview_period,
            from: overview_range.from,
            to: overview_range.to,
            summary,
            budgets: results,
        })
    }

    /// Progress of one budget in the window containing `reference`
    pub fn budget_progress(
        &self,
        user_id: i64,
        budget_id: i64,
        reference: NaiveDateTime,
    ) -> Result<BudgetProgress> {
        let budget = self.db.get_budget_for_user(user_id, budget_id)?;
        let window = compute_range(budget.period, reference);
        self.progress_for_window(&budget, window)
    }

    /// Progress of one budget over an explicit window, clamped to the budget start
    pub fn progress_for_window(&self, budget: &Budget, window: DateRange) -> Result<BudgetProgress> {
        let clamped = clamp_to_start(window, budget.start());
        let spent = self.clamped_spend(budget, clamped)?;
        Ok(progress(budget, clamped, spent))
    }

    fn progress_for_group(
        &self,
        user_id: i64,
        window: DateRange,
        budgets: &[Budget],
    ) -> Result<Vec<BudgetProgress>> {
        let (late, normal): (Vec<&Budget>, Vec<&Budget>) =
            budgets.iter().partition(|b| is_late_start(b, &window));

        let mut results = Vec::with_capacity(budgets.len());

        if !normal.is_empty() {
            let totals = self.db.spend_totals(user_id, window)?;
            for budget in normal {
                let spent = totals.spent_for(budget.wallet_id, budget.category_id);
                results.push(progress(budget, window, spent));
            }
        }

        for budget in late {
            results.push(self.progress_for_window(budget, window)?);
        }

        Ok(results)
    }

    fn clamped_spend(&self, budget: &Budget, window: DateRange) -> Result<f64> {
        // Starts after the window closes: nothing can count yet
        if window.is_empty() {
            return Ok(0.0);
        }

        self.db.sum_spend(&SpendFilter {
            user_id: budget.user_id,
            range: window,
            wallet_id: budget.wallet_id,
            category_id: budget.category_id,
        })
    }
}

fn summarize(budgets: &[BudgetProgress]) -> BudgetsSummary {
    let total_limit: f64 = budgets.iter().map(|b| b.limit).sum();
    let total_spent: f64 = budgets.iter().map(|b| b.spent).sum();

    BudgetsSummary {
        total_limit,
        total_spent,
        remaining: (total_limit - total_spent).max(0.0),
        count: budgets.len() as i64,
    }
}
