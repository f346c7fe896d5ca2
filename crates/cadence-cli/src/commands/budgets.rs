//! Budget overview command

use anyhow::{anyhow, Result};
use cadence_core::db::Database;
use cadence_core::models::{BudgetProgress, Period};
use cadence_core::SpendAggregator;

use super::{parse_date_arg, truncate};

const BAR_WIDTH: usize = 20;

/// Render progress in [0, 1] as a fixed-width bar
pub fn progress_bar(progress: f64) -> String {
    let filled = (progress.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn budget_label(budget: &BudgetProgress) -> String {
    match &budget.name {
        Some(name) => truncate(name, 24),
        None => format!("Budget #{}", budget.budget_id),
    }
}

pub fn cmd_budgets(
    db: &Database,
    user_id: i64,
    date: Option<&str>,
    period: Option<&str>,
    json: bool,
) -> Result<()> {
    let reference = parse_date_arg(date)?;
    let period = period
        .map(|p| p.parse::<Period>().map_err(|e| anyhow!(e)))
        .transpose()?;

    let overview = SpendAggregator::new(db).overview(user_id, reference, period)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    println!();
    println!(
        "💰 Budgets for user {} ({} window {} to {})",
        user_id,
        overview.period,
        overview.from.date(),
        overview.to.date()
    );
    println!();

    if overview.budgets.is_empty() {
        println!("   No active budgets.");
        return Ok(());
    }

    for budget in &overview.budgets {
        let marker = if budget.progress >= 1.0 { "🔴" } else { "🟢" };
        println!(
            "   {} {:<24} {:>8} {} {:>9.2} / {:>9.2}  ({:.2} left)",
            marker,
            budget_label(budget),
            budget.period.as_str(),
            progress_bar(budget.progress),
            budget.spent,
            budget.limit,
            budget.remaining
        );
    }

    let summary = &overview.summary;
    println!();
    println!(
        "   Total: {:.2} spent of {:.2} across {} budget(s), {:.2} remaining",
        summary.total_spent, summary.total_limit, summary.count, summary.remaining
    );
    println!();

    Ok(())
}
