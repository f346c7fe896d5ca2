//! One-off scheduler passes: recurrence expansion and budget closure

use anyhow::Result;
use cadence_core::db::Database;
use cadence_core::{BudgetClosureProcessor, RecurrenceExpander};

use super::parse_date_arg;

pub fn cmd_recurring_run(db: &Database, date: Option<&str>) -> Result<()> {
    let now = parse_date_arg(date)?;
    println!("🔁 Materializing recurring transactions due by {}...", now);

    let results = RecurrenceExpander::new(db).run(now)?;

    println!("   Templates checked: {}", results.templates_checked);
    println!("   Occurrences created: {}", results.occurrences_created);
    if results.templates_failed > 0 {
        println!(
            "   ⚠️  {} template(s) failed, they will be retried on the next run",
            results.templates_failed
        );
    }
    println!("✅ Done");

    Ok(())
}

pub fn cmd_close_all(db: &Database, date: Option<&str>) -> Result<()> {
    let now = parse_date_arg(date)?;
    println!("📕 Closing budget periods elapsed before {}...", now);

    let results = BudgetClosureProcessor::new(db).run(now)?;

    println!("   Budgets checked: {}", results.budgets_checked);
    println!("   Snapshots created: {}", results.snapshots_created);
    if results.budgets_failed > 0 {
        println!(
            "   ⚠️  {} budget(s) failed, they will be retried on the next run",
            results.budgets_failed
        );
    }
    println!("✅ Done");

    Ok(())
}

pub fn cmd_close_budget(db: &Database, user_id: i64, budget_id: i64, date: Option<&str>) -> Result<()> {
    let now = parse_date_arg(date)?;
    println!("📕 Closing elapsed periods of budget #{}...", budget_id);

    let created = BudgetClosureProcessor::new(db).close_budget(user_id, budget_id, now)?;

    if created.is_empty() {
        println!("   Nothing to close");
    }
    for snapshot in &created {
        println!(
            "   {} to {}: spent {:.2} of {:.2} ({:.2} remaining)",
            snapshot.period_from.date(),
            snapshot.period_to.date(),
            snapshot.spent,
            snapshot.limit,
            snapshot.remaining
        );
    }
    println!("✅ Done");

    Ok(())
}
