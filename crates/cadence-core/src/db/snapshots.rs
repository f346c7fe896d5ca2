//! Budget period snapshot operations

use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_instant, parse_datetime, parse_instant, Database};
use crate::error::Result;
use crate::models::{Budget, BudgetPeriodSnapshot};
use crate::period::DateRange;

const SNAPSHOT_COLUMNS: &str =
    "id, user_id, budget_id, period_from, period_to, amount_limit, spent, remaining, closed_at";

fn row_to_snapshot(row: &Row) -> rusqlite::Result<BudgetPeriodSnapshot> {
    let from_str: String = row.get(3)?;
    let to_str: String = row.get(4)?;
    let closed_at_str: String = row.get(8)?;

    Ok(BudgetPeriodSnapshot {
        id: row.get(0)?,
        user_id: row.get(1)?,
        budget_id: row.get(2)?,
        period_from: parse_instant(&from_str)?,
        period_to: parse_instant(&to_str)?,
        limit: row.get(5)?,
        spent: row.get(6)?,
        remaining: row.get(7)?,
        closed_at: parse_datetime(&closed_at_str),
    })
}

impl Database {
    /// Record a closed window for `budget`
    ///
    /// Returns `None` if that window was already closed; the existing snapshot is left as is.
    pub fn insert_snapshot(
        &self,
        budget: &Budget,
        window: DateRange,
        spent: f64,
        remaining: f64,
    ) -> Result<Option<BudgetPeriodSnapshot>> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            r#"
            INSERT INTO budget_period_snapshots
                (user_id, budget_id, period_from, period_to, amount_limit, spent, remaining)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(budget_id, period_from, period_to) DO NOTHING
            "#,
            params![
                budget.user_id,
                budget.id,
                format_instant(window.from),
                format_instant(window.to),
                budget.limit,
                spent,
                remaining,
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }

        let snapshot = conn.query_row(
            &format!(
                "SELECT {} FROM budget_period_snapshots WHERE id = ?",
                SNAPSHOT_COLUMNS
            ),
            params![conn.last_insert_rowid()],
            row_to_snapshot,
        )?;

        Ok(Some(snapshot))
    }

    /// End of the most recent closed window of a budget
    pub fn latest_snapshot_end(&self, budget_id: i64) -> Result<Option<NaiveDateTime>> {
        let conn = self.conn()?;

        let latest: Option<String> = conn
            .query_row(
                "SELECT MAX(period_to) FROM budget_period_snapshots WHERE budget_id = ?",
                params![budget_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        Ok(latest.map(|s| parse_instant(&s)).transpose()?)
    }

    /// Closed windows of one of the user's budgets, oldest first
    pub fn list_snapshots(&self, user_id: i64, budget_id: i64) -> Result<Vec<BudgetPeriodSnapshot>> {
        self.get_budget_for_user(user_id, budget_id)?;
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM budget_period_snapshots WHERE budget_id = ? ORDER BY period_from",
            SNAPSHOT_COLUMNS
        ))?;

        let snapshots = stmt
            .query_map(params![budget_id], row_to_snapshot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(snapshots)
    }

    /// Count snapshots (status output)
    pub fn count_snapshots(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM budget_period_snapshots", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }
}
