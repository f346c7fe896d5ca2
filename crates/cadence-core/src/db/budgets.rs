//! Budget operations

use rusqlite::{params, Row};

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Budget, BudgetUpdate, NewBudget, Period};

const BUDGET_COLUMNS: &str =
    "id, user_id, name, period, amount_limit, start_date, category_id, wallet_id, active, created_at";

fn row_to_budget(row: &Row) -> rusqlite::Result<Budget> {
    let period_str: String = row.get(3)?;
    let start_date_str: String = row.get(5)?;
    let created_at_str: String = row.get(9)?;

    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        period: Period::parse_or_monthly(&period_str),
        limit: row.get(4)?,
        start_date: parse_date(&start_date_str)?,
        category_id: row.get(6)?,
        wallet_id: row.get(7)?,
        active: row.get(8)?,
        created_at: parse_datetime(&created_at_str),
    })
}

fn validate_limit(limit: f64) -> Result<()> {
    if limit.is_finite() && limit > 0.0 {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Budget limit must be positive, got {}",
            limit
        )))
    }
}

impl Database {
    /// Create a budget owned by `user_id`
    pub fn create_budget(&self, user_id: i64, budget: &NewBudget) -> Result<i64> {
        validate_limit(budget.limit)?;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO budgets (user_id, name, period, amount_limit, start_date, category_id, wallet_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                budget.name,
                budget.period.as_str(),
                budget.limit,
                budget.start_date.to_string(),
                budget.category_id,
                budget.wallet_id,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a budget by ID regardless of owner
    pub fn get_budget(&self, id: i64) -> Result<Option<Budget>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            &format!("SELECT {} FROM budgets WHERE id = ?", BUDGET_COLUMNS),
            params![id],
            row_to_budget,
        );

        match result {
            Ok(budget) => Ok(Some(budget)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a budget, checking it belongs to `user_id`
    pub fn get_budget_for_user(&self, user_id: i64, id: i64) -> Result<Budget> {
        let budget = self
            .get_budget(id)?
            .ok_or_else(|| Error::NotFound(format!("Budget {}", id)))?;

        if budget.user_id != user_id {
            return Err(Error::Forbidden(format!("Budget {}", id)));
        }

        Ok(budget)
    }

    /// Active budgets of one user, optionally restricted to one period
    pub fn list_active_budgets(&self, user_id: i64, period: Option<Period>) -> Result<Vec<Budget>> {
        let conn = self.conn()?;

        let mut query = format!(
            "SELECT {} FROM budgets WHERE user_id = ? AND active = 1",
            BUDGET_COLUMNS
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(p) = period {
            query.push_str(" AND period = ?");
            params_vec.push(Box::new(p.as_str()));
        }
        query.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let budgets = stmt
            .query_map(params_refs.as_slice(), row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(budgets)
    }

    /// Every active budget across all users (closure passes)
    pub fn list_all_active_budgets(&self) -> Result<Vec<Budget>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM budgets WHERE active = 1 ORDER BY id",
            BUDGET_COLUMNS
        ))?;

        let budgets = stmt
            .query_map([], row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(budgets)
    }

    /// Apply a partial update and return the updated budget
    pub fn update_budget(&self, user_id: i64, id: i64, update: &BudgetUpdate) -> Result<Budget> {
        let current = self.get_budget_for_user(user_id, id)?;

        let limit = update.limit.unwrap_or(current.limit);
        validate_limit(limit)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE budgets
            SET name = ?, period = ?, amount_limit = ?, start_date = ?, category_id = ?,
                wallet_id = ?, active = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![
                update.name.clone().or(current.name),
                update.period.unwrap_or(current.period).as_str(),
                limit,
                update.start_date.unwrap_or(current.start_date).to_string(),
                update.category_id.or(current.category_id),
                update.wallet_id.or(current.wallet_id),
                update.active.unwrap_or(current.active),
                id,
            ],
        )?;
        drop(conn);

        self.get_budget_for_user(user_id, id)
    }

    /// Soft delete a budget (`active = false`); its history is kept
    pub fn deactivate_budget(&self, user_id: i64, id: i64) -> Result<()> {
        self.get_budget_for_user(user_id, id)?;

        let conn = self.conn()?;
        conn.execute(
            "UPDATE budgets SET active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![id],
        )?;

        Ok(())
    }

    /// Count active budgets (status output)
    pub fn count_active_budgets(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM budgets WHERE active = 1", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }
}
