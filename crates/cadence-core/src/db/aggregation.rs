//! Spend aggregation queries
//!
//! Every sum here counts only what budgets measure: active expense rows that
//! are not excluded from stats and are not recurring templates.

use rusqlite::params;

use super::{format_instant, Database};
use crate::error::Result;
use crate::period::DateRange;

const COUNTED_EXPENSES: &str =
    "type = 'expense' AND active = 1 AND exclude_from_stats = 0 AND is_recurring = 0";

/// Filter for a single point sum
#[derive(Debug, Clone, Copy)]
pub struct SpendFilter {
    pub user_id: i64,
    pub range: DateRange,
    pub wallet_id: Option<i64>,
    pub category_id: Option<i64>,
}

/// Grouped sums shared by every budget of one window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpendTotals {
    /// Spend per wallet (`None` = transactions without a wallet)
    pub by_wallet: Vec<(Option<i64>, f64)>,
    /// Spend per (wallet, category)
    pub by_wallet_category: Vec<(Option<i64>, Option<i64>, f64)>,
}

impl Database {
    /// Both grouped sums for one user over one window
    pub fn spend_totals(&self, user_id: i64, range: DateRange) -> Result<SpendTotals> {
        let conn = self.conn()?;
        let (from, to) = (format_instant(range.from), format_instant(range.to));

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT wallet_id, COALESCE(SUM(amount), 0.0)
            FROM transactions
            WHERE user_id = ? AND date BETWEEN ? AND ? AND {}
            GROUP BY wallet_id
            "#,
            COUNTED_EXPENSES
        ))?;
        let by_wallet = stmt
            .query_map(params![user_id, from, to], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT wallet_id, category_id, COALESCE(SUM(amount), 0.0)
            FROM transactions
            WHERE user_id = ? AND date BETWEEN ? AND ? AND {}
            GROUP BY wallet_id, category_id
            "#,
            COUNTED_EXPENSES
        ))?;
        let by_wallet_category = stmt
            .query_map(params![user_id, from, to], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(SpendTotals {
            by_wallet,
            by_wallet_category,
        })
    }

    /// Total spend matching `filter`
    pub fn sum_spend(&self, filter: &SpendFilter) -> Result<f64> {
        let conn = self.conn()?;

        let mut query = format!(
            r#"
            SELECT COALESCE(SUM(amount), 0.0)
            FROM transactions
            WHERE user_id = ? AND date BETWEEN ? AND ? AND {}
            "#,
            COUNTED_EXPENSES
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(filter.user_id),
            Box::new(format_instant(filter.range.from)),
            Box::new(format_instant(filter.range.to)),
        ];

        if let Some(wallet_id) = filter.wallet_id {
            query.push_str(" AND wallet_id = ?");
            params_vec.push(Box::new(wallet_id));
        }
        if let Some(category_id) = filter.category_id {
            query.push_str(" AND category_id = ?");
            params_vec.push(Box::new(category_id));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let total: f64 = conn.query_row(&query, params_refs.as_slice(), |row| row.get(0))?;

        Ok(total)
    }
}
