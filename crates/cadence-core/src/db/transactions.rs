//! Transaction operations
//!
//! Record-level helpers taking a `&Connection` are shared with the recurrence
//! expander and the series mutator so they can run inside one SQL transaction.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_instant, parse_datetime, parse_instant, Database};
use crate::error::{Error, Result};
use crate::models::{NewTransaction, Recurrence, Transaction, TransactionPatch, TransactionType};

const TRANSACTION_COLUMNS: &str = r#"
    id, user_id, type, amount, date, description, wallet_id, category_id, subcategory_id,
    trip_id, investment_asset_id, active, exclude_from_stats, is_recurring, recurrence,
    recurrence_end, parent_id, created_at, slot_date
"#;

pub(crate) fn validate_amount(amount: f64) -> Result<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Amount must be a non-negative number, got {}",
            amount
        )))
    }
}

impl Database {
    pub(crate) fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
        let type_str: String = row.get(2)?;
        let date_str: String = row.get(4)?;
        let recurrence_str: Option<String> = row.get(14)?;
        let recurrence_end_str: Option<String> = row.get(15)?;
        let created_at_str: String = row.get(17)?;
        let slot_str: Option<String> = row.get(18)?;

        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            tx_type: type_str.parse().unwrap_or(TransactionType::Expense),
            amount: row.get(3)?,
            date: parse_instant(&date_str)?,
            description: row.get(5)?,
            wallet_id: row.get(6)?,
            category_id: row.get(7)?,
            subcategory_id: row.get(8)?,
            trip_id: row.get(9)?,
            investment_asset_id: row.get(10)?,
            active: row.get(11)?,
            exclude_from_stats: row.get(12)?,
            is_recurring: row.get(13)?,
            recurrence: recurrence_str.and_then(|s| s.parse().ok()),
            recurrence_end: recurrence_end_str
                .map(|s| parse_instant(&s))
                .transpose()?,
            parent_id: row.get(16)?,
            slot_date: slot_str.map(|s| parse_instant(&s)).transpose()?,
            created_at: parse_datetime(&created_at_str),
        })
    }

    /// Create a transaction; one with a recurrence becomes a series template
    pub fn create_transaction(&self, user_id: i64, tx: &NewTransaction) -> Result<i64> {
        validate_amount(tx.amount)?;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO transactions (
                user_id, type, amount, date, description, wallet_id, category_id, subcategory_id,
                trip_id, investment_asset_id, exclude_from_stats, is_recurring, recurrence
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                tx.tx_type.as_str(),
                tx.amount,
                format_instant(tx.date),
                tx.description,
                tx.wallet_id,
                tx.category_id,
                tx.subcategory_id,
                tx.trip_id,
                tx.investment_asset_id,
                tx.exclude_from_stats,
                tx.recurrence.is_some(),
                tx.recurrence.map(|r| r.as_str()),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a transaction by ID regardless of owner
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        Ok(fetch_transaction(&conn, id)?)
    }

    /// Get a transaction, checking it belongs to `user_id`
    pub fn get_transaction_for_user(&self, user_id: i64, id: i64) -> Result<Transaction> {
        let conn = self.conn()?;
        owned_transaction(&conn, user_id, id)
    }

    /// List a user's active transactions, newest first
    pub fn list_transactions(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE user_id = ? AND active = 1
            ORDER BY date DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(params![user_id, limit, offset], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Every active recurring template across all users
    pub fn list_active_templates(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE is_recurring = 1 AND parent_id IS NULL AND active = 1 AND recurrence IS NOT NULL
            ORDER BY id
            "#,
            TRANSACTION_COLUMNS
        ))?;

        let templates = stmt
            .query_map([], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(templates)
    }

    /// The series a transaction belongs to (template first, then occurrences by date)
    ///
    /// A transaction outside any series is returned on its own.
    pub fn list_series(&self, user_id: i64, id: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let target = owned_transaction(&conn, user_id, id)?;

        match target.lineage_root() {
            Some(root) => Ok(fetch_lineage(&conn, root)?),
            None => Ok(vec![target]),
        }
    }

    /// Count transactions (status output)
    pub fn count_transactions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count active recurring templates (status output)
    pub fn count_active_templates(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE is_recurring = 1 AND parent_id IS NULL AND active = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub(crate) fn fetch_transaction(conn: &Connection, id: i64) -> rusqlite::Result<Option<Transaction>> {
    conn.query_row(
        &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
        params![id],
        Database::row_to_transaction,
    )
    .optional()
}

/// Load a transaction and resolve ownership: absent is `NotFound`, foreign is `Forbidden`
pub(crate) fn owned_transaction(conn: &Connection, user_id: i64, id: i64) -> Result<Transaction> {
    let tx = fetch_transaction(conn, id)?
        .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;

    if tx.user_id != user_id {
        return Err(Error::Forbidden(format!("Transaction {}", id)));
    }

    Ok(tx)
}

/// The template `root_id` followed by all of its occurrences, active or not
pub(crate) fn fetch_lineage(conn: &Connection, root_id: i64) -> rusqlite::Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {}
        FROM transactions
        WHERE id = ?1 OR parent_id = ?1
        ORDER BY (parent_id IS NOT NULL), date, id
        "#,
        TRANSACTION_COLUMNS
    ))?;

    let rows = stmt
        .query_map(params![root_id], Database::row_to_transaction)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Latest grid slot filled under a template, counting deactivated occurrences
///
/// Slots ignore hand edits of `date`, so a moved occurrence still holds its slot.
pub(crate) fn latest_occurrence_slot(
    conn: &Connection,
    template_id: i64,
) -> rusqlite::Result<Option<NaiveDateTime>> {
    let latest: Option<String> = conn.query_row(
        "SELECT MAX(slot_date) FROM transactions WHERE parent_id = ?",
        params![template_id],
        |row| row.get(0),
    )?;

    latest.map(|s| parse_instant(&s)).transpose()
}

/// Materialize the occurrence of `template` filling slot `date`
///
/// Returns `None` when that slot is already taken.
pub(crate) fn insert_occurrence(
    conn: &Connection,
    template: &Transaction,
    date: NaiveDateTime,
) -> rusqlite::Result<Option<i64>> {
    let inserted = conn.execute(
        r#"
        INSERT INTO transactions (
            user_id, type, amount, date, description, wallet_id, category_id, subcategory_id,
            trip_id, investment_asset_id, exclude_from_stats, is_recurring, recurrence, parent_id,
            slot_date
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, NULL, ?12, ?4)
        ON CONFLICT DO NOTHING
        "#,
        params![
            template.user_id,
            template.tx_type.as_str(),
            template.amount,
            format_instant(date),
            template.description,
            template.wallet_id,
            template.category_id,
            template.subcategory_id,
            template.trip_id,
            template.investment_asset_id,
            template.exclude_from_stats,
            template.id,
        ],
    )?;

    Ok((inserted > 0).then(|| conn.last_insert_rowid()))
}

/// Write the fields set in `patch` to row `id`
///
/// A recurrence in the patch also marks the row as recurring; callers only
/// pass one for rows without a parent.
pub(crate) fn apply_patch(
    conn: &Connection,
    id: i64,
    patch: &TransactionPatch,
) -> rusqlite::Result<()> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(t) = patch.tx_type {
        sets.push("type = ?");
        values.push(Box::new(t.as_str()));
    }
    if let Some(amount) = patch.amount {
        sets.push("amount = ?");
        values.push(Box::new(amount));
    }
    if let Some(date) = patch.date {
        sets.push("date = ?");
        values.push(Box::new(format_instant(date)));
    }
    if let Some(ref description) = patch.description {
        sets.push("description = ?");
        values.push(Box::new(description.clone()));
    }
    if let Some(wallet_id) = patch.wallet_id {
        sets.push("wallet_id = ?");
        values.push(Box::new(wallet_id));
    }
    if let Some(category_id) = patch.category_id {
        sets.push("category_id = ?");
        values.push(Box::new(category_id));
    }
    if let Some(subcategory_id) = patch.subcategory_id {
        sets.push("subcategory_id = ?");
        values.push(Box::new(subcategory_id));
    }
    if let Some(trip_id) = patch.trip_id {
        sets.push("trip_id = ?");
        values.push(Box::new(trip_id));
    }
    if let Some(exclude) = patch.exclude_from_stats {
        sets.push("exclude_from_stats = ?");
        values.push(Box::new(exclude));
    }
    if let Some(recurrence) = patch.recurrence {
        sets.push("recurrence = ?");
        sets.push("is_recurring = 1");
        values.push(Box::new(recurrence.as_str()));
    }

    if sets.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "UPDATE transactions SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        sets.join(", ")
    );
    values.push(Box::new(id));

    let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|p| p.as_ref()).collect();
    conn.execute(&sql, params_refs.as_slice())?;
    Ok(())
}

/// End a template's series before `end` (exclusive)
pub(crate) fn set_recurrence_end(
    conn: &Connection,
    template_id: i64,
    end: NaiveDateTime,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE transactions SET recurrence_end = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        params![format_instant(end), template_id],
    )?;
    Ok(())
}

/// Insert the template of a new series anchored at `anchor`, copying `head`'s fields
///
/// `head` itself is left untouched; callers re-parent it as the first occurrence.
pub(crate) fn insert_template(
    conn: &Connection,
    head: &Transaction,
    anchor: NaiveDateTime,
    recurrence: Recurrence,
    recurrence_end: Option<NaiveDateTime>,
) -> rusqlite::Result<i64> {
    conn.execute(
        r#"
        INSERT INTO transactions (
            user_id, type, amount, date, description, wallet_id, category_id, subcategory_id,
            trip_id, investment_asset_id, exclude_from_stats, is_recurring, recurrence,
            recurrence_end
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
        params![
            head.user_id,
            head.tx_type.as_str(),
            head.amount,
            format_instant(anchor),
            head.description,
            head.wallet_id,
            head.category_id,
            head.subcategory_id,
            head.trip_id,
            head.investment_asset_id,
            head.exclude_from_stats,
            recurrence.as_str(),
            recurrence_end.map(format_instant),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Move an occurrence under another template; its slot is kept
pub(crate) fn reparent(conn: &Connection, id: i64, parent_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE transactions SET parent_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        params![parent_id, id],
    )?;
    Ok(())
}

/// Tombstone a row: it keeps its slot so the slot is never materialized again
pub(crate) fn deactivate(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE transactions SET active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        params![id],
    )?;
    Ok(())
}

pub(crate) fn delete_row(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
    Ok(())
}
