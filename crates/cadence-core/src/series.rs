//! Scoped edits and deletes of recurring series
//!
//! Every mutation resolves ownership, then touches all affected rows inside
//! one immediate SQLite transaction. A row outside any series is always
//! mutated on its own, whatever scope was asked for.

use chrono::NaiveDateTime;
use rusqlite::TransactionBehavior;
use tracing::info;

use crate::db::transactions::{
    apply_patch, deactivate, delete_row, fetch_lineage, fetch_transaction, insert_template,
    owned_transaction, reparent, set_recurrence_end, validate_amount,
};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{MutationScope, SeriesMutation, Transaction, TransactionPatch};

/// Where a row sits in its series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesRole {
    Standalone,
    Template,
    Occurrence,
}

impl SeriesRole {
    pub fn of(tx: &Transaction) -> Self {
        if tx.parent_id.is_some() {
            Self::Occurrence
        } else if tx.is_template() {
            Self::Template
        } else {
            Self::Standalone
        }
    }
}

/// Occurrences in `lineage` whose slot is on or after `pivot`, other than `exclude`
pub fn occurrences_from(lineage: &[Transaction], pivot: NaiveDateTime, exclude: i64) -> Vec<i64> {
    lineage
        .iter()
        .filter(|t| t.parent_id.is_some() && t.id != exclude && t.slot() >= pivot)
        .map(|t| t.id)
        .collect()
}

/// Occurrences in `lineage` dated strictly after `now`
pub fn occurrences_after(lineage: &[Transaction], now: NaiveDateTime) -> Vec<i64> {
    lineage
        .iter()
        .filter(|t| t.parent_id.is_some() && t.date > now)
        .map(|t| t.id)
        .collect()
}

/// Patch for the referenced row: occurrences never take a recurrence
fn patch_for_target(role: SeriesRole, patch: &TransactionPatch) -> TransactionPatch {
    match role {
        SeriesRole::Occurrence => TransactionPatch {
            recurrence: None,
            ..patch.clone()
        },
        _ => patch.clone(),
    }
}

/// Patch for the template when it is not the referenced row
fn patch_for_template(patch: &TransactionPatch) -> TransactionPatch {
    TransactionPatch {
        recurrence: patch.recurrence,
        ..patch.shared()
    }
}

/// Reject moving `target` onto a date another active occurrence of its series holds
fn ensure_date_free(lineage: &[Transaction], target: &Transaction, date: NaiveDateTime) -> Result<()> {
    let taken = lineage
        .iter()
        .any(|t| t.parent_id.is_some() && t.active && t.id != target.id && t.date == date);
    if taken {
        return Err(Error::Validation(format!(
            "Another occurrence of the series is already dated {}",
            date
        )));
    }
    Ok(())
}

fn lineage_template(lineage: &[Transaction], target: &Transaction) -> Result<Transaction> {
    lineage
        .iter()
        .find(|t| t.parent_id.is_none())
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("Template of transaction {}", target.id)))
}

/// Applies update/delete operations with `single`, `series` or `future` reach
pub struct ScopedSeriesMutator<'a> {
    db: &'a Database,
}

impl<'a> ScopedSeriesMutator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Update a transaction and, depending on `scope`, the rest of its series
    ///
    /// `date` in the patch only moves the referenced row and `recurrence` only
    /// changes the template; the other fields propagate. A template's date anchors
    /// its grid, so it can only move while nothing has been materialized from it.
    pub fn update(
        &self,
        user_id: i64,
        id: i64,
        patch: &TransactionPatch,
        scope: MutationScope,
        now: NaiveDateTime,
    ) -> Result<SeriesMutation> {
        if patch.is_empty() {
            return Err(Error::Validation("Nothing to update".to_string()));
        }
        if let Some(amount) = patch.amount {
            validate_amount(amount)?;
        }

        let mut conn = self.db.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let target = owned_transaction(&tx, user_id, id)?;
        let role = SeriesRole::of(&target);
        let scope = match role {
            SeriesRole::Standalone => MutationScope::Single,
            _ => scope,
        };

        if let (Some(date), Some(root)) = (patch.date, target.lineage_root()) {
            let lineage = fetch_lineage(&tx, root)?;
            match role {
                SeriesRole::Template if lineage.len() > 1 => {
                    return Err(Error::Validation(format!(
                        "Transaction {} anchors a series with occurrences; its date cannot move",
                        target.id
                    )))
                }
                SeriesRole::Occurrence if date != target.date => {
                    ensure_date_free(&lineage, &target, date)?
                }
                _ => {}
            }
        }

        let mut affected = vec![target.id];
        let mut series_ended = false;

        match (scope, role) {
            (MutationScope::Single, _) => {
                apply_patch(&tx, target.id, &patch_for_target(role, patch))?;
            }
            (MutationScope::Series, _) => {
                let root = target.lineage_root().unwrap_or(target.id);
                for row in fetch_lineage(&tx, root)? {
                    if row.id == target.id {
                        apply_patch(&tx, row.id, &patch_for_target(role, patch))?;
                    } else if row.parent_id.is_none() {
                        apply_patch(&tx, row.id, &patch_for_template(patch))?;
                        affected.push(row.id);
                    } else {
                        apply_patch(&tx, row.id, &patch.shared())?;
                        affected.push(row.id);
                    }
                }
            }
            (MutationScope::Future, SeriesRole::Template) => {
                apply_patch(&tx, target.id, patch)?;
                let lineage = fetch_lineage(&tx, target.id)?;
                for occurrence in occurrences_after(&lineage, now) {
                    apply_patch(&tx, occurrence, &patch.shared())?;
                    affected.push(occurrence);
                }
            }
            (MutationScope::Future, _) => {
                // Split: the old series ends at the target's slot and a new template,
                // anchored there, takes over the target and everything after it
                let root = target.lineage_root().unwrap_or(target.id);
                let lineage = fetch_lineage(&tx, root)?;
                let template = lineage_template(&lineage, &target)?;
                let anchor = target.slot();
                let later = occurrences_from(&lineage, anchor, target.id);

                let recurrence = match patch.recurrence.or(template.recurrence) {
                    Some(r) => r,
                    None => {
                        return Err(Error::Validation(format!(
                            "Transaction {} has no recurrence",
                            template.id
                        )))
                    }
                };

                set_recurrence_end(&tx, template.id, anchor)?;
                apply_patch(&tx, target.id, &patch_for_target(role, patch))?;
                let head = fetch_transaction(&tx, target.id)?
                    .ok_or_else(|| Error::NotFound(format!("Transaction {}", target.id)))?;
                let new_template =
                    insert_template(&tx, &head, anchor, recurrence, template.recurrence_end)?;
                reparent(&tx, target.id, new_template)?;

                for occurrence in later {
                    apply_patch(&tx, occurrence, &patch.shared())?;
                    reparent(&tx, occurrence, new_template)?;
                    affected.push(occurrence);
                }
                affected.push(new_template);
                series_ended = true;
            }
        }

        tx.commit()?;

        info!(
            transaction_id = id,
            scope = scope.as_str(),
            affected = affected.len(),
            "Updated transaction"
        );

        Ok(SeriesMutation {
            scope,
            affected_ids: affected,
            series_ended,
        })
    }

    /// Delete a transaction and, depending on `scope`, the rest of its series
    ///
    /// A single occurrence is deactivated rather than removed so the expander
    /// never recreates it. Deleting `future` from the template stops the series
    /// but keeps its past occurrences linked.
    pub fn delete(
        &self,
        user_id: i64,
        id: i64,
        scope: MutationScope,
        now: NaiveDateTime,
    ) -> Result<SeriesMutation> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let target = owned_transaction(&tx, user_id, id)?;
        let role = SeriesRole::of(&target);
        let scope = match role {
            SeriesRole::Standalone => MutationScope::Single,
            _ => scope,
        };

        let mut affected = vec![target.id];
        let mut series_ended = false;

        match (scope, role) {
            (MutationScope::Single, SeriesRole::Occurrence) => {
                deactivate(&tx, target.id)?;
            }
            (MutationScope::Single, _) => {
                delete_row(&tx, target.id)?;
            }
            (MutationScope::Series, _) => {
                let root = target.lineage_root().unwrap_or(target.id);
                let lineage = fetch_lineage(&tx, root)?;
                affected = lineage.iter().map(|t| t.id).collect();
                // Occurrences first so none is left orphaned mid-statement
                for row in lineage.iter().rev() {
                    delete_row(&tx, row.id)?;
                }
            }
            (MutationScope::Future, SeriesRole::Template) => {
                let lineage = fetch_lineage(&tx, target.id)?;
                for occurrence in occurrences_after(&lineage, now) {
                    delete_row(&tx, occurrence)?;
                    affected.push(occurrence);
                }
                deactivate(&tx, target.id)?;
                series_ended = true;
            }
            (MutationScope::Future, _) => {
                let root = target.lineage_root().unwrap_or(target.id);
                let lineage = fetch_lineage(&tx, root)?;
                let template = lineage_template(&lineage, &target)?;

                for occurrence in occurrences_from(&lineage, target.slot(), target.id) {
                    delete_row(&tx, occurrence)?;
                    affected.push(occurrence);
                }
                delete_row(&tx, target.id)?;
                set_recurrence_end(&tx, template.id, target.slot())?;
                series_ended = true;
            }
        }

        tx.commit()?;

        info!(
            transaction_id = id,
            scope = scope.as_str(),
            affected = affected.len(),
            "Deleted transaction"
        );

        Ok(SeriesMutation {
            scope,
            affected_ids: affected,
            series_ended,
        })
    }
}
