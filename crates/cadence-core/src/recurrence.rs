//! Recurring transaction materialization
//!
//! A template's `{date, recurrence}` defines the ray of due dates
//! `date + k·step`. Each occurrence records the slot it fills. A pass
//! materializes every slot after the latest filled one, up to "now", as a
//! concrete transaction.

use chrono::NaiveDateTime;
use rusqlite::TransactionBehavior;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::db::transactions::{fetch_transaction, insert_occurrence, latest_occurrence_slot};
use crate::db::Database;
use crate::error::Result;
use crate::models::Transaction;
use crate::period::next_occurrence_after;

/// Expander configuration
#[derive(Debug, Clone)]
pub struct ExpanderConfig {
    /// Occurrences materialized per template in one pass; the rest wait for the next pass
    pub max_catch_up: usize,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self { max_catch_up: 500 }
    }
}

/// Results of one expansion pass
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionResults {
    pub templates_checked: usize,
    pub occurrences_created: usize,
    pub templates_failed: usize,
}

/// Due slots of `template` after the `latest` filled slot and no later than `now`
///
/// Slots are always `template.date + k·step`, so an occurrence whose date was
/// edited by hand neither shifts the rest of the series nor frees its slot.
pub fn due_dates(
    template: &Transaction,
    latest: Option<NaiveDateTime>,
    now: NaiveDateTime,
    max: usize,
) -> Vec<NaiveDateTime> {
    let Some(recurrence) = template.recurrence else {
        return vec![];
    };

    let mut after = latest.map_or(template.date, |l| l.max(template.date));
    let mut dates = Vec::new();

    while dates.len() < max {
        let Some((_, next)) = next_occurrence_after(template.date, recurrence, after) else {
            break;
        };
        if next > now || template.recurrence_end.is_some_and(|end| next >= end) {
            break;
        }
        dates.push(next);
        after = next;
    }

    dates
}

/// Materializes due occurrences of recurring templates
pub struct RecurrenceExpander<'a> {
    db: &'a Database,
    config: ExpanderConfig,
}

impl<'a> RecurrenceExpander<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            config: ExpanderConfig::default(),
        }
    }

    pub fn with_config(db: &'a Database, config: ExpanderConfig) -> Self {
        Self { db, config }
    }

    /// Expand every active template up to `now`
    ///
    /// Failures are isolated per template and retried on the next pass.
    pub fn run(&self, now: NaiveDateTime) -> Result<ExpansionResults> {
        let templates = self.db.list_active_templates()?;
        let mut results = ExpansionResults {
            templates_checked: templates.len(),
            ..Default::default()
        };

        for template in &templates {
            match self.expand_template(template.id, now) {
                Ok(created) => results.occurrences_created += created,
                Err(e) => {
                    results.templates_failed += 1;
                    if e.is_transient() {
                        warn!(template_id = template.id, error = %e, "Recurring expansion failed, retrying next pass");
                    } else {
                        error!(template_id = template.id, error = %e, "Recurring expansion failed");
                    }
                }
            }
        }

        if results.occurrences_created > 0 || results.templates_failed > 0 {
            info!(
                "Recurring expansion complete: {} templates, {} occurrences created, {} failed",
                results.templates_checked, results.occurrences_created, results.templates_failed
            );
        } else {
            debug!(templates = results.templates_checked, "No recurring occurrences due");
        }

        Ok(results)
    }

    /// Catch one template up to `now`, returning how many occurrences were created
    ///
    /// The template is re-read inside a write transaction so a concurrent edit or
    /// delete of the series is either fully seen or fully excluded.
    pub fn expand_template(&self, template_id: i64, now: NaiveDateTime) -> Result<usize> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let template = match fetch_transaction(&tx, template_id)? {
            Some(t) if t.is_template() && t.active => t,
            _ => return Ok(0),
        };

        let latest = latest_occurrence_slot(&tx, template.id)?;
        let mut created = 0;

        for date in due_dates(&template, latest, now, self.config.max_catch_up) {
            if let Some(id) = insert_occurrence(&tx, &template, date)? {
                debug!(template_id = template.id, occurrence_id = id, %date, "Materialized occurrence");
                created += 1;
            }
        }

        tx.commit()?;
        Ok(created)
    }
}
