//! Cadence Core Library
//!
//! Temporal aggregation and recurrence engine for personal finance:
//! - Database access and migrations
//! - Budget period windows (daily, weekly, monthly, yearly)
//! - Spend aggregation against budgets with start-date clamping
//! - Budget period closure into immutable snapshots
//! - Recurring transaction materialization
//! - Scoped (single / series / future) edits and deletes of recurring series

pub mod aggregate;
pub mod closure;
pub mod db;
pub mod error;
pub mod models;
pub mod period;
pub mod recurrence;
pub mod series;

pub use aggregate::SpendAggregator;
pub use closure::{BudgetClosureProcessor, ClosureConfig, ClosureResults};
pub use db::{AuditEntry, Database};
pub use error::{Error, Result};
pub use period::DateRange;
pub use recurrence::{ExpanderConfig, ExpansionResults, RecurrenceExpander};
pub use series::{ScopedSeriesMutator, SeriesRole};
