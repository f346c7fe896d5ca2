//! Domain models for Cadence

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::period::DateRange;

// ========== Budgets ==========

/// Budget period length
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Parse a stored period, treating anything unrecognised as monthly
    pub fn parse_or_monthly(s: &str) -> Self {
        s.parse().unwrap_or(Self::Monthly)
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!(
                "Unknown period: {} (valid: daily, weekly, monthly, yearly)",
                s
            )),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A spending budget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub name: Option<String>,
    pub period: Period,
    /// Spending limit per period, always positive
    pub limit: f64,
    /// No window of this budget starts before this day
    pub start_date: NaiveDate,
    pub category_id: Option<i64>,
    pub wallet_id: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Budget {
    /// First instant covered by this budget
    pub fn start(&self) -> NaiveDateTime {
        self.start_date.and_time(chrono::NaiveTime::MIN)
    }
}

/// A new budget (before DB insertion)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBudget {
    pub name: Option<String>,
    #[serde(default)]
    pub period: Period,
    pub limit: f64,
    pub start_date: NaiveDate,
    pub category_id: Option<i64>,
    pub wallet_id: Option<i64>,
}

/// Partial update of a budget
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetUpdate {
    pub name: Option<String>,
    pub period: Option<Period>,
    pub limit: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub category_id: Option<i64>,
    pub wallet_id: Option<i64>,
    pub active: Option<bool>,
}

/// Immutable record of a closed budget period
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPeriodSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub budget_id: i64,
    pub period_from: NaiveDateTime,
    pub period_to: NaiveDateTime,
    /// Budget limit at closure time
    pub limit: f64,
    pub spent: f64,
    pub remaining: f64,
    pub closed_at: DateTime<Utc>,
}

/// Spend measured for one budget over one window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetProgress {
    pub budget_id: i64,
    pub name: Option<String>,
    pub period: Period,
    pub category_id: Option<i64>,
    pub wallet_id: Option<i64>,
    pub limit: f64,
    pub spent: f64,
    pub remaining: f64,
    /// Fraction of the limit used, in [0, 1]
    pub progress: f64,
    /// Window after clamping to the budget start
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

/// Totals across the budgets of an overview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetsSummary {
    pub total_limit: f64,
    pub total_spent: f64,
    pub remaining: f64,
    pub count: i64,
}

/// Budgets overview for one reference date
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetsOverview {
    pub period: Period,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub summary: BudgetsSummary,
    pub budgets: Vec<BudgetProgress>,
}

impl BudgetsOverview {
    pub fn empty(period: Period, range: DateRange) -> Self {
        Self {
            period,
            from: range.from,
            to: range.to,
            summary: BudgetsSummary::default(),
            budgets: vec![],
        }
    }
}

// ========== Transactions ==========

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Step between two occurrences of a recurring series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!(
                "Unknown recurrence: {} (valid: daily, weekly, monthly, yearly)",
                s
            )),
        }
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A financial transaction
///
/// A row with `is_recurring` set and no `parent_id` is the template of a
/// recurring series; occurrences point back to it through `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// Unsigned; the sign follows from `tx_type`
    pub amount: f64,
    pub date: NaiveDateTime,
    pub description: Option<String>,
    pub wallet_id: Option<i64>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub trip_id: Option<i64>,
    pub investment_asset_id: Option<i64>,
    pub active: bool,
    pub exclude_from_stats: bool,
    pub is_recurring: bool,
    pub recurrence: Option<Recurrence>,
    /// Exclusive end of the series (templates only)
    pub recurrence_end: Option<NaiveDateTime>,
    pub parent_id: Option<i64>,
    /// Grid date `template.date + k·step` an occurrence fills; `date` may be moved off it
    pub slot_date: Option<NaiveDateTime>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// The grid slot this row occupies in its series
    pub fn slot(&self) -> NaiveDateTime {
        self.slot_date.unwrap_or(self.date)
    }

    pub fn is_template(&self) -> bool {
        self.is_recurring && self.parent_id.is_none()
    }

    /// Id of the template this row belongs to, if it is part of a series
    pub fn lineage_root(&self) -> Option<i64> {
        match self.parent_id {
            Some(parent) => Some(parent),
            None if self.is_template() => Some(self.id),
            None => None,
        }
    }
}

/// A new transaction (before DB insertion)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: f64,
    pub date: NaiveDateTime,
    pub description: Option<String>,
    pub wallet_id: Option<i64>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub trip_id: Option<i64>,
    pub investment_asset_id: Option<i64>,
    #[serde(default)]
    pub exclude_from_stats: bool,
    /// Setting a recurrence turns the transaction into a series template
    pub recurrence: Option<Recurrence>,
}

impl NewTransaction {
    pub fn expense(amount: f64, date: NaiveDateTime) -> Self {
        Self {
            tx_type: TransactionType::Expense,
            amount,
            date,
            description: None,
            wallet_id: None,
            category_id: None,
            subcategory_id: None,
            trip_id: None,
            investment_asset_id: None,
            exclude_from_stats: false,
            recurrence: None,
        }
    }
}

/// Partial update of a transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPatch {
    #[serde(rename = "type")]
    pub tx_type: Option<TransactionType>,
    pub amount: Option<f64>,
    /// Applies to the referenced row only
    pub date: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub wallet_id: Option<i64>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub trip_id: Option<i64>,
    pub exclude_from_stats: Option<bool>,
    /// Applies to the series template only
    pub recurrence: Option<Recurrence>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The financial fields that propagate to other members of a series
    pub fn shared(&self) -> Self {
        Self {
            date: None,
            recurrence: None,
            ..self.clone()
        }
    }
}

/// How far an edit or delete of a series member reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationScope {
    /// Only the referenced row
    #[default]
    Single,
    /// The template and every occurrence
    Series,
    /// The referenced row and everything dated on or after it
    Future,
}

impl MutationScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Series => "series",
            Self::Future => "future",
        }
    }
}

impl std::str::FromStr for MutationScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "series" => Ok(Self::Series),
            "future" => Ok(Self::Future),
            _ => Err(format!(
                "Unknown scope: {} (valid: single, series, future)",
                s
            )),
        }
    }
}

impl std::fmt::Display for MutationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a scoped update or delete
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesMutation {
    pub scope: MutationScope,
    /// Rows changed, removed or deactivated
    pub affected_ids: Vec<i64>,
    /// Set when the edit ended the original series at the referenced row
    pub series_ended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parsing() {
        assert_eq!("weekly".parse::<Period>().unwrap(), Period::Weekly);
        assert_eq!("YEARLY".parse::<Period>().unwrap(), Period::Yearly);
        assert!("fortnightly".parse::<Period>().is_err());
        assert_eq!(Period::parse_or_monthly("fortnightly"), Period::Monthly);
    }

    #[test]
    fn test_scope_defaults_to_single() {
        assert_eq!(MutationScope::default(), MutationScope::Single);
        assert_eq!("future".parse::<MutationScope>().unwrap(), MutationScope::Future);
        assert!("everything".parse::<MutationScope>().is_err());
    }

    #[test]
    fn test_patch_shared_drops_row_specific_fields() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let patch = TransactionPatch {
            amount: Some(12.5),
            date: Some(date),
            recurrence: Some(Recurrence::Weekly),
            ..Default::default()
        };

        let shared = patch.shared();
        assert_eq!(shared.amount, Some(12.5));
        assert!(shared.date.is_none());
        assert!(shared.recurrence.is_none());
        assert!(!shared.is_empty());
        assert!(TransactionPatch::default().is_empty());
    }

    #[test]
    fn test_transaction_serializes_type_field() {
        let json = serde_json::json!({
            "type": "expense",
            "amount": 20.0,
            "date": "2024-01-10T12:00:00",
            "recurrence": "monthly"
        });
        let tx: NewTransaction = serde_json::from_value(json).unwrap();
        assert_eq!(tx.tx_type, TransactionType::Expense);
        assert_eq!(tx.recurrence, Some(Recurrence::Monthly));
        assert!(!tx.exclude_from_stats);
    }
}
