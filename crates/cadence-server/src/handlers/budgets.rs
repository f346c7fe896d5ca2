//! Budget handlers: CRUD, overview, progress and period closure

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use crate::{get_user_id, json_body, parse_reference_date, AppError, AppState, SuccessResponse};
use cadence_core::models::{
    Budget, BudgetPeriodSnapshot, BudgetProgress, BudgetUpdate, BudgetsOverview, NewBudget, Period,
};
use cadence_core::{BudgetClosureProcessor, SpendAggregator};

/// Query params for the budgets overview
#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    /// Only budgets with this period (daily, weekly, monthly, yearly)
    pub period: Option<String>,
    /// Reference date, defaults to now
    pub date: Option<String>,
}

/// Query params carrying an optional reference date
#[derive(Debug, Deserialize)]
pub struct ReferenceDateQuery {
    pub date: Option<String>,
}

fn parse_period(value: Option<&str>) -> Result<Option<Period>, AppError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<Period>().map_err(|e| AppError::bad_request(&e)))
        .transpose()
}

/// GET /api/budgets - Spend overview of the caller's active budgets
pub async fn list_budgets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OverviewQuery>,
    request: Request,
) -> Result<Json<BudgetsOverview>, AppError> {
    let user_id = get_user_id(request.headers())?;
    let period = parse_period(query.period.as_deref())?;
    let reference = parse_reference_date(query.date.as_deref())?;

    let overview = SpendAggregator::new(&state.db).overview(user_id, reference, period)?;

    // Audit log - read access
    state.db.log_audit(
        user_id,
        "list",
        Some("budget"),
        None,
        Some(&format!(
            "count={}, period={}",
            overview.summary.count, overview.period
        )),
    )?;

    Ok(Json(overview))
}

/// POST /api/budgets - Create a budget
pub async fn create_budget(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewBudget>, JsonRejection>,
) -> Result<Json<Budget>, AppError> {
    let user_id = get_user_id(&headers)?;
    let new_budget = json_body(payload)?;

    let id = state.db.create_budget(user_id, &new_budget)?;
    let budget = state.db.get_budget_for_user(user_id, id)?;

    state.db.log_audit(
        user_id,
        "create",
        Some("budget"),
        Some(id),
        Some(&format!("period={}, limit={}", budget.period, budget.limit)),
    )?;

    Ok(Json(budget))
}

/// GET /api/budgets/:id - Get a single budget
pub async fn get_budget(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Budget>, AppError> {
    let user_id = get_user_id(request.headers())?;

    let budget = state.db.get_budget_for_user(user_id, id)?;

    state
        .db
        .log_audit(user_id, "view", Some("budget"), Some(id), None)?;

    Ok(Json(budget))
}

/// PATCH /api/budgets/:id - Update budget fields
pub async fn update_budget(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    payload: Result<Json<BudgetUpdate>, JsonRejection>,
) -> Result<Json<Budget>, AppError> {
    let user_id = get_user_id(&headers)?;
    let update = json_body(payload)?;

    let budget = state.db.update_budget(user_id, id, &update)?;

    state
        .db
        .log_audit(user_id, "update", Some("budget"), Some(id), None)?;

    Ok(Json(budget))
}

/// DELETE /api/budgets/:id - Soft delete a budget
pub async fn delete_budget(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_id = get_user_id(request.headers())?;

    state.db.deactivate_budget(user_id, id)?;

    state
        .db
        .log_audit(user_id, "delete", Some("budget"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/budgets/:id/progress - Progress in the window containing the reference date
pub async fn get_budget_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<ReferenceDateQuery>,
    request: Request,
) -> Result<Json<BudgetProgress>, AppError> {
    let user_id = get_user_id(request.headers())?;
    let reference = parse_reference_date(query.date.as_deref())?;

    let progress = SpendAggregator::new(&state.db).budget_progress(user_id, id, reference)?;

    state
        .db
        .log_audit(user_id, "view", Some("budget_progress"), Some(id), None)?;

    Ok(Json(progress))
}

/// GET /api/budgets/:id/history - Closed period snapshots, oldest first
pub async fn get_budget_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Vec<BudgetPeriodSnapshot>>, AppError> {
    let user_id = get_user_id(request.headers())?;

    let snapshots = state.db.list_snapshots(user_id, id)?;

    state.db.log_audit(
        user_id,
        "list",
        Some("budget_snapshot"),
        Some(id),
        Some(&format!("count={}", snapshots.len())),
    )?;

    Ok(Json(snapshots))
}

/// POST /api/budgets/:id/close-period - Close every elapsed period of a budget now
///
/// Returns only the snapshots created by this call; already closed periods are skipped.
/// A `date` later than the server clock is treated as now, so no window that has not
/// ended yet is ever snapshotted.
pub async fn close_budget_period(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<ReferenceDateQuery>,
    request: Request,
) -> Result<Json<Vec<BudgetPeriodSnapshot>>, AppError> {
    let user_id = get_user_id(request.headers())?;
    let now = parse_reference_date(query.date.as_deref())?.min(chrono::Local::now().naive_local());

    let created = BudgetClosureProcessor::new(&state.db).close_budget(user_id, id, now)?;

    state.db.log_audit(
        user_id,
        "close_period",
        Some("budget"),
        Some(id),
        Some(&format!("snapshots_created={}", created.len())),
    )?;

    Ok(Json(created))
}
