//! Transaction handlers, including scoped edits and deletes of recurring series

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use crate::{get_user_id, json_body, AppError, AppState, MAX_PAGE_LIMIT};
use cadence_core::models::{MutationScope, NewTransaction, SeriesMutation, Transaction, TransactionPatch};
use cadence_core::ScopedSeriesMutator;

/// Query params for listing transactions
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

/// Query params selecting how far a mutation reaches
#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    /// single (default), series or future
    pub scope: Option<String>,
}

impl ScopeQuery {
    fn scope(&self) -> Result<MutationScope, AppError> {
        match self.scope.as_deref().map(str::trim) {
            None | Some("") => Ok(MutationScope::default()),
            Some(raw) => raw.parse().map_err(|e: String| AppError::bad_request(&e)),
        }
    }
}

/// GET /api/transactions - List the caller's active transactions, newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTransactionsQuery>,
    request: Request,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let user_id = get_user_id(request.headers())?;
    let limit = query.limit.clamp(1, MAX_PAGE_LIMIT);
    let offset = query.offset.max(0);

    let transactions = state.db.list_transactions(user_id, limit, offset)?;

    // Audit log - read access
    state.db.log_audit(
        user_id,
        "list",
        Some("transaction"),
        None,
        Some(&format!(
            "count={}, limit={}, offset={}",
            transactions.len(),
            limit,
            offset
        )),
    )?;

    Ok(Json(transactions))
}

/// POST /api/transactions - Create a transaction, or a series template when a recurrence is set
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewTransaction>, JsonRejection>,
) -> Result<Json<Transaction>, AppError> {
    let user_id = get_user_id(&headers)?;
    let new_tx = json_body(payload)?;

    let id = state.db.create_transaction(user_id, &new_tx)?;
    let transaction = state.db.get_transaction_for_user(user_id, id)?;

    let details = match transaction.recurrence {
        Some(recurrence) => format!("recurrence={}", recurrence),
        None => format!("type={}", transaction.tx_type),
    };
    state.db.log_audit(
        user_id,
        "create",
        Some("transaction"),
        Some(id),
        Some(&details),
    )?;

    Ok(Json(transaction))
}

/// GET /api/transactions/:id - Get a single transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Transaction>, AppError> {
    let user_id = get_user_id(request.headers())?;

    let transaction = state.db.get_transaction_for_user(user_id, id)?;

    state
        .db
        .log_audit(user_id, "view", Some("transaction"), Some(id), None)?;

    Ok(Json(transaction))
}

/// GET /api/transactions/:id/series - The series a transaction belongs to
pub async fn get_series(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let user_id = get_user_id(request.headers())?;

    let series = state.db.list_series(user_id, id)?;

    state.db.log_audit(
        user_id,
        "list",
        Some("transaction_series"),
        Some(id),
        Some(&format!("count={}", series.len())),
    )?;

    Ok(Json(series))
}

/// PATCH /api/transactions/:id?scope= - Edit a transaction or its series
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<ScopeQuery>,
    headers: HeaderMap,
    payload: Result<Json<TransactionPatch>, JsonRejection>,
) -> Result<Json<SeriesMutation>, AppError> {
    let user_id = get_user_id(&headers)?;
    let scope = query.scope()?;
    let patch = json_body(payload)?;

    let now = chrono::Local::now().naive_local();
    let mutation = ScopedSeriesMutator::new(&state.db).update(user_id, id, &patch, scope, now)?;

    state.db.log_audit(
        user_id,
        "update",
        Some("transaction"),
        Some(id),
        Some(&format!(
            "scope={}, affected={}",
            mutation.scope,
            mutation.affected_ids.len()
        )),
    )?;

    Ok(Json(mutation))
}

/// DELETE /api/transactions/:id?scope= - Delete a transaction or part of its series
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<ScopeQuery>,
    request: Request,
) -> Result<Json<SeriesMutation>, AppError> {
    let user_id = get_user_id(request.headers())?;
    let scope = query.scope()?;

    let now = chrono::Local::now().naive_local();
    let mutation = ScopedSeriesMutator::new(&state.db).delete(user_id, id, scope, now)?;

    state.db.log_audit(
        user_id,
        "delete",
        Some("transaction"),
        Some(id),
        Some(&format!(
            "scope={}, affected={}",
            mutation.scope,
            mutation.affected_ids.len()
        )),
    )?;

    Ok(Json(mutation))
}
