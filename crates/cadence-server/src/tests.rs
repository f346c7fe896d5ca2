//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use cadence_core::db::Database;
use cadence_core::models::{NewTransaction, Recurrence};
use cadence_core::RecurrenceExpander;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

const USER: &str = "7";

fn test_config() -> ServerConfig {
    ServerConfig {
        require_auth: false,
        allowed_origins: vec![],
        ..Default::default()
    }
}

fn setup_test_app() -> (Router, Database) {
    let db = Database::in_memory().unwrap();
    (create_router(db.clone(), test_config()), db)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(USER_ID_HEADER, USER)
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_ID_HEADER, USER)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn send_empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_ID_HEADER, USER)
        .body(Body::empty())
        .unwrap()
}

async fn create_budget_via_api(app: &Router, body: serde_json::Value) -> i64 {
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/budgets", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    get_body_json(response).await["id"].as_i64().unwrap()
}

async fn create_expense_via_api(app: &Router, amount: f64, date: &str, category_id: i64) -> i64 {
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/transactions",
            serde_json::json!({
                "type": "expense",
                "amount": amount,
                "date": date,
                "walletId": 1,
                "categoryId": category_id
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    get_body_json(response).await["id"].as_i64().unwrap()
}

/// A monthly template dated 2024-01-10 expanded through May 2024
fn seed_monthly_series(db: &Database) -> i64 {
    let start = NaiveDate::from_ymd_opt(2024, 1, 10)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let template = NewTransaction {
        recurrence: Some(Recurrence::Monthly),
        category_id: Some(3),
        ..NewTransaction::expense(20.0, start)
    };
    let id = db.create_transaction(7, &template).unwrap();

    let now = NaiveDate::from_ymd_opt(2024, 5, 11)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    RecurrenceExpander::new(db).run(now).unwrap();
    id
}

// ========== Auth & Ownership ==========

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let (app, _db) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/budgets")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("X-User-Id"));
}

#[tokio::test]
async fn test_malformed_user_header_is_bad_request() {
    let (app, _db) = setup_test_app();

    for value in ["abc", "0", "-3"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/budgets")
                    .header(USER_ID_HEADER, value)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "value {}", value);
    }
}

#[tokio::test]
async fn test_api_key_required_by_default() {
    let db = Database::in_memory().unwrap();
    let config = ServerConfig {
        api_keys: vec!["s3cret-key".to_string()],
        ..Default::default()
    };
    let app = create_router(db, config);

    let response = app.clone().oneshot(get("/api/budgets")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Authentication required");

    let wrong = Request::builder()
        .uri("/api/budgets")
        .header(USER_ID_HEADER, USER)
        .header("authorization", "Bearer s3cret-kez")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let right = Request::builder()
        .uri("/api/budgets")
        .header(USER_ID_HEADER, USER)
        .header("authorization", "Bearer s3cret-key")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(right).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_validate_api_key() {
    let keys = vec!["alpha".to_string(), "beta-key".to_string()];
    assert!(validate_api_key("alpha", &keys));
    assert!(validate_api_key("beta-key", &keys));
    assert!(!validate_api_key("alph", &keys));
    assert!(!validate_api_key("", &keys));
    assert!(!validate_api_key("alpha", &[]));
}

#[test]
fn test_parse_api_keys() {
    assert_eq!(parse_api_keys(" a, b ,,c "), vec!["a", "b", "c"]);
    assert!(parse_api_keys("").is_empty());
}

#[test]
fn test_parse_reference_date() {
    let day = parse_reference_date(Some("2024-01-20")).ok().unwrap();
    assert_eq!(day.to_string(), "2024-01-20 00:00:00");

    let instant = parse_reference_date(Some("2024-01-20T13:45:00")).ok().unwrap();
    assert_eq!(instant.to_string(), "2024-01-20 13:45:00");

    assert!(parse_reference_date(Some("20/01/2024")).is_err());
    assert!(parse_reference_date(None).is_ok());
}

#[tokio::test]
async fn test_security_headers() {
    let (app, _db) = setup_test_app();

    let response = app.oneshot(get("/api/audit")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

// ========== Budget API Tests ==========

#[tokio::test]
async fn test_budget_overview_clamps_to_start_date() {
    let (app, _db) = setup_test_app();

    let budget_id = create_budget_via_api(
        &app,
        serde_json::json!({
            "name": "Groceries",
            "period": "monthly",
            "limit": 200.0,
            "startDate": "2024-01-15",
            "categoryId": 5
        }),
    )
    .await;

    // Before the budget start, inside the calendar month
    create_expense_via_api(&app, 999.0, "2024-01-10T12:00:00", 5).await;
    create_expense_via_api(&app, 50.0, "2024-01-16T09:00:00", 5).await;
    create_expense_via_api(&app, 30.0, "2024-01-19T18:30:00", 5).await;
    // Other category
    create_expense_via_api(&app, 12.0, "2024-01-18T10:00:00", 6).await;

    let response = app
        .clone()
        .oneshot(get("/api/budgets?date=2024-01-20"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["period"], "monthly");
    assert_eq!(json["from"], "2024-01-01T00:00:00");
    assert_eq!(json["summary"]["count"], 1);
    assert_eq!(json["summary"]["totalLimit"], 200.0);
    assert_eq!(json["summary"]["totalSpent"], 80.0);

    let budget = &json["budgets"][0];
    assert_eq!(budget["budgetId"], budget_id);
    assert_eq!(budget["spent"], 80.0);
    assert_eq!(budget["remaining"], 120.0);
    assert_eq!(budget["progress"], 0.4);
    assert_eq!(budget["from"], "2024-01-15T00:00:00");

    let response = app
        .oneshot(get(&format!(
            "/api/budgets/{}/progress?date=2024-01-20",
            budget_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["spent"], 80.0);
}

#[tokio::test]
async fn test_budget_overview_filters_by_period() {
    let (app, _db) = setup_test_app();

    for period in ["weekly", "monthly"] {
        create_budget_via_api(
            &app,
            serde_json::json!({
                "period": period,
                "limit": 100.0,
                "startDate": "2024-01-01"
            }),
        )
        .await;
    }

    let response = app
        .clone()
        .oneshot(get("/api/budgets?period=weekly&date=2024-01-17"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["period"], "weekly");
    assert_eq!(json["summary"]["count"], 1);
    assert_eq!(json["from"], "2024-01-15T00:00:00");

    let response = app
        .oneshot(get("/api/budgets?period=fortnightly"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_budget_validation() {
    let (app, _db) = setup_test_app();

    let unknown_period = serde_json::json!({
        "period": "fortnightly",
        "limit": 100.0,
        "startDate": "2024-01-01"
    });
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/budgets", unknown_period))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let negative_limit = serde_json::json!({
        "period": "monthly",
        "limit": -5.0,
        "startDate": "2024-01-01"
    });
    let response = app
        .oneshot(send_json("POST", "/api/budgets", negative_limit))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_budget_ownership() {
    let (app, db) = setup_test_app();

    let budget = cadence_core::models::NewBudget {
        name: None,
        period: cadence_core::models::Period::Monthly,
        limit: 10.0,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        category_id: None,
        wallet_id: None,
    };
    let foreign = db.create_budget(99, &budget).unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/budgets/{}", foreign)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(send_empty("DELETE", &format!("/api/budgets/{}", foreign)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.oneshot(get("/api/budgets/4242")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_and_delete_budget() {
    let (app, _db) = setup_test_app();

    let id = create_budget_via_api(
        &app,
        serde_json::json!({
            "period": "monthly",
            "limit": 100.0,
            "startDate": "2024-01-01"
        }),
    )
    .await;

    let response = app
        .clone()
        .oneshot(send_json(
            "PATCH",
            &format!("/api/budgets/{}", id),
            serde_json::json!({ "limit": 150.0, "period": "yearly" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["limit"], 150.0);
    assert_eq!(json["period"], "yearly");

    let response = app
        .clone()
        .oneshot(send_empty("DELETE", &format!("/api/budgets/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["success"], true);

    let response = app.oneshot(get("/api/budgets")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["summary"]["count"], 0);
}

#[tokio::test]
async fn test_close_period_is_idempotent() {
    let (app, _db) = setup_test_app();

    let id = create_budget_via_api(
        &app,
        serde_json::json!({
            "period": "monthly",
            "limit": 100.0,
            "startDate": "2024-01-15",
            "categoryId": 2
        }),
    )
    .await;
    create_expense_via_api(&app, 40.0, "2024-01-20T10:00:00", 2).await;
    create_expense_via_api(&app, 70.0, "2024-02-03T10:00:00", 2).await;

    let uri = format!("/api/budgets/{}/close-period?date=2024-03-05", id);
    let response = app
        .clone()
        .oneshot(send_empty("POST", &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = get_body_json(response).await;
    let created = created.as_array().unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0]["periodFrom"], "2024-01-15T00:00:00");
    assert_eq!(created[0]["spent"], 40.0);
    assert_eq!(created[1]["spent"], 70.0);
    assert_eq!(created[1]["remaining"], 30.0);

    let response = app
        .clone()
        .oneshot(send_empty("POST", &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(get_body_json(response).await.as_array().unwrap().is_empty());

    let response = app
        .oneshot(get(&format!("/api/budgets/{}/history", id)))
        .await
        .unwrap();
    let history = get_body_json(response).await;
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_close_period_ignores_future_dates() {
    let (app, _db) = setup_test_app();

    let id = create_budget_via_api(
        &app,
        serde_json::json!({ "period": "monthly", "limit": 100.0, "startDate": "2024-01-01" }),
    )
    .await;

    let response = app
        .clone()
        .oneshot(send_empty(
            "POST",
            &format!("/api/budgets/{}/close-period?date=2999-01-01", id),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = get_body_json(response).await;
    let created = created.as_array().unwrap();
    assert!(!created.is_empty());

    // Nothing at or after the current month is closed
    let current = cadence_core::period::compute_range(
        cadence_core::models::Period::Monthly,
        chrono::Local::now().naive_local(),
    );
    for snapshot in created {
        let to: chrono::NaiveDateTime = snapshot["periodTo"].as_str().unwrap().parse().unwrap();
        assert!(to < current.from);
    }
}

// ========== Transaction API Tests ==========

#[tokio::test]
async fn test_create_recurring_template() {
    let (app, _db) = setup_test_app();

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/transactions",
            serde_json::json!({
                "type": "expense",
                "amount": 9.99,
                "date": "2024-01-31T00:00:00",
                "recurrence": "monthly"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["isRecurring"], true);
    assert_eq!(json["recurrence"], "monthly");
    assert!(json["parentId"].is_null());

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/transactions",
            serde_json::json!({
                "type": "expense",
                "amount": 1.0,
                "date": "2024-01-31T00:00:00",
                "recurrence": "hourly"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_series_listing_and_series_delete() {
    let (app, db) = setup_test_app();
    let template_id = seed_monthly_series(&db);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/transactions/{}/series", template_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let series = get_body_json(response).await;
    let series = series.as_array().unwrap();
    // Template plus February through May
    assert_eq!(series.len(), 5);
    assert_eq!(series[0]["id"], template_id);
    assert_eq!(series[1]["parentId"], template_id);

    let occurrence_id = series[2]["id"].as_i64().unwrap();
    let response = app
        .clone()
        .oneshot(send_empty(
            "DELETE",
            &format!("/api/transactions/{}?scope=series", occurrence_id),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["scope"], "series");
    assert_eq!(json["affectedIds"].as_array().unwrap().len(), 5);

    assert_eq!(db.count_transactions().unwrap(), 0);
}

#[tokio::test]
async fn test_single_update_of_occurrence() {
    let (app, db) = setup_test_app();
    let template_id = seed_monthly_series(&db);
    let series = db.list_series(7, template_id).unwrap();
    let march = series[2].id;

    // Scope defaults to single
    let response = app
        .clone()
        .oneshot(send_json(
            "PATCH",
            &format!("/api/transactions/{}", march),
            serde_json::json!({ "amount": 35.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["scope"], "single");
    assert_eq!(json["affectedIds"], serde_json::json!([march]));

    let amounts: Vec<f64> = db
        .list_series(7, template_id)
        .unwrap()
        .iter()
        .map(|t| t.amount)
        .collect();
    assert_eq!(amounts, vec![20.0, 20.0, 35.0, 20.0, 20.0]);
}

#[tokio::test]
async fn test_mutation_rejects_bad_input() {
    let (app, db) = setup_test_app();
    let template_id = seed_monthly_series(&db);

    let response = app
        .clone()
        .oneshot(send_empty(
            "DELETE",
            &format!("/api/transactions/{}?scope=everything", template_id),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(send_json(
            "PATCH",
            &format!("/api/transactions/{}?scope=series", template_id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(send_json(
            "PATCH",
            &format!("/api/transactions/{}", template_id),
            serde_json::json!({ "amount": -4.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Moving March onto February's date
    let march = db.list_series(7, template_id).unwrap()[2].id;
    let response = app
        .clone()
        .oneshot(send_json(
            "PATCH",
            &format!("/api/transactions/{}", march),
            serde_json::json!({ "date": "2024-02-10T00:00:00" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Another user's series
    let foreign = Request::builder()
        .method("DELETE")
        .uri(format!("/api/transactions/{}?scope=series", template_id))
        .header(USER_ID_HEADER, "8")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(foreign).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(db.count_transactions().unwrap(), 5);
}

#[tokio::test]
async fn test_list_transactions_pagination() {
    let (app, _db) = setup_test_app();
    for day in 1..=3 {
        create_expense_via_api(&app, 1.0, &format!("2024-02-0{}T08:00:00", day), 1).await;
    }

    let response = app
        .clone()
        .oneshot(get("/api/transactions?limit=2&offset=0"))
        .await
        .unwrap();
    let page = get_body_json(response).await;
    let page = page.as_array().unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["date"], "2024-02-03T08:00:00");

    let response = app
        .oneshot(get("/api/transactions?limit=2&offset=2"))
        .await
        .unwrap();
    let page = get_body_json(response).await;
    assert_eq!(page.as_array().unwrap().len(), 1);
}

// ========== Audit API Tests ==========

#[tokio::test]
async fn test_audit_log_records_caller_actions() {
    let (app, _db) = setup_test_app();

    create_budget_via_api(
        &app,
        serde_json::json!({
            "period": "daily",
            "limit": 10.0,
            "startDate": "2024-01-01"
        }),
    )
    .await;

    let response = app.oneshot(get("/api/audit?limit=10")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entries = get_body_json(response).await;
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "create");
    assert_eq!(entries[0]["entityType"], "budget");
    assert_eq!(entries[0]["userId"], 7);
}

#[tokio::test]
async fn test_file_backed_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("api.db");
    let db = Database::new_unencrypted(path.to_str().unwrap()).unwrap();
    let app = create_router(db, test_config());

    create_budget_via_api(
        &app,
        serde_json::json!({
            "period": "monthly",
            "limit": 10.0,
            "startDate": "2024-01-01"
        }),
    )
    .await;

    let reopened = Database::new_unencrypted(path.to_str().unwrap()).unwrap();
    assert_eq!(reopened.count_active_budgets().unwrap(), 1);
}
