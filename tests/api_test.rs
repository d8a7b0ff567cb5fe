mod common;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::tick;
use gastos::application::ExpenseService;
use gastos::server::router;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    router(ExpenseService::in_memory())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

fn rent_body() -> Value {
    json!({
        "description": "Rent",
        "paymentMethod": "Bank Transfer",
        "amount": 1500.00
    })
}

#[tokio::test]
async fn test_create_and_fetch() -> Result<()> {
    let app = app();

    let (status, created) = send(&app, "POST", "/api/expenses", Some(rent_body())).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["amount"], "1500.00");
    assert_eq!(created["paymentMethod"], "Bank Transfer");
    assert_eq!(created["paid"], false);
    assert_eq!(created["overdue"], false);
    assert_eq!(created["recurring"], false);
    assert_eq!(created["version"], 0);
    assert_eq!(created["createdAt"], created["updatedAt"]);

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/api/expenses/{id}"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, all) = send(&app, "GET", "/api/expenses", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_validation_errors() -> Result<()> {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/expenses",
        Some(json!({"description": "Rent", "paymentMethod": "Cash", "amount": "0.00"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "amount");

    let (status, body) = send(
        &app,
        "POST",
        "/api/expenses",
        Some(json!({"description": "ab", "paymentMethod": "Cash", "amount": "10.00"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "description");

    // Missing fields and too many decimals never reach the service
    let (status, _) = send(
        &app,
        "POST",
        "/api/expenses",
        Some(json!({"description": "Rent"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/expenses",
        Some(json!({"description": "Rent", "paymentMethod": "Cash", "amount": "1.005"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/expenses", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_validation_reports_every_field() -> Result<()> {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/expenses",
        Some(json!({"description": "ab", "paymentMethod": " ", "amount": "0.00"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "description");
    let errors = body["errors"].as_object().unwrap();
    assert_eq!(errors.len(), 3);
    assert!(errors["amount"].as_str().unwrap().contains("0.01"));
    assert!(errors.contains_key("paymentMethod"));
    Ok(())
}

#[tokio::test]
async fn test_bad_query_and_path_get_json_errors() -> Result<()> {
    let app = app();
    for uri in [
        "/api/expenses/search",
        "/api/expenses/status?paid=maybe",
        "/api/expenses/period?start=yesterday&end=today",
        "/api/expenses/abc",
        "/api/expenses/abc/mark-paid",
    ] {
        let method = if uri.ends_with("mark-paid") { "PATCH" } else { "GET" };
        let (status, body) = send(&app, method, uri, None).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string(), "{uri}: {body}");
    }
    Ok(())
}

#[tokio::test]
async fn test_cors_allows_any_origin() -> Result<()> {
    let app = app();

    let request = Request::builder()
        .uri("/api/expenses")
        .header("origin", "http://localhost:5173")
        .body(Body::empty())?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/expenses/1")
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "PUT")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())?;
    let response = app.oneshot(preflight).await?;
    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-max-age"], "3600");
    assert!(headers.contains_key("access-control-allow-methods"));
    Ok(())
}

#[tokio::test]
async fn test_status_transitions() -> Result<()> {
    let app = app();
    let (_, created) = send(&app, "POST", "/api/expenses", Some(rent_body())).await?;
    let id = created["id"].as_i64().unwrap();

    let (status, overdue) =
        send(&app, "PATCH", &format!("/api/expenses/{id}/mark-overdue"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overdue["overdue"], true);
    assert_eq!(overdue["paid"], false);

    let (_, paid) = send(&app, "PATCH", &format!("/api/expenses/{id}/mark-paid"), None).await?;
    assert_eq!(paid["paid"], true);
    assert_eq!(paid["overdue"], false);

    let (_, unpaid) =
        send(&app, "PATCH", &format!("/api/expenses/{id}/mark-unpaid"), None).await?;
    assert_eq!(unpaid["paid"], false);
    assert_eq!(unpaid["overdue"], false);
    assert_eq!(unpaid["version"], 3);

    let (status, _) = send(&app, "PATCH", "/api/expenses/999/mark-paid", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_update_with_version() -> Result<()> {
    let app = app();
    let (_, created) = send(&app, "POST", "/api/expenses", Some(rent_body())).await?;
    let id = created["id"].as_i64().unwrap();
    let uri = format!("/api/expenses/{id}");

    let replacement = json!({
        "description": "Rent (March)",
        "paymentMethod": "Pix",
        "amount": "1550.00",
        "paid": true,
        "overdue": false,
        "recurring": true,
        "version": 0
    });
    let (status, updated) = send(&app, "PUT", &uri, Some(replacement.clone())).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], "Rent (March)");
    assert_eq!(updated["amount"], "1550.00");
    assert_eq!(updated["version"], 1);

    // Same expected version again is now stale
    let (status, body) = send(&app, "PUT", &uri, Some(replacement)).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("version"));

    // Without a version the write goes through
    let (status, _) = send(&app, "PUT", &uri, Some(rent_body())).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "PUT", "/api/expenses/999", Some(rent_body())).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_delete() -> Result<()> {
    let app = app();
    let (_, created) = send(&app, "POST", "/api/expenses", Some(rent_body())).await?;
    let uri = format!("/api/expenses/{}", created["id"]);

    let (status, body) = send(&app, "DELETE", &uri, None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, "DELETE", &uri, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", &uri, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_queries() -> Result<()> {
    let app = app();
    let mut created = Vec::new();
    for body in [
        json!({"description": "Rent", "paymentMethod": "Bank Transfer", "amount": "1500.00", "recurring": true}),
        json!({"description": "Groceries", "paymentMethod": "Credit Card", "amount": "230.45", "paid": true}),
        json!({"description": "Electricity", "paymentMethod": "Bank Transfer", "amount": "120.10", "overdue": true}),
    ] {
        let (_, expense) = send(&app, "POST", "/api/expenses", Some(body)).await?;
        created.push(expense);
        tick().await;
    }

    let count = |value: &Value| value.as_array().map(Vec::len).unwrap_or_default();

    let (_, by_method) = send(&app, "GET", "/api/expenses/payment-method/Credit%20Card", None).await?;
    assert_eq!(count(&by_method), 1);
    assert_eq!(by_method[0]["description"], "Groceries");

    let (_, overdue) = send(&app, "GET", "/api/expenses/overdue", None).await?;
    assert_eq!(count(&overdue), 1);

    let (_, unpaid) = send(&app, "GET", "/api/expenses/unpaid", None).await?;
    assert_eq!(count(&unpaid), 2);

    let (_, recurring) = send(&app, "GET", "/api/expenses/recurring", None).await?;
    assert_eq!(count(&recurring), 1);

    let (_, paid) = send(&app, "GET", "/api/expenses/status?paid=true", None).await?;
    assert_eq!(count(&paid), 1);

    let (status, found) = send(&app, "GET", "/api/expenses/search?term=ent", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count(&found), 1);
    assert_eq!(found[0]["description"], "Rent");

    let (status, _) = send(&app, "GET", "/api/expenses/search?term=", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let first = created[0]["createdAt"].as_str().unwrap();
    let last = created[2]["createdAt"].as_str().unwrap();
    let (status, period) = send(
        &app,
        "GET",
        &format!("/api/expenses/period?start={first}&end={last}"),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count(&period), 3);
    assert_eq!(period[0]["description"], "Electricity");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/expenses/period?start={last}&end={first}"),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("field").is_none());
    Ok(())
}

#[tokio::test]
async fn test_stats() -> Result<()> {
    let app = app();

    let (status, total) = send(&app, "GET", "/api/expenses/stats/total", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(total, "0.00");

    for body in [
        json!({"description": "Rent", "paymentMethod": "Bank Transfer", "amount": "1500.00"}),
        json!({"description": "Electricity", "paymentMethod": "Bank Transfer", "amount": "120.10", "overdue": true}),
        json!({"description": "Groceries", "paymentMethod": "Credit Card", "amount": "0.20", "paid": true}),
    ] {
        send(&app, "POST", "/api/expenses", Some(body)).await?;
    }

    let (_, total) = send(&app, "GET", "/api/expenses/stats/total", None).await?;
    assert_eq!(total, "1620.30");
    let (_, overdue) = send(&app, "GET", "/api/expenses/stats/total-overdue", None).await?;
    assert_eq!(overdue, "120.10");
    let (_, unpaid) = send(&app, "GET", "/api/expenses/stats/total-unpaid", None).await?;
    assert_eq!(unpaid, "1620.10");
    let (_, count) = send(&app, "GET", "/api/expenses/stats/count-unpaid", None).await?;
    assert_eq!(count, 2);

    let (_, summary) = send(&app, "GET", "/api/expenses/stats", None).await?;
    assert_eq!(
        summary,
        json!({
            "total": "1620.30",
            "totalOverdue": "120.10",
            "totalUnpaid": "1620.10",
            "unpaidCount": 2
        })
    );
    Ok(())
}
