//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::{AppState, Config};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use inventory::InMemoryStockStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn test_config() -> Config {
    Config {
        payment_latency: Duration::ZERO,
        step_timeout: Duration::from_secs(1),
        ..Config::default()
    }
}

fn setup() -> axum::Router {
    setup_with_state().0
}

fn setup_with_state() -> (axum::Router, Arc<AppState<InMemoryStockStore>>) {
    let metrics_handle = get_metrics_handle();
    let state = api::create_default_state(InMemoryStockStore::new(), &test_config());
    let app = api::create_app(state.clone(), metrics_handle);
    (app, state)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn declare(app: &axum::Router, product_id: &str, stock: u32) {
    let (status, _) = send(
        app,
        "POST",
        "/inventory",
        Some(json!({ "product_id": product_id, "stock": stock })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn stock_of(app: &axum::Router, product_id: &str) -> u64 {
    let (_, records) = send(app, "GET", "/admin/inventory", None).await;
    records
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["product_id"] == product_id)
        .map(|r| r["stock"].as_u64().unwrap())
        .unwrap()
}

fn order_request(items: Value, simulate_failure: bool) -> Value {
    json!({
        "user_id": "user-42",
        "items": items,
        "simulate_failure": simulate_failure,
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["breakers"]["inventory"], "CLOSED");
    assert_eq!(json["breakers"]["payment"], "CLOSED");
}

#[tokio::test]
async fn test_declare_inventory_twice_conflicts() {
    let app = setup();
    declare(&app, "SKU-001", 10).await;

    let (status, json) = send(
        &app,
        "POST",
        "/inventory",
        Some(json!({ "product_id": "SKU-001", "stock": 3 })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("SKU-001"));
    assert_eq!(stock_of(&app, "SKU-001").await, 10);
}

#[tokio::test]
async fn test_create_order_pays_and_reserves_stock() {
    let (app, state) = setup_with_state();
    declare(&app, "SKU-001", 10).await;
    declare(&app, "SKU-002", 5).await;

    let (status, order) = send(
        &app,
        "POST",
        "/orders",
        Some(order_request(
            json!([
                { "product_id": "SKU-001", "quantity": 2, "unit_price_cents": 1000 },
                { "product_id": "SKU-002", "quantity": 1, "unit_price_cents": 250 },
            ]),
            false,
        )),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "PAID");
    assert_eq!(order["user_id"], "user-42");
    assert_eq!(order["total_cents"], 2250);
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert_eq!(stock_of(&app, "SKU-001").await, 8);
    assert_eq!(stock_of(&app, "SKU-002").await, 4);
    assert_eq!(state.payment.payment_count(), 1);

    let order_id = order["id"].as_str().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], order_id);
    assert_eq!(fetched["status"], "PAID");
}

#[tokio::test]
async fn test_simulated_payment_failure_cancels_and_restores_stock() {
    let (app, state) = setup_with_state();
    declare(&app, "SKU-001", 10).await;

    let (status, order) = send(
        &app,
        "POST",
        "/orders",
        Some(order_request(
            json!([{ "product_id": "SKU-001", "quantity": 3, "unit_price_cents": 500 }]),
            true,
        )),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "CANCELED");
    assert_eq!(stock_of(&app, "SKU-001").await, 10);
    assert_eq!(state.payment.attempts(), 1);
    assert_eq!(state.payment.payment_count(), 0);
}

#[tokio::test]
async fn test_insufficient_stock_cancels_without_payment() {
    let (app, state) = setup_with_state();
    declare(&app, "SKU-001", 10).await;
    declare(&app, "SKU-002", 1).await;

    let (status, order) = send(
        &app,
        "POST",
        "/orders",
        Some(order_request(
            json!([
                { "product_id": "SKU-001", "quantity": 4 },
                { "product_id": "SKU-002", "quantity": 2 },
            ]),
            false,
        )),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "CANCELED");
    assert_eq!(stock_of(&app, "SKU-001").await, 10);
    assert_eq!(stock_of(&app, "SKU-002").await, 1);
    assert_eq!(state.payment.attempts(), 0);
}

#[tokio::test]
async fn test_create_order_without_items_is_rejected() {
    let app = setup();

    let (status, json) = send(&app, "POST", "/orders", Some(order_request(json!([]), false))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some());

    let (_, orders) = send(&app, "GET", "/admin/orders", None).await;
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_order_with_out_of_range_total_is_rejected() {
    let app = setup();
    declare(&app, "SKU-001", 5).await;

    let items = json!([
        { "product_id": "SKU-001", "quantity": 2, "unit_price_cents": i64::MAX / 2 + 1 }
    ]);
    let (status, json) = send(&app, "POST", "/orders", Some(order_request(items, false))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("out of range"));
    assert_eq!(stock_of(&app, "SKU-001").await, 5);

    let (_, orders) = send(&app, "GET", "/admin/orders", None).await;
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = setup();
    let fake_id = uuid::Uuid::new_v4();

    let (status, _) = send(&app, "GET", &format!("/orders/{fake_id}"), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let app = setup();

    let (status, _) = send(&app, "GET", "/orders/not-a-uuid", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_can_ship_paid_order_only() {
    let app = setup();
    declare(&app, "SKU-001", 10).await;

    let (_, paid) = send(
        &app,
        "POST",
        "/orders",
        Some(order_request(
            json!([{ "product_id": "SKU-001", "quantity": 1 }]),
            false,
        )),
    )
    .await;
    let (_, canceled) = send(
        &app,
        "POST",
        "/orders",
        Some(order_request(
            json!([{ "product_id": "SKU-001", "quantity": 1 }]),
            true,
        )),
    )
    .await;
    let paid_id = paid["id"].as_str().unwrap();
    let canceled_id = canceled["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/admin/orders/{paid_id}/status?new_status=PAID"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, shipped) = send(
        &app,
        "PUT",
        &format!("/admin/orders/{paid_id}/status?new_status=SHIPPED"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shipped["status"], "SHIPPED");

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/admin/orders/{canceled_id}/status?new_status=SHIPPED"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, still_canceled) = send(&app, "GET", &format!("/orders/{canceled_id}"), None).await;
    assert_eq!(still_canceled["status"], "CANCELED");
}

#[tokio::test]
async fn test_list_orders_filters_by_status() {
    let app = setup();
    declare(&app, "SKU-001", 10).await;

    for simulate_failure in [false, false, true] {
        send(
            &app,
            "POST",
            "/orders",
            Some(order_request(
                json!([{ "product_id": "SKU-001", "quantity": 1 }]),
                simulate_failure,
            )),
        )
        .await;
    }

    let (status, all) = send(&app, "GET", "/admin/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, paid) = send(&app, "GET", "/admin/orders?status=PAID", None).await;
    assert_eq!(paid.as_array().unwrap().len(), 2);

    let (_, page) = send(&app, "GET", "/admin/orders?skip=1&limit=1", None).await;
    assert_eq!(page.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "GET", "/admin/orders?status=LOST", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reserve_and_release_endpoints() {
    let app = setup();
    declare(&app, "SKU-001", 5).await;

    let (status, record) = send(
        &app,
        "POST",
        "/inventory/reserve",
        Some(json!({ "product_id": "SKU-001", "quantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["stock"], 0);
    assert_eq!(record["available"], false);
    assert_eq!(record["version"], 2);

    let (status, _) = send(
        &app,
        "POST",
        "/inventory/reserve",
        Some(json!({ "product_id": "SKU-001", "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, record) = send(
        &app,
        "POST",
        "/inventory/release",
        Some(json!({ "product_id": "SKU-001", "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["stock"], 2);
    assert_eq!(record["available"], true);

    let (status, _) = send(
        &app,
        "POST",
        "/inventory/reserve",
        Some(json!({ "product_id": "SKU-404", "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/inventory/reserve",
        Some(json!({ "product_id": "SKU-001", "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_correction_sets_stock_absolutely() {
    let app = setup();

    let (status, created) = send(
        &app,
        "POST",
        "/admin/inventory/correction",
        Some(json!({ "product_id": "SKU-009", "stock": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["stock"], 7);

    let (_, corrected) = send(
        &app,
        "POST",
        "/admin/inventory/correction",
        Some(json!({ "product_id": "SKU-009", "stock": 2 })),
    )
    .await;
    assert_eq!(corrected["stock"], 2);
    assert!(corrected["version"].as_i64().unwrap() > created["version"].as_i64().unwrap());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    declare(&app, "SKU-001", 10).await;
    send(
        &app,
        "POST",
        "/orders",
        Some(order_request(
            json!([{ "product_id": "SKU-001", "quantity": 1 }]),
            false,
        )),
    )
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
    assert!(text.contains("saga_executions_total"));
}
