//! Integration tests for the API server.

use std::sync::Arc;

use api::config::Config;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::ProductInfo;
use common::{Money, ProductId};
use tower::ServiceExt;

fn setup() -> (Router, Arc<api::AppState>) {
    let (state, _events) = api::create_default_state(&Config::default());
    let app = api::create_app(state.clone());
    (app, state)
}

async fn seed(state: &api::AppState, sku: &str, price_cents: i64, stock: u32) {
    let product_id = ProductId::new(sku);
    state
        .catalog
        .upsert(
            product_id.clone(),
            ProductInfo {
                name: sku.to_string(),
                unit_price: Money::from_cents(price_cents),
                active: true,
            },
        )
        .await;
    state.engine.register_product(product_id, stock).await.unwrap();
}

fn checkout_body(sku: &str, quantity: u32, key: &str) -> serde_json::Value {
    serde_json::json!({
        "items": [{ "product_id": sku, "quantity": quantity }],
        "idempotency_key": key,
    })
}

async fn post_json(app: &Router, uri: &str, body: &serde_json::Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_checkout_success() {
    let (app, state) = setup();
    // Amounts ending .00 always approve.
    seed(&state, "SKU-001", 1000, 10).await;

    let response = post_json(&app, "/checkout", &checkout_body("SKU-001", 2, "key-1")).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = json_body(response).await;
    assert_eq!(json["status"], "Paid");
    assert_eq!(json["total_cents"], 2000);
    assert!(json["payment_id"].as_str().is_some());
    assert!(json["items"][0]["reservation_id"].as_str().is_some());
}

#[tokio::test]
async fn test_checkout_unknown_product_is_bad_request() {
    let (app, _state) = setup();

    let response = post_json(&app, "/checkout", &checkout_body("SKU-NOPE", 1, "key-1")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("SKU-NOPE"));
}

#[tokio::test]
async fn test_checkout_insufficient_stock_is_conflict() {
    let (app, state) = setup();
    seed(&state, "SKU-001", 1000, 2).await;

    let response = post_json(&app, "/checkout", &checkout_body("SKU-001", 5, "key-1")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_checkout_declined_payment_is_payment_required() {
    let (app, state) = setup();
    // Amounts ending .99 always decline.
    seed(&state, "SKU-001", 1099, 10).await;

    let response = post_json(&app, "/checkout", &checkout_body("SKU-001", 1, "key-1")).await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    // The failed order is still on record.
    let level = state.engine.stock(&ProductId::new("SKU-001")).await.unwrap();
    assert_eq!(level.available, 10);
}

#[tokio::test]
async fn test_checkout_and_get_order() {
    let (app, state) = setup();
    seed(&state, "SKU-001", 1000, 10).await;

    let created = json_body(post_json(&app, "/checkout", &checkout_body("SKU-001", 1, "key-1")).await).await;
    let order_id = created["id"].as_str().unwrap();

    let response = get(&app, &format!("/orders/{order_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["id"], created["id"]);
    assert_eq!(json["status"], "Paid");
}

#[tokio::test]
async fn test_get_unknown_order_is_not_found() {
    let (app, _state) = setup();
    let response = get(&app, &format!("/orders/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_order_with_malformed_id_is_bad_request() {
    let (app, _state) = setup();
    let response = get(&app, "/orders/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_for_user() {
    let (app, state) = setup();
    seed(&state, "SKU-001", 1000, 10).await;
    let user_id = uuid::Uuid::new_v4();

    let body = serde_json::json!({
        "user_id": user_id.to_string(),
        "items": [{ "product_id": "SKU-001", "quantity": 1 }],
        "idempotency_key": "key-1",
    });
    post_json(&app, "/checkout", &body).await;

    let response = get(&app, &format!("/orders?user_id={user_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["user_id"], user_id.to_string());

    // A different user sees nothing.
    let response = get(&app, &format!("/orders?user_id={}", uuid::Uuid::new_v4())).await;
    let json = json_body(response).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_idempotency_key_returns_same_order() {
    let (app, state) = setup();
    seed(&state, "SKU-001", 1000, 10).await;
    let user_id = uuid::Uuid::new_v4();

    let body = serde_json::json!({
        "user_id": user_id.to_string(),
        "items": [{ "product_id": "SKU-001", "quantity": 2 }],
        "idempotency_key": "key-1",
    });

    let first = json_body(post_json(&app, "/checkout", &body).await).await;
    let second = json_body(post_json(&app, "/checkout", &body).await).await;

    assert_eq!(first["id"], second["id"]);
    // Only one checkout consumed stock.
    let level = state.engine.stock(&ProductId::new("SKU-001")).await.unwrap();
    assert_eq!(level.available, 8);
}

#[tokio::test]
async fn test_repeated_anonymous_checkout_returns_same_order() {
    let (app, state) = setup();
    seed(&state, "SKU-001", 1000, 10).await;

    // No user_id in the body: the handler mints a session identity per
    // request, so only the key can tie the retry to the original order.
    let body = checkout_body("SKU-001", 2, "key-1");
    let first = json_body(post_json(&app, "/checkout", &body).await).await;
    let second = json_body(post_json(&app, "/checkout", &body).await).await;

    assert_eq!(first["id"], second["id"]);
    // Only one checkout consumed stock.
    let level = state.engine.stock(&ProductId::new("SKU-001")).await.unwrap();
    assert_eq!(level.available, 8);
}

#[tokio::test]
async fn test_cancel_paid_order() {
    let (app, state) = setup();
    seed(&state, "SKU-001", 1000, 10).await;

    let created = json_body(post_json(&app, "/checkout", &checkout_body("SKU-001", 1, "key-1")).await).await;
    let order_id = created["id"].as_str().unwrap();

    let response = post_json(
        &app,
        &format!("/orders/{order_id}/cancel"),
        &serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "Canceled");

    // A second cancel hits a terminal order.
    let response = post_json(
        &app,
        &format!("/orders/{order_id}/cancel"),
        &serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reservation_lookup() {
    let (app, state) = setup();
    seed(&state, "SKU-001", 1000, 10).await;

    let created = json_body(post_json(&app, "/checkout", &checkout_body("SKU-001", 3, "key-1")).await).await;
    let reservation_id = created["items"][0]["reservation_id"].as_str().unwrap();

    let response = get(&app, &format!("/reservations/{reservation_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["state"], "Confirmed");
    assert_eq!(json["quantity"], 3);
    assert_eq!(json["order_reference"], created["id"]);

    let response = get(&app, &format!("/reservations/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
