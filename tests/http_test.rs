mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use serde_json::{Value, json};
use stayspace_orders::{
    domain::{
        caller::Caller,
        id::{OrderId, ProductId},
        order::OrderStatus,
    },
    infra::memory::MemoryStore,
    transport::http::router,
};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    store: MemoryStore,
    gateway: std::sync::Arc<FakeGateway>,
    sofa: ProductId,
}

async fn test_app() -> TestApp {
    let store = MemoryStore::new();
    let gateway = FakeGateway::new();
    let sofa = seed(&store, "Linen sofa", 1999, 5).await;
    TestApp {
        app: router(app_state(&store, &gateway)),
        store,
        gateway,
        sofa,
    }
}

fn http_request(
    method: &str,
    uri: &str,
    caller: Option<&Caller>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        let role = if caller.is_admin() { "admin" } else { "customer" };
        builder = builder
            .header("x-user-id", caller.user_id.to_string())
            .header("x-user-role", role);
        if let Some(email) = &caller.email {
            builder = builder.header("x-user-email", email);
        }
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn order_body(product: ProductId, quantity: u32, price: f64) -> Value {
    json!({
        "items": [{ "productId": product.to_string(), "quantity": quantity, "price": price }],
        "shippingAddress": {
            "street": "1 Elm St",
            "city": "Springfield",
            "postalCode": "12345",
            "country": "US"
        }
    })
}

async fn place_via_http(t: &TestApp, caller: &Caller, quantity: u32) -> Value {
    let (status, body) = send(
        &t.app,
        http_request("POST", "/orders", Some(caller), Some(order_body(t.sofa, quantity, 19.99))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

// ── 1. health ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_open() {
    let t = test_app().await;
    let (status, _) = send(&t.app, http_request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

// ── 2. identity ────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_identity_is_401() {
    let t = test_app().await;
    let (status, body) = send(
        &t.app,
        http_request("POST", "/orders", None, Some(order_body(t.sofa, 1, 19.99))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "unauthenticated");
    assert_eq!(t.store.order_count().await, 0);
}

// ── 3. placement converts decimal prices once ──────────────────────────────

#[tokio::test]
async fn place_order_returns_created_order() {
    let t = test_app().await;
    let body = place_via_http(&t, &customer(), 2).await;

    assert_eq!(body["status"], "pending");
    assert_eq!(body["total"]["amount"], 3998);
    assert_eq!(body["total"]["currency"], "usd");
    assert_eq!(body["items"][0]["unitPrice"], 1999);
    assert_eq!(t.store.product(t.sofa).await.unwrap().stock, 3);
}

#[tokio::test]
async fn missing_shipping_address_is_422() {
    let t = test_app().await;
    let body = json!({
        "items": [{ "productId": t.sofa.to_string(), "quantity": 1, "price": 19.99 }]
    });
    let req = http_request("POST", "/orders", Some(&customer()), Some(body));
    let (status, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error_code"], "invalid_input");
}

// ── 4. insufficient stock body ─────────────────────────────────────────────

#[tokio::test]
async fn insufficient_stock_is_409_with_available() {
    let t = test_app().await;
    place_via_http(&t, &customer(), 3).await;

    let (status, body) = send(
        &t.app,
        http_request("POST", "/orders", Some(&customer()), Some(order_body(t.sofa, 3, 19.99))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "insufficient_stock");
    assert_eq!(body["available"], 2);
    assert_eq!(body["product_id"], t.sofa.to_string());
}

// ── 5. visibility ──────────────────────────────────────────────────────────

#[tokio::test]
async fn orders_are_hidden_from_other_customers() {
    let t = test_app().await;
    let owner = customer();
    let order = place_via_http(&t, &owner, 1).await;
    let uri = format!("/orders/{}", order["id"].as_str().unwrap());

    let (status, _) = send(&t.app, http_request("GET", &uri, Some(&owner), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&t.app, http_request("GET", &uri, Some(&customer()), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&t.app, http_request("GET", &uri, Some(&admin()), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, list) = send(&t.app, http_request("GET", "/orders", Some(&owner), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let req = http_request("GET", "/orders/not-a-uuid", Some(&owner), None);
    let (status, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ── 6. cancel endpoint reports settlement ──────────────────────────────────

#[tokio::test]
async fn cancel_releases_stock_and_cancels_intent() {
    let t = test_app().await;
    let owner = customer();
    let order = place_via_http(&t, &owner, 2).await;
    let id = order["id"].as_str().unwrap().to_string();

    let (status, intent) = send(
        &t.app,
        http_request("POST", "/payments/intents", Some(&owner), Some(json!({ "orderId": id }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &t.app,
        http_request("POST", &format!("/orders/{id}/cancel"), Some(&owner), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order"]["status"], "cancelled");
    assert_eq!(body["payment"]["action"], "intent_canceled");
    assert_eq!(body["payment"]["intent_id"], intent["intentId"]);
    assert_eq!(t.store.product(t.sofa).await.unwrap().stock, 5);
    assert_eq!(t.gateway.cancelled().len(), 1);

    let (status, body) = send(
        &t.app,
        http_request("POST", &format!("/orders/{id}/cancel"), Some(&owner), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "invalid_transition");
}

// ── 7. admin routes ────────────────────────────────────────────────────────

#[tokio::test]
async fn status_updates_are_admin_only_and_follow_state_machine() {
    let t = test_app().await;
    let owner = customer();
    let order = place_via_http(&t, &owner, 1).await;
    let uri = format!("/admin/orders/{}/status", order["id"].as_str().unwrap());

    let (status, _) = send(
        &t.app,
        http_request("PUT", &uri, Some(&owner), Some(json!({ "status": "shipped" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &t.app,
        http_request("PUT", &uri, Some(&admin()), Some(json!({ "status": "shipped" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "invalid_transition");

    let (status, body) = send(
        &t.app,
        http_request("PUT", &uri, Some(&admin()), Some(json!({ "status": "teleported" }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    for target in ["processing", "cancelled"] {
        let (status, body) = send(
            &t.app,
            http_request("PUT", &uri, Some(&admin()), Some(json!({ "status": target }))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT, "{target}");
        assert_eq!(body["error_code"], "invalid_transition");
    }
    let order_id = OrderId::try_from(order["id"].as_str().unwrap()).unwrap();
    let stored = t.store.order(order_id).await.unwrap();
    assert_eq!(stored.status(), OrderStatus::Pending);
    assert!(stored.paid_at().is_none());

    let payload = succeeded_event("evt_http_paid", "pi_http_paid", order_id, 1999);
    let (status, body) = send(&t.app, webhook(&payload, Some(&sign(&payload)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "applied");

    let (status, body) = send(
        &t.app,
        http_request(
            "PUT",
            &uri,
            Some(&admin()),
            Some(json!({ "status": "shipped", "trackingNumber": "1Z999", "carrier": "UPS" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "shipped");
    assert_eq!(body["trackingNumber"], "1Z999");
}

#[tokio::test]
async fn refund_without_payment_is_400() {
    let t = test_app().await;
    let order = place_via_http(&t, &customer(), 1).await;
    let uri = format!("/admin/orders/{}/refund", order["id"].as_str().unwrap());

    let req = http_request("POST", &uri, Some(&admin()), Some(json!({})));
    let (status, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "no_payment");
}

// ── 8. payment intents ─────────────────────────────────────────────────────

#[tokio::test]
async fn second_intent_is_409_and_status_hides_secret() {
    let t = test_app().await;
    let owner = customer();
    let order = place_via_http(&t, &owner, 1).await;
    let body = json!({ "orderId": order["id"] });

    let (status, intent) = send(
        &t.app,
        http_request("POST", "/payments/intents", Some(&owner), Some(body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(intent["amount"], 1999);
    assert!(intent["clientSecret"].is_string());

    let (status, err) = send(
        &t.app,
        http_request("POST", "/payments/intents", Some(&owner), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error_code"], "already_exists");

    let uri = format!("/payments/intents/{}", intent["intentId"].as_str().unwrap());
    let (status, seen) = send(&t.app, http_request("GET", &uri, Some(&owner), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seen["status"], "requires_payment_method");
    assert!(seen.get("clientSecret").is_none());

    let (status, _) = send(&t.app, http_request("GET", &uri, Some(&customer()), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── 9. webhook endpoint ────────────────────────────────────────────────────

fn webhook(payload: &[u8], signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/webhooks/stripe");
    if let Some(signature) = signature {
        builder = builder.header("Stripe-Signature", signature);
    }
    builder.body(Body::from(payload.to_vec())).unwrap()
}

#[tokio::test]
async fn webhook_applies_once_and_acknowledges_replays() {
    let t = test_app().await;
    let owner = customer();
    let order = place_via_http(&t, &owner, 1).await;
    let order_id = OrderId::try_from(order["id"].as_str().unwrap()).unwrap();

    let payload = succeeded_event("evt_http_1", "pi_http", order_id, 1999);
    let signature = sign(&payload);

    let (status, body) = send(&t.app, webhook(&payload, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "applied");

    let (status, body) = send(&t.app, webhook(&payload, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "duplicate");

    let stored = t.store.order(order_id).await.unwrap();
    assert_eq!(stored.status(), OrderStatus::Processing);
}

#[tokio::test]
async fn webhook_rejects_bad_or_missing_signature() {
    let t = test_app().await;
    let owner = customer();
    let order = place_via_http(&t, &owner, 1).await;
    let order_id = OrderId::try_from(order["id"].as_str().unwrap()).unwrap();
    let payload = succeeded_event("evt_http_2", "pi_http", order_id, 1999);

    let (status, body) = send(&t.app, webhook(&payload, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_signature");

    let signature = sign(&payload);
    let mut tampered = payload.clone();
    tampered.extend_from_slice(b"\n");
    let (status, _) = send(&t.app, webhook(&tampered, Some(&signature))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored = t.store.order(order_id).await.unwrap();
    assert_eq!(stored.status(), OrderStatus::Pending);
}

#[tokio::test]
async fn webhook_acknowledges_unknown_events() {
    let t = test_app().await;
    let payload = json!({
        "id": "evt_http_unknown",
        "type": "invoice.finalized",
        "created": chrono::Utc::now().timestamp(),
        "data": { "object": { "id": "in_1" } }
    })
    .to_string()
    .into_bytes();
    let (status, body) = send(&t.app, webhook(&payload, Some(&sign(&payload)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
}
