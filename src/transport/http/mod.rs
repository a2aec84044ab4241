pub mod errors;
pub mod extractors;
pub mod orders;
pub mod payments;
pub mod webhook;

use {
    crate::AppState,
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post, put},
    },
};

/// Processor events are well under this.
const BODY_LIMIT: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/orders", post(orders::place_order).get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/cancel", post(orders::cancel_order))
        .route("/admin/orders/{id}/status", put(orders::update_status))
        .route("/admin/orders/{id}/refund", post(orders::refund_order))
        .route("/payments/intents", post(payments::create_intent))
        .route("/payments/intents/{intent_id}", get(payments::intent_status))
        .route("/webhooks/stripe", post(webhook::stripe_webhook))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
