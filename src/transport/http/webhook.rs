use {
    super::errors::ApiError,
    crate::{
        AppState,
        domain::error::OrderError,
        services::reconciliation::{self, ReconcileResult},
    },
    axum::{Json, body::Bytes, extract::State, http::HeaderMap},
};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// The body is taken as raw bytes: the signature covers exactly what was
/// sent, so nothing may parse or re-encode it first.
#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(event_id = tracing::field::Empty, event_type = tracing::field::Empty)
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| OrderError::InvalidSignature("missing Stripe-Signature header".into()))?;

    let event = state.gateway.verify_webhook(&body, signature)?;

    tracing::Span::current()
        .record("event_id", tracing::field::display(&event.id))
        .record("event_type", tracing::field::display(&event.event_type));

    let result = reconciliation::apply_event(state.store.as_ref(), &event).await?;
    let mut body = serde_json::json!({ "received": true, "status": result.as_str() });
    match result {
        ReconcileResult::Applied(order_id)
        | ReconcileResult::Unchanged(order_id)
        | ReconcileResult::Anomaly(order_id) => {
            body["order_id"] = serde_json::json!(order_id);
        }
        _ => {}
    }
    Ok(Json(body))
}
