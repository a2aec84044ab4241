use {
    super::errors::ApiError,
    crate::{
        AppState,
        domain::{
            caller::Caller,
            gateway::{IntentStatus, PaymentIntent},
            id::{IntentId, OrderId},
            money::Currency,
        },
        services::payments,
    },
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
    },
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    pub intent_id: IntentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub status: IntentStatus,
    /// Minor units.
    pub amount: i64,
    pub currency: Currency,
    pub order_id: Option<OrderId>,
}

impl From<PaymentIntent> for IntentResponse {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
            amount: intent.money.amount().minor(),
            currency: intent.money.currency(),
            order_id: intent.order_id,
        }
    }
}

pub async fn create_intent(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateIntentRequest>,
) -> Result<(StatusCode, Json<IntentResponse>), ApiError> {
    let intent = payments::create_payment_intent(
        state.store.as_ref(),
        state.gateway.as_ref(),
        &caller,
        OrderId::from_uuid(request.order_id),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(intent.into())))
}

/// Status only; the client secret is handed out once, at creation.
pub async fn intent_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(intent_id): Path<String>,
) -> Result<Json<IntentResponse>, ApiError> {
    let intent_id = IntentId::new(intent_id)?;
    let intent =
        payments::payment_status(state.store.as_ref(), state.gateway.as_ref(), &caller, &intent_id)
            .await?;
    let mut response = IntentResponse::from(intent);
    response.client_secret = None;
    Ok(Json(response))
}
