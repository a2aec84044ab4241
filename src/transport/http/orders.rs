use {
    super::errors::ApiError,
    crate::{
        AppState,
        domain::{
            caller::Caller,
            error::OrderError,
            gateway::RefundReason,
            id::{OrderId, ProductId, RefundId},
            money::MoneyAmount,
            order::{Order, OrderStatus, ShippingAddress, Shipment},
        },
        services::{
            cancellation::{self, PaymentSettlement, RefundOrder},
            inventory::OrderLine,
            order_lifecycle,
            order_placement::{self, PlaceOrder},
        },
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
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    /// Decimal price in major units, as shown to the customer.
    pub price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: Option<ShippingAddress>,
}

impl PlaceOrderRequest {
    fn into_command(self, state: &AppState) -> Result<PlaceOrder, ApiError> {
        let shipping_address = self
            .shipping_address
            .ok_or_else(|| OrderError::InvalidInput("shipping address is required".into()))?;
        let items = self
            .items
            .into_iter()
            .map(|item| {
                Ok(OrderLine {
                    product_id: ProductId::from_uuid(item.product_id),
                    quantity: item.quantity,
                    unit_price: MoneyAmount::from_major(item.price, state.currency)?,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;
        Ok(PlaceOrder {
            items,
            shipping_address,
        })
    }
}

fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    Ok(OrderId::try_from(raw)?)
}

#[tracing::instrument(name = "http_place_order", skip_all)]
pub async fn place_order(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let command = request.into_command(&state)?;
    let order =
        order_placement::place_order(state.store.as_ref(), &caller, &command, state.currency)
            .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = order_lifecycle::list_orders(state.store.as_ref(), &caller).await?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id = parse_order_id(&id)?;
    let order = order_lifecycle::get_order(state.store.as_ref(), &caller, id).await?;
    Ok(Json(order))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub order: Order,
    pub payment: PaymentSettlement,
}

/// Cancel, return stock, then settle whatever the processor holds.
#[tracing::instrument(name = "http_cancel_order", skip_all, fields(order_id = %id))]
pub async fn cancel_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let id = parse_order_id(&id)?;
    let order = cancellation::cancel_order(state.store.as_ref(), &caller, id).await?;

    let payment = match cancellation::settle_payment(state.gateway.as_ref(), &order).await {
        Ok(payment) => payment,
        Err(e) => {
            tracing::error!(error = %e, "order cancelled but payment settlement failed");
            return Err(e.into());
        }
    };
    Ok(Json(CancelResponse { order, payment }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
}

#[tracing::instrument(name = "http_update_status", skip_all, fields(order_id = %id))]
pub async fn update_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let id = parse_order_id(&id)?;
    let target = OrderStatus::try_from(request.status.as_str())?;
    let has_shipment = request.tracking_number.is_some() || request.carrier.is_some();
    let shipment = has_shipment.then(|| Shipment {
        tracking_number: request.tracking_number,
        carrier: request.carrier,
    });

    let order =
        order_lifecycle::update_status(state.store.as_ref(), &caller, id, target, shipment).await?;
    Ok(Json(order))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequestBody {
    /// Major units; omitted means the full order total.
    pub amount: Option<f64>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub refund_id: RefundId,
    pub amount: MoneyAmount,
    pub status: String,
    pub full: bool,
    pub order: Order,
}

#[tracing::instrument(name = "http_refund", skip_all, fields(order_id = %id))]
pub async fn refund_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(request): Json<RefundRequestBody>,
) -> Result<Json<RefundResponse>, ApiError> {
    let id = parse_order_id(&id)?;
    let command = RefundOrder {
        amount: request
            .amount
            .map(|amount| MoneyAmount::from_major(amount, state.currency))
            .transpose()?,
        reason: request
            .reason
            .as_deref()
            .map(RefundReason::try_from)
            .transpose()?,
    };

    let outcome = cancellation::refund_order(
        state.store.as_ref(),
        state.gateway.as_ref(),
        &caller,
        id,
        &command,
    )
    .await?;
    Ok(Json(RefundResponse {
        refund_id: outcome.refund.id,
        amount: outcome.refund.amount,
        status: outcome.refund.status,
        full: outcome.full,
        order: outcome.order,
    }))
}
