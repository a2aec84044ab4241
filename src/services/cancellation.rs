use {
    super::inventory::release_lines,
    super::retry::retry_on_abort,
    crate::domain::{
        caller::Caller,
        error::OrderError,
        gateway::{IntentStatus, PaymentGateway, Refund, RefundReason, RefundRequest},
        id::{IntentId, OrderId, RefundId},
        money::MoneyAmount,
        order::Order,
        store::{OrderStore, UnitOfWork},
    },
    chrono::Utc,
    serde::Serialize,
};

/// What happened on the processor side after a self-cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PaymentSettlement {
    /// No intent was ever opened.
    NoPayment,
    IntentCanceled { intent_id: IntentId },
    AlreadyCanceled { intent_id: IntentId },
    Refunded { intent_id: IntentId, refund_id: RefundId },
}

/// Cancel a `pending` or `processing` order and return its stock.
/// Does not touch the payment gateway.
#[tracing::instrument(name = "cancel_order", skip_all, fields(order_id = %id))]
pub async fn cancel_order(
    store: &dyn OrderStore,
    caller: &Caller,
    id: OrderId,
) -> Result<Order, OrderError> {
    let order = retry_on_abort("cancel_order", || try_cancel_order(store, caller, id)).await?;
    tracing::info!(items = order.items().len(), "order cancelled, stock released");
    Ok(order)
}

async fn try_cancel_order(
    store: &dyn OrderStore,
    caller: &Caller,
    id: OrderId,
) -> Result<Order, OrderError> {
    let mut uow = store.begin().await?;
    let mut order = uow
        .lock_order(id)
        .await?
        .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;

    if !caller.can_access(&order) {
        return Err(OrderError::Forbidden(format!(
            "order {id} belongs to another user"
        )));
    }

    let from = order.status();
    apply_cancellation(uow.as_mut(), &mut order).await?;

    let audit = order.audit_entry(
        &caller.actor(),
        "cancelled",
        serde_json::json!({ "old_status": from.as_str() }),
    );
    uow.append_audit(&audit).await?;
    uow.commit().await?;
    Ok(order)
}

/// State transition plus stock release, inside the caller's unit of work.
async fn apply_cancellation(uow: &mut dyn UnitOfWork, order: &mut Order) -> Result<(), OrderError> {
    let released = order.cancel(Utc::now())?;
    release_lines(uow, &released).await?;
    uow.save_order(order).await
}

/// Settle the payment of a cancelled order: refund if the money was already
/// captured, otherwise cancel the intent.
#[tracing::instrument(name = "settle_payment", skip_all, fields(order_id = %order.id()))]
pub async fn settle_payment(
    gateway: &dyn PaymentGateway,
    order: &Order,
) -> Result<PaymentSettlement, OrderError> {
    let Some(intent_id) = order.payment_id() else {
        return Ok(PaymentSettlement::NoPayment);
    };

    let intent = gateway.retrieve_intent(intent_id).await?;
    let settlement = match intent.status {
        IntentStatus::Succeeded => {
            let request = RefundRequest {
                intent_id: intent_id.clone(),
                amount: None,
                reason: Some(RefundReason::RequestedByCustomer),
            };
            let refund = gateway.create_refund(&request).await?;
            PaymentSettlement::Refunded {
                intent_id: intent_id.clone(),
                refund_id: refund.id,
            }
        }
        IntentStatus::Canceled => PaymentSettlement::AlreadyCanceled {
            intent_id: intent_id.clone(),
        },
        _ => {
            gateway.cancel_intent(intent_id).await?;
            PaymentSettlement::IntentCanceled {
                intent_id: intent_id.clone(),
            }
        }
    };

    tracing::info!(intent_id = %intent_id, ?settlement, "payment settled");
    Ok(settlement)
}

#[derive(Debug, Clone)]
pub struct RefundOrder {
    /// `None` refunds the full order total.
    pub amount: Option<MoneyAmount>,
    pub reason: Option<RefundReason>,
}

#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund: Refund,
    pub full: bool,
    pub order: Order,
}

/// Admin refund through the gateway. A full refund of an order that can
/// still be cancelled cancels it and returns its stock; partial refunds and
/// refunds of shipped goods leave the status alone.
#[tracing::instrument(name = "refund_order", skip_all, fields(order_id = %id))]
pub async fn refund_order(
    store: &dyn OrderStore,
    gateway: &dyn PaymentGateway,
    caller: &Caller,
    id: OrderId,
    request: &RefundOrder,
) -> Result<RefundOutcome, OrderError> {
    if !caller.is_admin() {
        return Err(OrderError::Forbidden("refunds are issued by admins".into()));
    }

    let order = {
        let mut uow = store.begin().await?;
        let found = uow.order(id).await?;
        found.ok_or_else(|| OrderError::NotFound(format!("order {id}")))?
    };
    let intent_id = order
        .payment_id()
        .cloned()
        .ok_or_else(|| OrderError::NoPayment(id.to_string()))?;

    let total = order.total().amount();
    let full = match request.amount {
        Some(amount) if amount == MoneyAmount::ZERO => {
            return Err(OrderError::InvalidInput("refund amount must be positive".into()));
        }
        Some(amount) if amount > total => {
            return Err(OrderError::InvalidInput(format!(
                "refund amount {amount} exceeds order total {total}"
            )));
        }
        Some(amount) => amount == total,
        None => true,
    };

    let refund = gateway
        .create_refund(&RefundRequest {
            intent_id: intent_id.clone(),
            amount: request.amount,
            reason: request.reason,
        })
        .await?;
    tracing::info!(refund_id = %refund.id, amount = %refund.amount, full, "refund created");

    let recorded = retry_on_abort("record_refund", || {
        record_refund(store, caller, id, &refund, full)
    })
    .await;

    match recorded {
        Ok(order) => Ok(RefundOutcome {
            refund,
            full,
            order,
        }),
        Err(e) => {
            tracing::error!(
                refund_id = %refund.id,
                intent_id = %intent_id,
                error = %e,
                "refund created at processor but not recorded locally"
            );
            Err(e)
        }
    }
}

async fn record_refund(
    store: &dyn OrderStore,
    caller: &Caller,
    id: OrderId,
    refund: &Refund,
    full: bool,
) -> Result<Order, OrderError> {
    let mut uow = store.begin().await?;
    let mut order = uow
        .lock_order(id)
        .await?
        .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;

    let from = order.status();
    let cancelled = full && from.is_cancellable();
    if cancelled {
        apply_cancellation(uow.as_mut(), &mut order).await?;
    }

    let audit = order.audit_entry(
        &caller.actor(),
        "refunded",
        serde_json::json!({
            "refund_id": refund.id.as_str(),
            "amount": refund.amount.minor(),
            "refund_status": refund.status,
            "full": full,
            "old_status": from.as_str(),
            "new_status": order.status().as_str(),
        }),
    );
    uow.append_audit(&audit).await?;
    uow.commit().await?;
    Ok(order)
}
