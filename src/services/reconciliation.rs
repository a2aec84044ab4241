use {
    super::retry::retry_on_abort,
    crate::domain::{
        audit::NewAuditEntry,
        error::OrderError,
        gateway::{IntentEvent, WebhookEvent, WebhookEventKind},
        id::OrderId,
        order::Transition,
        store::{OrderStore, UnitOfWork},
    },
    chrono::Utc,
    uuid::Uuid,
};

const ACTOR: &str = "webhook:stripe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileResult {
    /// Order moved to `processing`.
    Applied(OrderId),
    /// Order was already past `pending`; nothing to do.
    Unchanged(OrderId),
    /// This event id was processed before.
    Duplicate,
    /// Event recorded for the audit trail only.
    Observed,
    /// Event type we do not act on.
    Ignored,
    OrderNotFound,
    /// The event contradicts local state; logged, state untouched.
    Anomaly(OrderId),
}

impl ReconcileResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Unchanged(_) => "unchanged",
            Self::Duplicate => "duplicate",
            Self::Observed => "observed",
            Self::Ignored => "ignored",
            Self::OrderNotFound => "order_not_found",
            Self::Anomaly(_) => "anomaly",
        }
    }
}

/// Apply a verified webhook event to local order state, exactly once per
/// event id. Safe under duplicate and out-of-order delivery.
#[tracing::instrument(
    name = "reconcile",
    skip_all,
    fields(event_id = %event.id, event_type = %event.event_type)
)]
pub async fn apply_event(
    store: &dyn OrderStore,
    event: &WebhookEvent,
) -> Result<ReconcileResult, OrderError> {
    let result = retry_on_abort("reconcile", || try_apply_event(store, event)).await?;
    tracing::info!(result = result.as_str(), "webhook event reconciled");
    Ok(result)
}

async fn try_apply_event(
    store: &dyn OrderStore,
    event: &WebhookEvent,
) -> Result<ReconcileResult, OrderError> {
    let mut uow = store.begin().await?;

    if !uow.record_event(event).await? {
        return Ok(ReconcileResult::Duplicate);
    }

    let result = match &event.kind {
        WebhookEventKind::PaymentSucceeded(intent) => {
            apply_payment_succeeded(uow.as_mut(), event, intent).await?
        }
        WebhookEventKind::PaymentFailed(intent) | WebhookEventKind::PaymentCanceled(intent) => {
            // Left for the customer to retry or an admin to resolve.
            tracing::info!(
                intent_id = %intent.intent_id,
                order_id = ?intent.order_id,
                "payment did not go through"
            );
            let entry = event_audit(
                event,
                intent.order_id,
                "payment_not_completed",
                serde_json::json!({
                    "event_type": event.event_type,
                    "amount": intent.amount,
                }),
            );
            uow.append_audit(&entry).await?;
            ReconcileResult::Observed
        }
        WebhookEventKind::ChargeRefunded {
            intent_id,
            amount_refunded,
        } => {
            tracing::info!(intent_id = ?intent_id, amount_refunded, "charge refunded");
            let entry = event_audit(
                event,
                None,
                "charge_refunded",
                serde_json::json!({
                    "event_type": event.event_type,
                    "amount_refunded": amount_refunded,
                }),
            );
            uow.append_audit(&entry).await?;
            ReconcileResult::Observed
        }
        WebhookEventKind::Other => {
            tracing::debug!("event type not handled");
            ReconcileResult::Ignored
        }
    };

    uow.commit().await?;
    Ok(result)
}

async fn apply_payment_succeeded(
    uow: &mut dyn UnitOfWork,
    event: &WebhookEvent,
    intent: &IntentEvent,
) -> Result<ReconcileResult, OrderError> {
    let Some(order_id) = intent.order_id else {
        tracing::warn!(intent_id = %intent.intent_id, "succeeded intent carries no orderId");
        return Ok(ReconcileResult::OrderNotFound);
    };
    let Some(mut order) = uow.lock_order(order_id).await? else {
        tracing::warn!(order_id = %order_id, "succeeded intent references unknown order");
        return Ok(ReconcileResult::OrderNotFound);
    };

    let foreign = order
        .payment_id()
        .filter(|recorded| **recorded != intent.intent_id)
        .cloned();
    if let Some(recorded) = foreign {
        let entry = event_audit(
            event,
            Some(order_id),
            "anomaly",
            serde_json::json!({
                "event_type": event.event_type,
                "recorded_intent": recorded.as_str(),
                "incoming_intent": intent.intent_id.as_str(),
            }),
        );
        uow.append_audit(&entry).await?;
        tracing::warn!(
            order_id = %order_id,
            recorded = %recorded,
            incoming = %intent.intent_id,
            "payment succeeded for an intent the order does not know"
        );
        return Ok(ReconcileResult::Anomaly(order_id));
    }

    let expected = order.total().amount().minor();
    if intent.amount != expected {
        let entry = event_audit(
            event,
            Some(order_id),
            "anomaly",
            serde_json::json!({
                "event_type": event.event_type,
                "expected_amount": expected,
                "incoming_amount": intent.amount,
            }),
        );
        uow.append_audit(&entry).await?;
        tracing::warn!(
            order_id = %order_id,
            expected,
            incoming = intent.amount,
            "payment succeeded for a different amount than the order total"
        );
        return Ok(ReconcileResult::Anomaly(order_id));
    }

    if order.payment_id().is_none() && order.ensure_payable().is_ok() {
        order.attach_payment(intent.intent_id.clone())?;
    }

    match order.mark_paid(Utc::now()) {
        Ok(Transition::Applied) => {
            uow.save_order(&order).await?;
            let entry = event_audit(
                event,
                Some(order_id),
                "paid",
                serde_json::json!({
                    "event_type": event.event_type,
                    "amount": intent.amount,
                    "old_status": "pending",
                    "new_status": order.status().as_str(),
                }),
            );
            uow.append_audit(&entry).await?;
            tracing::info!(order_id = %order_id, "order paid");
            Ok(ReconcileResult::Applied(order_id))
        }
        Ok(Transition::Unchanged) => Ok(ReconcileResult::Unchanged(order_id)),
        Err(OrderError::InvalidTransition { from, .. }) => {
            let entry = event_audit(
                event,
                Some(order_id),
                "anomaly",
                serde_json::json!({
                    "event_type": event.event_type,
                    "current_status": from.as_str(),
                    "incoming_status": "processing",
                }),
            );
            uow.append_audit(&entry).await?;
            tracing::warn!(
                order_id = %order_id,
                status = %from,
                "payment succeeded for an order that can no longer be paid"
            );
            Ok(ReconcileResult::Anomaly(order_id))
        }
        Err(e) => Err(e),
    }
}

fn event_audit(
    event: &WebhookEvent,
    order_id: Option<OrderId>,
    action: &str,
    detail: serde_json::Value,
) -> NewAuditEntry {
    NewAuditEntry {
        id: Uuid::now_v7(),
        entity_type: "order".to_string(),
        entity_id: order_id.map(|id| id.as_uuid()),
        external_id: event.intent_id().map(|id| id.as_str().to_string()),
        event_id: Some(event.id.as_str().to_string()),
        action: action.to_string(),
        actor: ACTOR.to_string(),
        detail,
    }
}
