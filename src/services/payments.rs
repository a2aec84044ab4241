use {
    super::retry::retry_on_abort,
    crate::domain::{
        caller::Caller,
        error::OrderError,
        gateway::{IntentRequest, PaymentGateway, PaymentIntent},
        id::{IntentId, OrderId},
        store::OrderStore,
    },
};

/// Open the single payment intent an order may ever have.
///
/// The processor call happens outside any storage transaction. If another
/// request attached an intent in the meantime, ours is cancelled again and
/// the caller sees `AlreadyExists`.
#[tracing::instrument(
    name = "create_intent",
    skip_all,
    fields(order_id = %order_id, intent_id = tracing::field::Empty)
)]
pub async fn create_payment_intent(
    store: &dyn OrderStore,
    gateway: &dyn PaymentGateway,
    caller: &Caller,
    order_id: OrderId,
) -> Result<PaymentIntent, OrderError> {
    let mut uow = store.begin().await?;
    let order = uow.order(order_id).await?;
    drop(uow);

    let order = match order {
        Some(order) if order.is_owned_by(caller.user_id) => order,
        Some(_) => {
            return Err(OrderError::Forbidden(format!(
                "order {order_id} belongs to another user"
            )));
        }
        None => return Err(OrderError::NotFound(format!("order {order_id}"))),
    };
    order.ensure_payable()?;

    let request = IntentRequest {
        order_id,
        money: order.total(),
        customer_email: caller.email.clone(),
        customer_name: caller.name.clone(),
    };
    let intent = gateway.create_intent(&request).await?;
    tracing::Span::current().record("intent_id", tracing::field::display(&intent.id));

    let attached = retry_on_abort("attach_intent", || {
        attach_intent(store, caller, order_id, &intent.id)
    })
    .await;

    if let Err(e) = attached {
        tracing::warn!(error = %e, "could not attach intent, cancelling it");
        if let Err(cancel_err) = gateway.cancel_intent(&intent.id).await {
            tracing::error!(error = %cancel_err, "orphaned payment intent could not be cancelled");
        }
        return Err(e);
    }

    tracing::info!(amount = %intent.money.amount(), "payment intent created");
    Ok(intent)
}

async fn attach_intent(
    store: &dyn OrderStore,
    caller: &Caller,
    order_id: OrderId,
    intent_id: &IntentId,
) -> Result<(), OrderError> {
    let mut uow = store.begin().await?;
    let mut order = uow
        .lock_order(order_id)
        .await?
        .ok_or_else(|| OrderError::NotFound(format!("order {order_id}")))?;

    order.attach_payment(intent_id.clone())?;
    uow.save_order(&order).await?;

    let audit = order.audit_entry(
        &caller.actor(),
        "payment_intent_created",
        serde_json::json!({
            "amount": order.total().amount().minor(),
            "currency": order.total().currency().as_str(),
        }),
    );
    uow.append_audit(&audit).await?;
    uow.commit().await
}

/// Live status from the processor. Callers see only intents of orders they
/// can access.
pub async fn payment_status(
    store: &dyn OrderStore,
    gateway: &dyn PaymentGateway,
    caller: &Caller,
    intent_id: &IntentId,
) -> Result<PaymentIntent, OrderError> {
    let intent = gateway.retrieve_intent(intent_id).await?;

    let visible = match intent.order_id {
        Some(order_id) => {
            let mut uow = store.begin().await?;
            let order = uow.order(order_id).await?;
            order.is_some_and(|order| caller.can_access(&order))
        }
        None => caller.is_admin(),
    };
    if !visible {
        return Err(OrderError::NotFound(format!("payment intent {intent_id}")));
    }
    Ok(intent)
}
