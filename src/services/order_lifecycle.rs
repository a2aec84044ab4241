use {
    super::retry::retry_on_abort,
    crate::domain::{
        caller::Caller,
        error::OrderError,
        id::OrderId,
        order::{Order, OrderStatus, Shipment, Transition},
        store::OrderStore,
    },
    chrono::Utc,
};

/// Orders are only visible to their owner and to admins; to anyone else
/// they do not exist.
pub async fn get_order(
    store: &dyn OrderStore,
    caller: &Caller,
    id: OrderId,
) -> Result<Order, OrderError> {
    let mut uow = store.begin().await?;
    let found = uow.order(id).await?;
    match found {
        Some(order) if caller.can_access(&order) => Ok(order),
        _ => Err(OrderError::NotFound(format!("order {id}"))),
    }
}

pub async fn list_orders(
    store: &dyn OrderStore,
    caller: &Caller,
) -> Result<Vec<Order>, OrderError> {
    let mut uow = store.begin().await?;
    let orders = uow.orders_for_user(caller.user_id).await?;
    Ok(orders)
}

/// Admin fulfilment: `shipped` or `delivered` only. Cancelling goes through
/// `cancel_order`, which also settles the payment.
#[tracing::instrument(name = "update_status", skip_all, fields(order_id = %id, target = %target))]
pub async fn update_status(
    store: &dyn OrderStore,
    caller: &Caller,
    id: OrderId,
    target: OrderStatus,
    shipment: Option<Shipment>,
) -> Result<Order, OrderError> {
    if !caller.is_admin() {
        return Err(OrderError::Forbidden("order status is managed by admins".into()));
    }

    retry_on_abort("update_status", || {
        try_update_status(store, caller, id, target, shipment.clone())
    })
    .await
}

async fn try_update_status(
    store: &dyn OrderStore,
    caller: &Caller,
    id: OrderId,
    target: OrderStatus,
    shipment: Option<Shipment>,
) -> Result<Order, OrderError> {
    let mut uow = store.begin().await?;
    let mut order = uow
        .lock_order(id)
        .await?
        .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;

    let from = order.status();
    let has_shipment = shipment.is_some();
    let transition = order.update_status(target, shipment, Utc::now())?;

    if transition == Transition::Unchanged && !has_shipment {
        tracing::debug!(status = %from, "status already applied");
        return Ok(order);
    }

    uow.save_order(&order).await?;
    let audit = order.audit_entry(
        &caller.actor(),
        "status_changed",
        serde_json::json!({
            "old_status": from.as_str(),
            "new_status": order.status().as_str(),
            "tracking_number": order.tracking_number(),
            "carrier": order.carrier(),
        }),
    );
    uow.append_audit(&audit).await?;
    uow.commit().await?;

    tracing::info!(from = %from, to = %order.status(), "order status updated");
    Ok(order)
}
