use {
    super::inventory::{OrderLine, reserve_lines},
    super::retry::retry_on_abort,
    crate::domain::{
        caller::Caller,
        error::OrderError,
        money::Currency,
        order::{Order, OrderItem, ShippingAddress},
        store::OrderStore,
    },
    chrono::Utc,
};

#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
}

impl PlaceOrder {
    /// Structural checks that need no storage.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::InvalidInput("order has no items".into()));
        }
        if let Some(line) = self.items.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidInput(format!(
                "quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        self.shipping_address.validate()
    }
}

/// Reserve stock for every line and persist a `pending` order, all in one
/// unit of work. On any error nothing is left behind.
#[tracing::instrument(
    name = "place_order",
    skip_all,
    fields(user_id = %caller.user_id, order_id = tracing::field::Empty)
)]
pub async fn place_order(
    store: &dyn OrderStore,
    caller: &Caller,
    request: &PlaceOrder,
    currency: Currency,
) -> Result<Order, OrderError> {
    request.validate()?;

    let order = retry_on_abort("place_order", || {
        try_place_order(store, caller, request, currency)
    })
    .await?;

    tracing::Span::current().record("order_id", tracing::field::display(order.id()));
    tracing::info!(
        total = %order.total().amount(),
        items = order.items().len(),
        "order placed"
    );
    Ok(order)
}

async fn try_place_order(
    store: &dyn OrderStore,
    caller: &Caller,
    request: &PlaceOrder,
    currency: Currency,
) -> Result<Order, OrderError> {
    let mut uow = store.begin().await?;

    let reserved = reserve_lines(uow.as_mut(), &request.items).await?;

    let mut items = Vec::with_capacity(reserved.len());
    for (line, stock) in request.items.iter().zip(reserved) {
        if line.unit_price != stock.unit_price {
            return Err(OrderError::InvalidInput(format!(
                "price of {} changed: submitted {}, current {}",
                stock.name, line.unit_price, stock.unit_price
            )));
        }
        items.push(OrderItem {
            product_id: stock.product_id,
            name: stock.name,
            quantity: line.quantity,
            unit_price: stock.unit_price,
        });
    }

    let order = Order::place(
        caller.user_id,
        items,
        request.shipping_address.clone(),
        currency,
        Utc::now(),
    )?;
    uow.insert_order(&order).await?;

    let audit = order.audit_entry(
        &caller.actor(),
        "created",
        serde_json::json!({
            "total": order.total().amount().minor(),
            "currency": order.total().currency().as_str(),
            "items": order.items().len(),
        }),
    );
    uow.append_audit(&audit).await?;
    uow.commit().await?;
    Ok(order)
}
