use {
    crate::domain::{
        error::OrderError,
        id::{IntentId, OrderId, ProductId, UserId},
        money::{Currency, Money, MoneyAmount},
        order::{Order, OrderItem, OrderParts, OrderStatus, ShippingAddress},
    },
    chrono::{DateTime, Utc},
    uuid::Uuid,
};

const ORDER_COLUMNS: &str = "id, user_id, total_amount, currency, street, city, postal_code, \
     country, payment_id, status, tracking_number, carrier, created_at, paid_at, shipped_at, \
     delivered_at, cancelled_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_amount: i64,
    currency: String,
    street: String,
    city: String,
    postal_code: String,
    country: String,
    payment_id: Option<String>,
    status: String,
    tracking_number: Option<String>,
    carrier: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    product_id: Uuid,
    name: String,
    quantity: i64,
    unit_price: i64,
}

fn into_order(row: OrderRow, items: Vec<ItemRow>) -> Result<Order, OrderError> {
    let items = items
        .into_iter()
        .map(|item| {
            let quantity = u32::try_from(item.quantity).map_err(|_| {
                OrderError::InvalidInput(format!("stored quantity out of range: {}", item.quantity))
            })?;
            Ok(OrderItem {
                product_id: ProductId::from_uuid(item.product_id),
                name: item.name,
                quantity,
                unit_price: MoneyAmount::new(item.unit_price)?,
            })
        })
        .collect::<Result<Vec<_>, OrderError>>()?;

    Ok(Order::from_parts(OrderParts {
        id: OrderId::from_uuid(row.id),
        user_id: UserId::from_uuid(row.user_id),
        items,
        total: Money::new(
            MoneyAmount::new(row.total_amount)?,
            Currency::try_from(row.currency.as_str())?,
        ),
        shipping_address: ShippingAddress {
            street: row.street,
            city: row.city,
            postal_code: row.postal_code,
            country: row.country,
        },
        payment_id: row.payment_id.map(IntentId::new).transpose()?,
        status: OrderStatus::try_from(row.status.as_str())?,
        tracking_number: row.tracking_number,
        carrier: row.carrier,
        created_at: row.created_at,
        paid_at: row.paid_at,
        shipped_at: row.shipped_at,
        delivered_at: row.delivered_at,
        cancelled_at: row.cancelled_at,
    }))
}

fn unique_violation(err: sqlx::Error, what: String) -> OrderError {
    let unique = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
    if unique {
        OrderError::AlreadyExists(what)
    } else {
        OrderError::from(err)
    }
}

pub async fn insert_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order: &Order,
) -> Result<(), OrderError> {
    let address = order.shipping_address();
    sqlx::query(
        r#"
        INSERT INTO orders
            (id, user_id, total_amount, currency, street, city, postal_code, country,
             payment_id, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(order.id().as_uuid())
    .bind(order.user_id().as_uuid())
    .bind(order.total().amount().minor())
    .bind(order.total().currency().as_str())
    .bind(&address.street)
    .bind(&address.city)
    .bind(&address.postal_code)
    .bind(&address.country)
    .bind(order.payment_id().map(|id| id.as_str()))
    .bind(order.status().as_str())
    .bind(order.created_at())
    .execute(&mut **tx)
    .await
    .map_err(|e| unique_violation(e, format!("order {}", order.id())))?;

    for (position, item) in order.items().iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| OrderError::InvalidInput("too many order items".into()))?;
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, position, product_id, name, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(position)
        .bind(item.product_id.as_uuid())
        .bind(&item.name)
        .bind(i64::from(item.quantity))
        .bind(item.unit_price.minor())
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn load_items(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: Uuid,
) -> Result<Vec<ItemRow>, OrderError> {
    let items = sqlx::query_as::<_, ItemRow>(
        "SELECT product_id, name, quantity, unit_price FROM order_items WHERE order_id = $1 ORDER BY position",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(items)
}

/// Load one order. With `for_update` the row stays locked until the
/// transaction ends.
pub async fn find_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: OrderId,
    for_update: bool,
) -> Result<Option<Order>, OrderError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{lock}");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

    match row {
        Some(row) => {
            let items = load_items(tx, row.id).await?;
            into_order(row, items).map(Some)
        }
        None => Ok(None),
    }
}

pub async fn orders_for_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user: UserId,
) -> Result<Vec<Order>, OrderError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC");
    let rows = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(user.as_uuid())
        .fetch_all(&mut **tx)
        .await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = load_items(tx, row.id).await?;
        orders.push(into_order(row, items)?);
    }
    Ok(orders)
}

/// Write back the mutable part of an order. Timestamps use COALESCE so a
/// value, once set, is never overwritten.
pub async fn update_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order: &Order,
) -> Result<(), OrderError> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET payment_id = COALESCE(payment_id, $2),
            status = $3,
            tracking_number = $4,
            carrier = $5,
            paid_at = COALESCE(paid_at, $6),
            shipped_at = COALESCE(shipped_at, $7),
            delivered_at = COALESCE(delivered_at, $8),
            cancelled_at = COALESCE(cancelled_at, $9),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(order.id().as_uuid())
    .bind(order.payment_id().map(|id| id.as_str()))
    .bind(order.status().as_str())
    .bind(order.tracking_number())
    .bind(order.carrier())
    .bind(order.paid_at())
    .bind(order.shipped_at())
    .bind(order.delivered_at())
    .bind(order.cancelled_at())
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        let what = match order.payment_id() {
            Some(id) => format!("payment intent {id} belongs to another order"),
            None => format!("order {}", order.id()),
        };
        unique_violation(e, what)
    })?;

    if result.rows_affected() == 0 {
        return Err(OrderError::NotFound(format!("order {}", order.id())));
    }
    Ok(())
}
