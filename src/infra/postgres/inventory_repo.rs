use {
    crate::domain::{
        error::OrderError,
        id::ProductId,
        money::MoneyAmount,
        product::{Product, ReservedStock},
    },
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: i64,
    stock: i64,
    sales: i64,
}

impl TryFrom<ProductRow> for Product {
    type Error = OrderError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            price: MoneyAmount::new(row.price)?,
            stock: row.stock,
            sales: row.sales,
        })
    }
}

pub async fn find_product(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: ProductId,
) -> Result<Option<Product>, OrderError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, price, stock, sales FROM products WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await?;

    row.map(Product::try_from).transpose()
}

/// Conditional decrement: the row only changes when enough stock is left,
/// so concurrent reservations can never drive it negative.
pub async fn reserve(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product_id: ProductId,
    quantity: u32,
) -> Result<ReservedStock, OrderError> {
    let quantity = i64::from(quantity);
    let row: Option<(String, i64, i64)> = sqlx::query_as(
        r#"
        UPDATE products
        SET stock = stock - $2, sales = sales + $2, updated_at = now()
        WHERE id = $1 AND stock >= $2
        RETURNING name, price, stock
        "#,
    )
    .bind(product_id.as_uuid())
    .bind(quantity)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some((name, price, remaining)) => Ok(ReservedStock {
            product_id,
            name,
            unit_price: MoneyAmount::new(price)?,
            remaining,
        }),
        None => {
            let product = find_product(tx, product_id)
                .await?
                .ok_or_else(|| OrderError::NotFound(format!("product {product_id}")))?;
            Err(product.insufficient(quantity))
        }
    }
}

pub async fn release(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product_id: ProductId,
    quantity: u32,
) -> Result<(), OrderError> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + $2, sales = sales - $2, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(product_id.as_uuid())
    .bind(i64::from(quantity))
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(OrderError::NotFound(format!("product {product_id}")));
    }
    Ok(())
}

/// Catalog writes live elsewhere; this exists for seeding.
pub async fn insert_product(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product: &Product,
) -> Result<(), OrderError> {
    sqlx::query(
        r#"
        INSERT INTO products (id, name, price, stock, sales)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE
        SET name = EXCLUDED.name, price = EXCLUDED.price,
            stock = EXCLUDED.stock, sales = EXCLUDED.sales, updated_at = now()
        "#,
    )
    .bind(product.id.as_uuid())
    .bind(&product.name)
    .bind(product.price.minor())
    .bind(product.stock)
    .bind(product.sales)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
