use {
    crate::domain::{
        error::OrderError, id::ProductId, money::MoneyAmount, product::ReservedStock,
        store::UnitOfWork,
    },
};

/// One requested line of an order, as submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: MoneyAmount,
}

/// Reserve every line in submission order. The first failure is returned
/// as is; the caller drops the unit of work so earlier reservations vanish
/// with it.
pub async fn reserve_lines(
    uow: &mut dyn UnitOfWork,
    lines: &[OrderLine],
) -> Result<Vec<ReservedStock>, OrderError> {
    let mut reserved = Vec::with_capacity(lines.len());
    for line in lines {
        let stock = uow.reserve(line.product_id, line.quantity).await?;
        tracing::debug!(
            product_id = %line.product_id,
            quantity = line.quantity,
            remaining = stock.remaining,
            "stock reserved"
        );
        reserved.push(stock);
    }
    Ok(reserved)
}

/// Give stock back for a cancelled order.
pub async fn release_lines(
    uow: &mut dyn UnitOfWork,
    lines: &[(ProductId, u32)],
) -> Result<(), OrderError> {
    for (product_id, quantity) in lines {
        uow.release(*product_id, *quantity).await?;
        tracing::debug!(product_id = %product_id, quantity, "stock released");
    }
    Ok(())
}
