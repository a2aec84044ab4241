use {
    super::error::OrderError,
    super::id::ProductId,
    super::money::MoneyAmount,
    serde::{Deserialize, Serialize},
};

/// The slice of a catalog product the inventory ledger cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: MoneyAmount,
    pub stock: i64,
    pub sales: i64,
}

impl Product {
    /// Take `quantity` units out of stock and count them as sold.
    pub fn reserve(&mut self, quantity: u32) -> Result<(), OrderError> {
        let quantity = i64::from(quantity);
        if quantity > self.stock {
            return Err(self.insufficient(quantity));
        }
        self.stock -= quantity;
        self.sales += quantity;
        Ok(())
    }

    /// Exact inverse of [`Product::reserve`].
    pub fn release(&mut self, quantity: u32) {
        let quantity = i64::from(quantity);
        self.stock += quantity;
        self.sales -= quantity;
    }

    pub fn insufficient(&self, requested: i64) -> OrderError {
        OrderError::InsufficientStock {
            product_id: self.id,
            name: self.name.clone(),
            requested: u32::try_from(requested).unwrap_or(u32::MAX),
            available: self.stock,
        }
    }
}

/// What a successful reservation reports back to the placement transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedStock {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: MoneyAmount,
    pub remaining: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chair(stock: i64) -> Product {
        Product {
            id: ProductId::generate(),
            name: "Oak chair".into(),
            price: MoneyAmount::new(100).unwrap(),
            stock,
            sales: 0,
        }
    }

    #[test]
    fn reserve_moves_units_from_stock_to_sales() {
        let mut p = chair(5);
        p.reserve(3).unwrap();
        assert_eq!((p.stock, p.sales), (2, 3));
    }

    #[test]
    fn reserve_rejects_more_than_available_and_reports_it() {
        let mut p = chair(2);
        match p.reserve(3) {
            Err(OrderError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!((p.stock, p.sales), (2, 0));
    }

    #[test]
    fn reserve_can_drain_to_zero() {
        let mut p = chair(3);
        p.reserve(3).unwrap();
        assert_eq!(p.stock, 0);
    }

    #[test]
    fn release_undoes_reserve() {
        let mut p = chair(5);
        let before = p.clone();
        p.reserve(4).unwrap();
        p.release(4);
        assert_eq!(p, before);
    }
}
