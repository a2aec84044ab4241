use {
    crate::domain::{
        audit::NewAuditEntry,
        error::OrderError,
        gateway::{BoxFuture, WebhookEvent},
        id::{OrderId, ProductId, UserId},
        order::Order,
        product::{Product, ReservedStock},
        store::{OrderStore, UnitOfWork},
    },
    std::{
        collections::{HashMap, HashSet},
        sync::Arc,
    },
    tokio::sync::{Mutex, OwnedMutexGuard},
};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    events: HashSet<String>,
    audit: Vec<NewAuditEntry>,
}

/// In-process store. Units of work are fully serialized: `begin` takes the
/// lock and a private copy, `commit` swaps the copy in.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    pub async fn order(&self, id: OrderId) -> Option<Order> {
        self.state.lock().await.orders.get(&id).cloned()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn audit_entries(&self) -> Vec<NewAuditEntry> {
        self.state.lock().await.audit.clone()
    }
}

impl OrderStore for MemoryStore {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn UnitOfWork>, OrderError>> {
        Box::pin(async move {
            let guard = self.state.clone().lock_owned().await;
            let working = MemoryState::clone(&guard);
            Ok(Box::new(MemoryUnitOfWork { guard, working }) as Box<dyn UnitOfWork>)
        })
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl UnitOfWork for MemoryUnitOfWork {
    fn reserve(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> BoxFuture<'_, Result<ReservedStock, OrderError>> {
        Box::pin(async move {
            let product = self
                .working
                .products
                .get_mut(&product_id)
                .ok_or_else(|| OrderError::NotFound(format!("product {product_id}")))?;
            product.reserve(quantity)?;
            Ok(ReservedStock {
                product_id,
                name: product.name.clone(),
                unit_price: product.price,
                remaining: product.stock,
            })
        })
    }

    fn release(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> BoxFuture<'_, Result<(), OrderError>> {
        Box::pin(async move {
            let product = self
                .working
                .products
                .get_mut(&product_id)
                .ok_or_else(|| OrderError::NotFound(format!("product {product_id}")))?;
            product.release(quantity);
            Ok(())
        })
    }

    fn product(&mut self, id: ProductId) -> BoxFuture<'_, Result<Option<Product>, OrderError>> {
        Box::pin(async move { Ok(self.working.products.get(&id).cloned()) })
    }

    fn insert_order<'a>(&'a mut self, order: &'a Order) -> BoxFuture<'a, Result<(), OrderError>> {
        Box::pin(async move {
            if self.working.orders.contains_key(&order.id()) {
                return Err(OrderError::AlreadyExists(format!("order {}", order.id())));
            }
            self.working.orders.insert(order.id(), order.clone());
            Ok(())
        })
    }

    fn order(&mut self, id: OrderId) -> BoxFuture<'_, Result<Option<Order>, OrderError>> {
        Box::pin(async move { Ok(self.working.orders.get(&id).cloned()) })
    }

    fn lock_order(&mut self, id: OrderId) -> BoxFuture<'_, Result<Option<Order>, OrderError>> {
        // The whole store is already held by this unit.
        self.order(id)
    }

    fn orders_for_user(&mut self, user: UserId) -> BoxFuture<'_, Result<Vec<Order>, OrderError>> {
        Box::pin(async move {
            let mut orders: Vec<Order> = self
                .working
                .orders
                .values()
                .filter(|o| o.is_owned_by(user))
                .cloned()
                .collect();
            orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
            Ok(orders)
        })
    }

    fn save_order<'a>(&'a mut self, order: &'a Order) -> BoxFuture<'a, Result<(), OrderError>> {
        Box::pin(async move {
            if let Some(payment_id) = order.payment_id() {
                let taken = self
                    .working
                    .orders
                    .values()
                    .any(|o| o.id() != order.id() && o.payment_id() == Some(payment_id));
                if taken {
                    return Err(OrderError::AlreadyExists(format!(
                        "payment intent {payment_id} belongs to another order"
                    )));
                }
            }
            match self.working.orders.get_mut(&order.id()) {
                Some(slot) => {
                    *slot = order.clone();
                    Ok(())
                }
                None => Err(OrderError::NotFound(format!("order {}", order.id()))),
            }
        })
    }

    fn record_event<'a>(
        &'a mut self,
        event: &'a WebhookEvent,
    ) -> BoxFuture<'a, Result<bool, OrderError>> {
        Box::pin(async move { Ok(self.working.events.insert(event.id.as_str().to_string())) })
    }

    fn append_audit<'a>(
        &'a mut self,
        entry: &'a NewAuditEntry,
    ) -> BoxFuture<'a, Result<(), OrderError>> {
        Box::pin(async move {
            self.working.audit.push(entry.clone());
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), OrderError>> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Box::pin(async { Ok(()) })
    }
}
