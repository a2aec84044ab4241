use {
    super::audit::NewAuditEntry,
    super::error::OrderError,
    super::gateway::{BoxFuture, WebhookEvent},
    super::id::{OrderId, ProductId, UserId},
    super::order::Order,
    super::product::{Product, ReservedStock},
};

/// Entry point to persistent storage. Every mutation runs inside a
/// [`UnitOfWork`].
pub trait OrderStore: Send + Sync {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn UnitOfWork>, OrderError>>;
}

/// One atomic scope. Nothing is visible to others until `commit`; dropping
/// the unit without committing discards every change made through it.
pub trait UnitOfWork: Send {
    /// Decrement stock and increment sales by `quantity`, or fail with
    /// `NotFound` / `InsufficientStock` leaving the product untouched.
    fn reserve(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> BoxFuture<'_, Result<ReservedStock, OrderError>>;

    /// Inverse of `reserve`.
    fn release(&mut self, product_id: ProductId, quantity: u32)
    -> BoxFuture<'_, Result<(), OrderError>>;

    fn product(&mut self, id: ProductId) -> BoxFuture<'_, Result<Option<Product>, OrderError>>;

    fn insert_order<'a>(&'a mut self, order: &'a Order) -> BoxFuture<'a, Result<(), OrderError>>;

    fn order(&mut self, id: OrderId) -> BoxFuture<'_, Result<Option<Order>, OrderError>>;

    /// Load an order and hold it against concurrent writers until commit.
    fn lock_order(&mut self, id: OrderId) -> BoxFuture<'_, Result<Option<Order>, OrderError>>;

    fn orders_for_user(&mut self, user: UserId) -> BoxFuture<'_, Result<Vec<Order>, OrderError>>;

    /// Persist status, payment id, tracking and timestamps. Items and total
    /// are immutable after insert.
    fn save_order<'a>(&'a mut self, order: &'a Order) -> BoxFuture<'a, Result<(), OrderError>>;

    /// Remember a webhook event. Returns `false` when it was seen before.
    fn record_event<'a>(
        &'a mut self,
        event: &'a WebhookEvent,
    ) -> BoxFuture<'a, Result<bool, OrderError>>;

    fn append_audit<'a>(
        &'a mut self,
        entry: &'a NewAuditEntry,
    ) -> BoxFuture<'a, Result<(), OrderError>>;

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), OrderError>>;
}
