use {
    super::{audit_repo, event_repo, inventory_repo, order_repo},
    crate::domain::{
        audit::NewAuditEntry,
        error::OrderError,
        gateway::{BoxFuture, WebhookEvent},
        id::{OrderId, ProductId, UserId},
        order::Order,
        product::{Product, ReservedStock},
        store::{OrderStore, UnitOfWork},
    },
    sqlx::PgPool,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert a catalog row. Used for seeding and by tests.
    pub async fn seed_product(&self, product: &Product) -> Result<(), OrderError> {
        let mut tx = self.pool.begin().await?;
        inventory_repo::insert_product(&mut tx, product).await?;
        tx.commit().await?;
        Ok(())
    }
}

impl OrderStore for PgStore {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn UnitOfWork>, OrderError>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;
            // Fail fast instead of queueing behind a long-held row lock; the
            // abort is retried by the caller.
            sqlx::query("SET LOCAL lock_timeout = '5s'")
                .execute(&mut *tx)
                .await?;
            Ok(Box::new(PgUnitOfWork { tx }) as Box<dyn UnitOfWork>)
        })
    }
}

struct PgUnitOfWork {
    tx: sqlx::Transaction<'static, sqlx::Postgres>,
}

impl UnitOfWork for PgUnitOfWork {
    fn reserve(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> BoxFuture<'_, Result<ReservedStock, OrderError>> {
        Box::pin(inventory_repo::reserve(&mut self.tx, product_id, quantity))
    }

    fn release(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> BoxFuture<'_, Result<(), OrderError>> {
        Box::pin(inventory_repo::release(&mut self.tx, product_id, quantity))
    }

    fn product(&mut self, id: ProductId) -> BoxFuture<'_, Result<Option<Product>, OrderError>> {
        Box::pin(inventory_repo::find_product(&mut self.tx, id))
    }

    fn insert_order<'a>(&'a mut self, order: &'a Order) -> BoxFuture<'a, Result<(), OrderError>> {
        Box::pin(order_repo::insert_order(&mut self.tx, order))
    }

    fn order(&mut self, id: OrderId) -> BoxFuture<'_, Result<Option<Order>, OrderError>> {
        Box::pin(order_repo::find_order(&mut self.tx, id, false))
    }

    fn lock_order(&mut self, id: OrderId) -> BoxFuture<'_, Result<Option<Order>, OrderError>> {
        Box::pin(order_repo::find_order(&mut self.tx, id, true))
    }

    fn orders_for_user(&mut self, user: UserId) -> BoxFuture<'_, Result<Vec<Order>, OrderError>> {
        Box::pin(order_repo::orders_for_user(&mut self.tx, user))
    }

    fn save_order<'a>(&'a mut self, order: &'a Order) -> BoxFuture<'a, Result<(), OrderError>> {
        Box::pin(order_repo::update_order(&mut self.tx, order))
    }

    fn record_event<'a>(
        &'a mut self,
        event: &'a WebhookEvent,
    ) -> BoxFuture<'a, Result<bool, OrderError>> {
        Box::pin(event_repo::record_event(&mut self.tx, event))
    }

    fn append_audit<'a>(
        &'a mut self,
        entry: &'a NewAuditEntry,
    ) -> BoxFuture<'a, Result<(), OrderError>> {
        Box::pin(audit_repo::insert_audit_entry(&mut self.tx, entry))
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), OrderError>> {
        Box::pin(async move {
            self.tx.commit().await?;
            Ok(())
        })
    }
}
