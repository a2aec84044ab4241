use {
    super::audit::NewAuditEntry,
    super::error::OrderError,
    super::id::{IntentId, OrderId, ProductId, UserId},
    super::money::{Currency, Money, MoneyAmount},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
                | (Self::Pending, Self::Cancelled)
                | (Self::Processing, Self::Cancelled)
        )
    }

    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(&Self::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = OrderError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::InvalidInput(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// Outcome of a state-machine call that is allowed to be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    pub fn validate(&self) -> Result<(), OrderError> {
        let fields = [
            ("street", &self.street),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(OrderError::InvalidInput(format!(
                "shipping address is missing: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

/// A line of an order. `unit_price` is the price at placement time and is
/// never re-read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: MoneyAmount,
}

impl OrderItem {
    pub fn subtotal(&self) -> Option<MoneyAmount> {
        self.unit_price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    items: Vec<OrderItem>,
    total: Money,
    shipping_address: ShippingAddress,
    payment_id: Option<IntentId>,
    status: OrderStatus,
    tracking_number: Option<String>,
    carrier: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

/// Everything a store needs to rebuild an [`Order`] it persisted earlier.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub shipping_address: ShippingAddress,
    pub payment_id: Option<IntentId>,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Build a fresh `pending` order. The total is fixed here and never
    /// recomputed.
    pub fn place(
        user_id: UserId,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::InvalidInput("order has no items".into()));
        }
        shipping_address.validate()?;

        let mut total = MoneyAmount::ZERO;
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidInput(format!(
                    "quantity for product {} must be at least 1",
                    item.product_id
                )));
            }
            total = item
                .subtotal()
                .and_then(|subtotal| total.checked_add(subtotal))
                .ok_or_else(|| OrderError::InvalidInput("order total overflows".into()))?;
        }

        Ok(Self {
            id: OrderId::generate(),
            user_id,
            items,
            total: Money::new(total, currency),
            shipping_address,
            payment_id: None,
            status: OrderStatus::Pending,
            tracking_number: None,
            carrier: None,
            created_at: now,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
        })
    }

    pub fn from_parts(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            user_id: parts.user_id,
            items: parts.items,
            total: parts.total,
            shipping_address: parts.shipping_address,
            payment_id: parts.payment_id,
            status: parts.status,
            tracking_number: parts.tracking_number,
            carrier: parts.carrier,
            created_at: parts.created_at,
            paid_at: parts.paid_at,
            shipped_at: parts.shipped_at,
            delivered_at: parts.delivered_at,
            cancelled_at: parts.cancelled_at,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn payment_id(&self) -> Option<&IntentId> {
        self.payment_id.as_ref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn carrier(&self) -> Option<&str> {
        self.carrier.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id == user
    }

    /// Payment succeeded: `pending -> processing`. Repeats are no-ops.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<Transition, OrderError> {
        match self.status {
            OrderStatus::Pending => {
                self.status = OrderStatus::Processing;
                self.paid_at.get_or_insert(now);
                Ok(Transition::Applied)
            }
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered => {
                Ok(Transition::Unchanged)
            }
            OrderStatus::Cancelled => Err(self.invalid(OrderStatus::Processing)),
        }
    }

    /// Admin fulfilment step: only `shipped` and `delivered`. Payment moves
    /// an order to `processing`, never an admin. Re-applying the current
    /// status keeps every timestamp as it was.
    pub fn update_status(
        &mut self,
        target: OrderStatus,
        shipment: Option<Shipment>,
        now: DateTime<Utc>,
    ) -> Result<Transition, OrderError> {
        match target {
            OrderStatus::Shipped | OrderStatus::Delivered => {}
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Cancelled => {
                return Err(self.invalid(target));
            }
        }

        let transition = if self.status == target {
            Transition::Unchanged
        } else if self.status.can_transition_to(&target) {
            self.status = target;
            let stamp = match target {
                OrderStatus::Shipped => &mut self.shipped_at,
                _ => &mut self.delivered_at,
            };
            stamp.get_or_insert(now);
            Transition::Applied
        } else {
            return Err(self.invalid(target));
        };

        if let Some(shipment) = shipment {
            if shipment.tracking_number.is_some() {
                self.tracking_number = shipment.tracking_number;
            }
            if shipment.carrier.is_some() {
                self.carrier = shipment.carrier;
            }
        }
        Ok(transition)
    }

    /// Cancel and hand back the quantities to release. Fires at most once:
    /// a set `cancelled_at` means the stock was already returned.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<Vec<(ProductId, u32)>, OrderError> {
        if !self.status.is_cancellable() || self.cancelled_at.is_some() {
            return Err(self.invalid(OrderStatus::Cancelled));
        }
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(now);
        Ok(self
            .items
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect())
    }

    /// An intent may be opened only for a pending order that has none yet.
    pub fn ensure_payable(&self) -> Result<(), OrderError> {
        if let Some(existing) = &self.payment_id {
            return Err(OrderError::AlreadyExists(format!(
                "order {} already has payment intent {existing}",
                self.id
            )));
        }
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidInput(format!(
                "order {} is {}; payment can only be started for pending orders",
                self.id, self.status
            )));
        }
        Ok(())
    }

    pub fn attach_payment(&mut self, intent: IntentId) -> Result<(), OrderError> {
        self.ensure_payable()?;
        self.payment_id = Some(intent);
        Ok(())
    }

    pub fn audit_entry(
        &self,
        actor: &str,
        action: &str,
        detail: serde_json::Value,
    ) -> NewAuditEntry {
        NewAuditEntry {
            id: Uuid::now_v7(),
            entity_type: "order".to_string(),
            entity_id: Some(self.id.as_uuid()),
            external_id: self.payment_id.as_ref().map(|id| id.as_str().to_string()),
            event_id: None,
            action: action.to_string(),
            actor: actor.to_string(),
            detail,
        }
    }

    fn invalid(&self, to: OrderStatus) -> OrderError {
        OrderError::InvalidTransition {
            from: self.status,
            to,
        }
    }
}
