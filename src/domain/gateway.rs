use {
    super::error::OrderError,
    super::id::{EventId, IntentId, OrderId, RefundId},
    super::money::{Money, MoneyAmount},
    serde::Serialize,
    std::{fmt, future::Future, pin::Pin},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the order service asks the processor to open.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub order_id: OrderId,
    pub money: Money,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the service layer gets back after talking to the processor.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: IntentId,
    pub client_secret: Option<String>,
    pub status: IntentStatus,
    pub money: Money,
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    Duplicate,
    Fraudulent,
    RequestedByCustomer,
}

impl TryFrom<&str> for RefundReason {
    type Error = OrderError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "duplicate" => Ok(Self::Duplicate),
            "fraudulent" => Ok(Self::Fraudulent),
            "requested_by_customer" => Ok(Self::RequestedByCustomer),
            other => Err(OrderError::InvalidInput(format!(
                "unknown refund reason: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub intent_id: IntentId,
    /// `None` refunds whatever is left on the intent.
    pub amount: Option<MoneyAmount>,
    pub reason: Option<RefundReason>,
}

#[derive(Debug, Clone)]
pub struct Refund {
    pub id: RefundId,
    pub amount: MoneyAmount,
    pub status: String,
}

/// Payment-intent facts carried by a webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentEvent {
    pub intent_id: IntentId,
    pub order_id: Option<OrderId>,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    PaymentSucceeded(IntentEvent),
    PaymentFailed(IntentEvent),
    PaymentCanceled(IntentEvent),
    ChargeRefunded {
        intent_id: Option<IntentId>,
        amount_refunded: i64,
    },
    Other,
}

/// A webhook whose signature has been checked. Nothing else reaches the
/// reconciliation handler.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: EventId,
    pub event_type: String,
    pub created: i64,
    pub livemode: bool,
    pub kind: WebhookEventKind,
}

impl WebhookEvent {
    pub fn intent_id(&self) -> Option<&IntentId> {
        match &self.kind {
            WebhookEventKind::PaymentSucceeded(e)
            | WebhookEventKind::PaymentFailed(e)
            | WebhookEventKind::PaymentCanceled(e) => Some(&e.intent_id),
            WebhookEventKind::ChargeRefunded { intent_id, .. } => intent_id.as_ref(),
            WebhookEventKind::Other => None,
        }
    }
}

pub trait PaymentGateway: Send + Sync {
    fn create_intent<'a>(
        &'a self,
        request: &'a IntentRequest,
    ) -> BoxFuture<'a, Result<PaymentIntent, OrderError>>;

    fn retrieve_intent<'a>(
        &'a self,
        id: &'a IntentId,
    ) -> BoxFuture<'a, Result<PaymentIntent, OrderError>>;

    fn cancel_intent<'a>(
        &'a self,
        id: &'a IntentId,
    ) -> BoxFuture<'a, Result<PaymentIntent, OrderError>>;

    fn create_refund<'a>(
        &'a self,
        request: &'a RefundRequest,
    ) -> BoxFuture<'a, Result<Refund, OrderError>>;

    /// Check `signature` against the raw request body, then parse it.
    /// Fails with `InvalidSignature` before looking at the payload otherwise.
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, OrderError>;
}
