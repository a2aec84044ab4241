#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use sqlx::PgPool;
use stayspace_orders::{
    AppState,
    adapters::stripe::{
        WebhookVerifier,
        webhook::{DEFAULT_TOLERANCE_SECS, signature_header},
    },
    domain::{
        caller::Caller,
        error::{GatewayError, OrderError},
        gateway::{
            BoxFuture, IntentRequest, IntentStatus, PaymentGateway, PaymentIntent, Refund,
            RefundRequest, WebhookEvent,
        },
        id::{IntentId, OrderId, ProductId, RefundId, UserId},
        money::{Currency, MoneyAmount},
        order::{Order, ShippingAddress},
        product::Product,
    },
    infra::{memory::MemoryStore, postgres::PgStore},
    services::{
        inventory::OrderLine,
        order_placement::{PlaceOrder, place_order},
    },
};
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

// ── Callers & requests ─────────────────────────────────────────────────────

pub fn customer() -> Caller {
    Caller {
        email: Some("ada@example.com".into()),
        name: Some("Ada".into()),
        ..Caller::customer(UserId::from_uuid(Uuid::now_v7()))
    }
}

pub fn admin() -> Caller {
    Caller::admin(UserId::from_uuid(Uuid::now_v7()))
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        street: "1 Elm St".into(),
        city: "Springfield".into(),
        postal_code: "12345".into(),
        country: "US".into(),
    }
}

pub fn line(product_id: ProductId, quantity: u32, unit_price: i64) -> OrderLine {
    OrderLine {
        product_id,
        quantity,
        unit_price: MoneyAmount::new(unit_price).unwrap(),
    }
}

pub fn request(items: Vec<OrderLine>) -> PlaceOrder {
    PlaceOrder {
        items,
        shipping_address: address(),
    }
}

pub fn product(name: &str, price: i64, stock: i64) -> Product {
    Product {
        id: ProductId::generate(),
        name: name.to_string(),
        price: MoneyAmount::new(price).unwrap(),
        stock,
        sales: 0,
    }
}

// ── Memory store ───────────────────────────────────────────────────────────

pub async fn seed(store: &MemoryStore, name: &str, price: i64, stock: i64) -> ProductId {
    let p = product(name, price, stock);
    let id = p.id;
    store.insert_product(p).await;
    id
}

pub async fn place(store: &MemoryStore, caller: &Caller, items: Vec<OrderLine>) -> Order {
    place_order(store, caller, &request(items), Currency::Usd)
        .await
        .expect("placement failed")
}

pub fn app_state(store: &MemoryStore, gateway: &Arc<FakeGateway>) -> AppState {
    AppState {
        store: Arc::new(store.clone()),
        gateway: gateway.clone(),
        currency: Currency::Usd,
    }
}

// ── Fake payment gateway ───────────────────────────────────────────────────

#[derive(Default)]
struct FakeState {
    intents: HashMap<IntentId, PaymentIntent>,
    refunds: Vec<RefundRequest>,
    cancelled: Vec<IntentId>,
    created: u32,
    fail_create: bool,
    fail_refund: bool,
}

/// In-process stand-in for the processor. Webhooks go through the real
/// verifier with [`WEBHOOK_SECRET`].
pub struct FakeGateway {
    state: Mutex<FakeState>,
    verifier: WebhookVerifier,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            verifier: WebhookVerifier::new(WEBHOOK_SECRET, DEFAULT_TOLERANCE_SECS),
        }
    }
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_status(&self, id: &IntentId, status: IntentStatus) {
        let mut state = self.state.lock().unwrap();
        state.intents.get_mut(id).expect("unknown intent").status = status;
    }

    pub fn fail_create(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    pub fn fail_refund(&self) {
        self.state.lock().unwrap().fail_refund = true;
    }

    pub fn created(&self) -> u32 {
        self.state.lock().unwrap().created
    }

    pub fn refunds(&self) -> Vec<RefundRequest> {
        self.state.lock().unwrap().refunds.clone()
    }

    pub fn cancelled(&self) -> Vec<IntentId> {
        self.state.lock().unwrap().cancelled.clone()
    }

    /// Register an intent the processor knows about but this service never
    /// attached, e.g. one opened by a concurrent request.
    pub fn insert(&self, intent: PaymentIntent) {
        self.state.lock().unwrap().intents.insert(intent.id.clone(), intent);
    }

    fn lookup(state: &FakeState, id: &IntentId) -> Result<PaymentIntent, OrderError> {
        state
            .intents
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("No such payment_intent: {id}")).into())
    }
}

impl PaymentGateway for FakeGateway {
    fn create_intent<'a>(
        &'a self,
        request: &'a IntentRequest,
    ) -> BoxFuture<'a, Result<PaymentIntent, OrderError>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if state.fail_create {
                return Err(GatewayError::Timeout(Duration::from_secs(10)).into());
            }
            state.created += 1;
            let id = IntentId::new(format!("pi_test_{}", state.created)).unwrap();
            let intent = PaymentIntent {
                client_secret: Some(format!("{id}_secret")),
                id: id.clone(),
                status: IntentStatus::RequiresPaymentMethod,
                money: request.money,
                order_id: Some(request.order_id),
            };
            state.intents.insert(id, intent.clone());
            Ok(intent)
        })
    }

    fn retrieve_intent<'a>(
        &'a self,
        id: &'a IntentId,
    ) -> BoxFuture<'a, Result<PaymentIntent, OrderError>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Self::lookup(&state, id)
        })
    }

    fn cancel_intent<'a>(
        &'a self,
        id: &'a IntentId,
    ) -> BoxFuture<'a, Result<PaymentIntent, OrderError>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let mut intent = Self::lookup(&state, id)?;
            if intent.status == IntentStatus::Succeeded {
                let reason = "cannot cancel a succeeded intent".into();
                return Err(GatewayError::Rejected(reason).into());
            }
            intent.status = IntentStatus::Canceled;
            state.intents.insert(id.clone(), intent.clone());
            state.cancelled.push(id.clone());
            Ok(intent)
        })
    }

    fn create_refund<'a>(
        &'a self,
        request: &'a RefundRequest,
    ) -> BoxFuture<'a, Result<Refund, OrderError>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if state.fail_refund {
                return Err(GatewayError::Rejected("charge already refunded".into()).into());
            }
            let intent = Self::lookup(&state, &request.intent_id)?;
            state.refunds.push(request.clone());
            Ok(Refund {
                id: RefundId::new(format!("re_test_{}", state.refunds.len())).unwrap(),
                amount: request.amount.unwrap_or(intent.money.amount()),
                status: "succeeded".into(),
            })
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, OrderError> {
        self.verifier.verify(payload, signature)
    }
}

// ── Webhook payloads ───────────────────────────────────────────────────────

pub fn sign(payload: &[u8]) -> String {
    signature_header(WEBHOOK_SECRET, payload, chrono::Utc::now().timestamp()).unwrap()
}

pub fn intent_event(
    event_id: &str,
    event_type: &str,
    intent_id: &str,
    order_id: Option<OrderId>,
    amount: i64,
) -> Vec<u8> {
    let metadata = match order_id {
        Some(id) => serde_json::json!({ "orderId": id.to_string() }),
        None => serde_json::json!({}),
    };
    serde_json::json!({
        "id": event_id,
        "object": "event",
        "type": event_type,
        "created": chrono::Utc::now().timestamp(),
        "livemode": false,
        "data": { "object": {
            "id": intent_id,
            "object": "payment_intent",
            "amount": amount,
            "currency": "usd",
            "metadata": metadata,
        }}
    })
    .to_string()
    .into_bytes()
}

pub fn succeeded_event(event_id: &str, intent_id: &str, order_id: OrderId, amount: i64) -> Vec<u8> {
    intent_event(event_id, "payment_intent.succeeded", intent_id, Some(order_id), amount)
}

pub fn verified(gateway: &FakeGateway, payload: &[u8]) -> WebhookEvent {
    gateway.verify_webhook(payload, &sign(payload)).expect("signature must verify")
}

// ── Postgres ───────────────────────────────────────────────────────────────

/// Connects to `TEST_DATABASE_URL` and migrates. Tests seed their own
/// products and users, so nothing is truncated.
pub async fn pg_store() -> PgStore {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let pool = PgPool::connect(&url).await.expect("failed to connect to test db");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");
    PgStore::new(pool)
}
