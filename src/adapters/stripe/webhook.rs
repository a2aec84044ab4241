use {
    super::{ORDER_ID_KEY, order_id_from_metadata},
    crate::domain::{
        error::OrderError,
        gateway::{IntentEvent, WebhookEvent, WebhookEventKind},
        id::{EventId, IntentId},
    },
    hmac::{Hmac, Mac},
    serde::Deserialize,
    sha2::Sha256,
    std::{collections::HashMap, sync::Arc},
    subtle::ConstantTimeEq,
};

type HmacSha256 = Hmac<Sha256>;

/// Stripe's own default replay window.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Checks the `Stripe-Signature` header against the exact bytes received,
/// then turns the payload into a typed event.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Arc<str>,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<Arc<str>>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<WebhookEvent, OrderError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        payload: &[u8],
        header: &str,
        now: i64,
    ) -> Result<WebhookEvent, OrderError> {
        self.check_signature(payload, header, now)?;
        parse_event(payload)
    }

    fn check_signature(&self, payload: &[u8], header: &str, now: i64) -> Result<(), OrderError> {
        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp_str = timestamp
            .ok_or_else(|| OrderError::InvalidSignature("header has no timestamp".into()))?;
        if candidates.is_empty() {
            return Err(OrderError::InvalidSignature("header has no v1 signature".into()));
        }
        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| OrderError::InvalidSignature("timestamp is not a number".into()))?;

        let age = now.checked_sub(timestamp).and_then(i64::checked_abs);
        if age.is_none_or(|age| age > self.tolerance_secs) {
            tracing::warn!(
                timestamp,
                tolerance = self.tolerance_secs,
                "webhook timestamp outside tolerance"
            );
            return Err(OrderError::InvalidSignature("timestamp outside tolerance".into()));
        }

        let expected = compute_signature(&self.secret, timestamp_str, payload)?;
        let matched = candidates.iter().any(|candidate| {
            candidate.len() == expected.len()
                && bool::from(expected.as_bytes().ct_eq(candidate.as_bytes()))
        });
        if !matched {
            return Err(OrderError::InvalidSignature("signature mismatch".into()));
        }
        Ok(())
    }
}

fn compute_signature(secret: &str, timestamp: &str, payload: &[u8]) -> Result<String, OrderError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| OrderError::InvalidSignature("unusable webhook secret".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build a `Stripe-Signature` header value for `payload`, as the processor
/// would send it.
pub fn signature_header(
    secret: &str,
    payload: &[u8],
    timestamp: i64,
) -> Result<String, OrderError> {
    let signature = compute_signature(secret, &timestamp.to_string(), payload)?;
    Ok(format!("t={timestamp},v1={signature}"))
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    #[serde(default)]
    livemode: bool,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    id: String,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawCharge {
    payment_intent: Option<String>,
    #[serde(default)]
    amount_refunded: i64,
}

fn malformed(err: serde_json::Error) -> OrderError {
    OrderError::InvalidInput(format!("malformed webhook payload: {err}"))
}

fn intent_event(object: serde_json::Value) -> Result<IntentEvent, OrderError> {
    let raw: RawIntent = serde_json::from_value(object).map_err(malformed)?;
    let order_id = order_id_from_metadata(&raw.id, raw.metadata.get(ORDER_ID_KEY));
    Ok(IntentEvent {
        intent_id: IntentId::new(raw.id)?,
        order_id,
        amount: raw.amount,
    })
}

/// Unknown event types parse to `Other`; only their envelope is validated.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, OrderError> {
    let raw: RawEvent = serde_json::from_slice(payload).map_err(malformed)?;

    let kind = match raw.event_type.as_str() {
        "payment_intent.succeeded" => {
            WebhookEventKind::PaymentSucceeded(intent_event(raw.data.object)?)
        }
        "payment_intent.payment_failed" => {
            WebhookEventKind::PaymentFailed(intent_event(raw.data.object)?)
        }
        "payment_intent.canceled" => {
            WebhookEventKind::PaymentCanceled(intent_event(raw.data.object)?)
        }
        "charge.refunded" => {
            let charge: RawCharge = serde_json::from_value(raw.data.object).map_err(malformed)?;
            WebhookEventKind::ChargeRefunded {
                intent_id: charge.payment_intent.map(IntentId::new).transpose()?,
                amount_refunded: charge.amount_refunded,
            }
        }
        _ => WebhookEventKind::Other,
    };

    Ok(WebhookEvent {
        id: EventId::new(raw.id)?,
        event_type: raw.event_type,
        created: raw.created,
        livemode: raw.livemode,
        kind,
    })
}
