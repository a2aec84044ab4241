pub mod client;
pub mod webhook;

pub use {client::StripeGateway, webhook::WebhookVerifier};

use {
    crate::domain::{
        error::{GatewayError, OrderError},
        gateway::{IntentStatus, PaymentIntent, RefundReason},
        id::{IntentId, OrderId},
        money::{Currency, Money, MoneyAmount},
    },
};

/// Metadata key linking an intent back to its order.
pub const ORDER_ID_KEY: &str = "orderId";
pub const CUSTOMER_EMAIL_KEY: &str = "customerEmail";
pub const CUSTOMER_NAME_KEY: &str = "customerName";

fn to_stripe_currency(c: Currency) -> stripe::Currency {
    match c {
        Currency::Usd => stripe::Currency::USD,
        Currency::Eur => stripe::Currency::EUR,
        Currency::Gbp => stripe::Currency::GBP,
        Currency::Jpy => stripe::Currency::JPY,
    }
}

fn convert_currency(c: stripe::Currency) -> Result<Currency, OrderError> {
    match c {
        stripe::Currency::USD => Ok(Currency::Usd),
        stripe::Currency::EUR => Ok(Currency::Eur),
        stripe::Currency::GBP => Ok(Currency::Gbp),
        stripe::Currency::JPY => Ok(Currency::Jpy),
        other => Err(GatewayError::Rejected(format!("unsupported currency: {other:?}")).into()),
    }
}

fn convert_pi_status(status: stripe::PaymentIntentStatus) -> IntentStatus {
    #[allow(unreachable_patterns)]
    match status {
        stripe::PaymentIntentStatus::RequiresPaymentMethod => IntentStatus::RequiresPaymentMethod,
        stripe::PaymentIntentStatus::RequiresConfirmation => IntentStatus::RequiresConfirmation,
        stripe::PaymentIntentStatus::RequiresAction => IntentStatus::RequiresAction,
        stripe::PaymentIntentStatus::Processing => IntentStatus::Processing,
        stripe::PaymentIntentStatus::RequiresCapture => IntentStatus::RequiresCapture,
        stripe::PaymentIntentStatus::Succeeded => IntentStatus::Succeeded,
        stripe::PaymentIntentStatus::Canceled => IntentStatus::Canceled,
        other => {
            tracing::warn!("unknown PaymentIntentStatus: {other:?}, treating as processing");
            IntentStatus::Processing
        }
    }
}

fn to_stripe_reason(reason: RefundReason) -> stripe::RefundReasonFilter {
    match reason {
        RefundReason::Duplicate => stripe::RefundReasonFilter::Duplicate,
        RefundReason::Fraudulent => stripe::RefundReasonFilter::Fraudulent,
        RefundReason::RequestedByCustomer => stripe::RefundReasonFilter::RequestedByCustomer,
    }
}

fn convert_amount(amount: i64) -> Result<MoneyAmount, OrderError> {
    MoneyAmount::new(amount).map_err(|_| {
        GatewayError::Rejected(format!("negative amount from processor: {amount}")).into()
    })
}

/// `orderId` metadata that does not parse is treated as absent.
fn order_id_from_metadata(intent_id: &str, value: Option<&String>) -> Option<OrderId> {
    let raw = value?;
    match OrderId::try_from(raw.as_str()) {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!(intent_id, order_id = %raw, "intent carries a malformed orderId");
            None
        }
    }
}

fn intent_from_stripe(pi: &stripe::PaymentIntent) -> Result<PaymentIntent, OrderError> {
    let id = IntentId::new(pi.id.to_string())?;
    let money = Money::new(convert_amount(pi.amount)?, convert_currency(pi.currency)?);
    let order_id = order_id_from_metadata(pi.id.as_str(), pi.metadata.get(ORDER_ID_KEY));

    Ok(PaymentIntent {
        id,
        client_secret: pi.client_secret.clone(),
        status: convert_pi_status(pi.status),
        money,
        order_id,
    })
}

/// An error response from the API means the request was refused; anything
/// else (transport, decoding) leaves the outcome unknown.
fn convert_error(err: stripe::StripeError) -> GatewayError {
    match err {
        stripe::StripeError::Stripe(request_error) => GatewayError::Rejected(
            request_error
                .message
                .unwrap_or_else(|| format!("http status {}", request_error.http_status)),
        ),
        other => GatewayError::Unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currencies_round_trip_through_stripe() {
        for c in [Currency::Usd, Currency::Eur, Currency::Gbp, Currency::Jpy] {
            assert_eq!(convert_currency(to_stripe_currency(c)).unwrap(), c);
        }
        assert!(convert_currency(stripe::Currency::CHF).is_err());
    }

    #[test]
    fn malformed_order_id_metadata_is_dropped() {
        let bad = "not-a-uuid".to_string();
        assert_eq!(order_id_from_metadata("pi_1", Some(&bad)), None);
        assert_eq!(order_id_from_metadata("pi_1", None), None);

        let id = OrderId::generate();
        let good = id.to_string();
        assert_eq!(order_id_from_metadata("pi_1", Some(&good)), Some(id));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(convert_amount(-1).is_err());
        assert_eq!(convert_amount(1999).unwrap().minor(), 1999);
    }
}
