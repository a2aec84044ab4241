use {
    super::{
        CUSTOMER_EMAIL_KEY, CUSTOMER_NAME_KEY, ORDER_ID_KEY, WebhookVerifier, convert_amount,
        convert_error, intent_from_stripe, to_stripe_currency, to_stripe_reason,
    },
    crate::domain::{
        error::{GatewayError, OrderError},
        gateway::{
            BoxFuture, IntentRequest, PaymentGateway, PaymentIntent, Refund, RefundRequest,
            WebhookEvent,
        },
        id::{IntentId, RefundId},
    },
    std::{collections::HashMap, future::Future, time::Duration},
};

/// Payment gateway backed by the Stripe API. Every call is bounded by
/// `timeout`; a call that runs out of time is reported as outcome unknown.
pub struct StripeGateway {
    client: stripe::Client,
    verifier: WebhookVerifier,
    timeout: Duration,
}

impl StripeGateway {
    pub fn new(secret_key: &str, verifier: WebhookVerifier, timeout: Duration) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
            verifier,
            timeout,
        }
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, stripe::StripeError>>,
    ) -> Result<T, OrderError> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(convert_error(err).into()),
            Err(_) => Err(GatewayError::Timeout(self.timeout).into()),
        }
    }

    async fn open_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, OrderError> {
        let mut metadata = HashMap::new();
        metadata.insert(ORDER_ID_KEY.to_string(), request.order_id.to_string());
        if let Some(email) = &request.customer_email {
            metadata.insert(CUSTOMER_EMAIL_KEY.to_string(), email.clone());
        }
        if let Some(name) = &request.customer_name {
            metadata.insert(CUSTOMER_NAME_KEY.to_string(), name.clone());
        }

        let mut params = stripe::CreatePaymentIntent::new(
            request.money.amount().minor(),
            to_stripe_currency(request.money.currency()),
        );
        params.metadata = Some(metadata);
        params.receipt_email = request.customer_email.as_deref();
        params.automatic_payment_methods = Some(stripe::CreatePaymentIntentAutomaticPaymentMethods {
            allow_redirects: None,
            enabled: true,
        });

        let pi = self
            .call(stripe::PaymentIntent::create(&self.client, params))
            .await?;
        intent_from_stripe(&pi)
    }

    async fn fetch_intent(&self, id: &IntentId) -> Result<PaymentIntent, OrderError> {
        let pi_id = parse_intent_id(id)?;
        let pi = self
            .call(stripe::PaymentIntent::retrieve(&self.client, &pi_id, &[]))
            .await?;
        intent_from_stripe(&pi)
    }

    async fn void_intent(&self, id: &IntentId) -> Result<PaymentIntent, OrderError> {
        let pi_id = parse_intent_id(id)?;
        let pi = self
            .call(stripe::PaymentIntent::cancel(
                &self.client,
                &pi_id,
                stripe::CancelPaymentIntent::default(),
            ))
            .await?;
        tracing::info!(intent_id = %id, "payment intent cancelled at processor");
        intent_from_stripe(&pi)
    }

    async fn refund(&self, request: &RefundRequest) -> Result<Refund, OrderError> {
        let mut params = stripe::CreateRefund::new();
        params.payment_intent = Some(parse_intent_id(&request.intent_id)?);
        params.amount = request.amount.map(|amount| amount.minor());
        params.reason = request.reason.map(to_stripe_reason);

        let refund = self
            .call(stripe::Refund::create(&self.client, params))
            .await?;

        Ok(Refund {
            id: RefundId::new(refund.id.to_string())?,
            amount: convert_amount(refund.amount)?,
            status: refund.status.unwrap_or_else(|| "pending".to_string()),
        })
    }
}

fn parse_intent_id(id: &IntentId) -> Result<stripe::PaymentIntentId, OrderError> {
    id.as_str()
        .parse::<stripe::PaymentIntentId>()
        .map_err(|e| OrderError::InvalidInput(format!("payment intent id {id}: {e}")))
}

impl PaymentGateway for StripeGateway {
    fn create_intent<'a>(
        &'a self,
        request: &'a IntentRequest,
    ) -> BoxFuture<'a, Result<PaymentIntent, OrderError>> {
        Box::pin(self.open_intent(request))
    }

    fn retrieve_intent<'a>(
        &'a self,
        id: &'a IntentId,
    ) -> BoxFuture<'a, Result<PaymentIntent, OrderError>> {
        Box::pin(self.fetch_intent(id))
    }

    fn cancel_intent<'a>(
        &'a self,
        id: &'a IntentId,
    ) -> BoxFuture<'a, Result<PaymentIntent, OrderError>> {
        Box::pin(self.void_intent(id))
    }

    fn create_refund<'a>(
        &'a self,
        request: &'a RefundRequest,
    ) -> BoxFuture<'a, Result<Refund, OrderError>> {
        Box::pin(self.refund(request))
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, OrderError> {
        self.verifier.verify(payload, signature)
    }
}
