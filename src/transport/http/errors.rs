use {
    crate::domain::error::{GatewayError, OrderError},
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
};

pub struct ApiError(pub OrderError);

impl<E: Into<OrderError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut extra = serde_json::Map::new();

        let (status, error_code, message) = match &self.0 {
            OrderError::InvalidInput(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_input",
                msg.clone(),
            ),
            OrderError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.0.to_string()),
            OrderError::InsufficientStock {
                product_id,
                available,
                ..
            } => {
                extra.insert("product_id".into(), serde_json::json!(product_id));
                extra.insert("available".into(), serde_json::json!(available));
                (StatusCode::CONFLICT, "insufficient_stock", self.0.to_string())
            }
            OrderError::InvalidTransition { .. } => (
                StatusCode::CONFLICT,
                "invalid_transition",
                self.0.to_string(),
            ),
            OrderError::AlreadyExists(msg) => {
                (StatusCode::CONFLICT, "already_exists", msg.clone())
            }
            OrderError::TransactionAbort => (
                StatusCode::CONFLICT,
                "transaction_abort",
                "concurrent update, try again".to_string(),
            ),
            OrderError::InvalidSignature(reason) => {
                tracing::warn!(reason = %reason, "webhook rejected");
                (
                    StatusCode::BAD_REQUEST,
                    "invalid_signature",
                    "invalid webhook signature".to_string(),
                )
            }
            OrderError::NoPayment(_) => (StatusCode::BAD_REQUEST, "no_payment", self.0.to_string()),
            OrderError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                self.0.to_string(),
            ),
            OrderError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            OrderError::Gateway(err @ GatewayError::Rejected(_)) => {
                tracing::warn!("payment gateway rejected request: {err}");
                (StatusCode::BAD_GATEWAY, "gateway_rejected", err.to_string())
            }
            OrderError::Gateway(err) => {
                tracing::error!("payment gateway outcome unknown: {err}");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "gateway_unknown",
                    "payment processor did not answer; check payment status before retrying"
                        .to_string(),
                )
            }
            OrderError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            OrderError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let mut body = serde_json::Map::new();
        body.insert("error_code".into(), error_code.into());
        body.insert("message".into(), message.into());
        body.extend(extra);

        (status, Json(serde_json::Value::Object(body))).into_response()
    }
}
