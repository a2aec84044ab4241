use {
    super::id::ProductId,
    super::order::OrderStatus,
    std::time::Duration,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient stock for {name} ({product_id}): requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: u32,
        available: i64,
    },

    #[error("order is {from}, cannot move to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("webhook signature: {0}")]
    InvalidSignature(String),

    #[error("order {0} has no payment")]
    NoPayment(String),

    #[error("payment gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("transaction aborted by a concurrent update")]
    TransactionAbort,

    #[error("missing or invalid caller identity")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("database: {0}")]
    Database(sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrderError {
    /// Whether the whole unit of work may be retried from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionAbort)
    }
}

/// SQLSTATEs raised when a transaction lost a race: serialization failure,
/// deadlock, lock timeout.
const CONFLICT_CODES: [&str; 3] = ["40001", "40P01", "55P03"];

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        let conflict = match &err {
            sqlx::Error::Database(db) => db
                .code()
                .is_some_and(|code| CONFLICT_CODES.iter().any(|c| *c == code)),
            _ => false,
        };
        if conflict {
            return Self::TransactionAbort;
        }
        Self::Database(err)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The processor answered and refused the request; nothing was created.
    #[error("rejected by processor: {0}")]
    Rejected(String),

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("processor unreachable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// The call may have taken effect on the processor side. Callers must
    /// check status before trying again.
    pub fn outcome_unknown(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}
