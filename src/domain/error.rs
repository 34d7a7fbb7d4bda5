use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("insufficient wallet balance")]
    InsufficientFunds,

    #[error("credit limit exceeded")]
    CreditLimitExceeded,

    #[error("configuration: {0}")]
    Configuration(String),

    /// Outcome unknown: transport failure, timeout or a 5xx reply.
    #[error("gateway: {0}")]
    Gateway(String),

    /// The gateway refused the request outright; nothing was charged.
    #[error("gateway rejected request: {0}")]
    GatewayRejected(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SettlementError {
    /// Business rejections that move an order to `failed` instead of
    /// aborting the unit of work.
    pub fn is_business_rejection(&self) -> bool {
        matches!(self, Self::InsufficientFunds | Self::CreditLimitExceeded)
    }
}
