use {
    crate::domain::error::SettlementError,
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
};

pub struct ApiError(pub SettlementError);

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        Self(err)
    }
}

/// Status, stable error code and client-safe message for an error.
pub fn error_parts(err: &SettlementError) -> (StatusCode, &'static str, String) {
    match err {
        SettlementError::Validation(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            msg.clone(),
        ),
        SettlementError::InsufficientFunds => (
            StatusCode::PAYMENT_REQUIRED,
            "insufficient_funds",
            "insufficient wallet balance".to_string(),
        ),
        SettlementError::CreditLimitExceeded => (
            StatusCode::PAYMENT_REQUIRED,
            "credit_limit_exceeded",
            "credit limit exceeded".to_string(),
        ),
        SettlementError::Configuration(msg) => {
            tracing::warn!("configuration error: {msg}");
            (StatusCode::CONFLICT, "configuration_error", msg.clone())
        }
        SettlementError::Gateway(msg) | SettlementError::GatewayRejected(msg) => {
            tracing::error!("gateway error: {msg}");
            (
                StatusCode::BAD_GATEWAY,
                "gateway_error",
                "payment gateway unavailable".to_string(),
            )
        }
        SettlementError::InvalidState(msg) => {
            tracing::error!("invalid state: {msg}");
            (StatusCode::CONFLICT, "invalid_state", msg.clone())
        }
        SettlementError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
        SettlementError::Unauthorized(msg) => {
            (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
        }
        SettlementError::WebhookSignature(_) => (
            StatusCode::BAD_REQUEST,
            "webhook_error",
            "invalid webhook signature".to_string(),
        ),
        SettlementError::Database(err) => {
            tracing::error!("database error: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error".to_string(),
            )
        }
        SettlementError::Serialization(err) => {
            tracing::error!("serialization error: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error".to_string(),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = error_parts(&self.0);

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
