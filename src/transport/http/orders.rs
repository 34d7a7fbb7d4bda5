use {
    super::errors::{ApiError, error_parts},
    crate::{
        AppState,
        adapters::auth::AuthUser,
        domain::{
            error::SettlementError,
            gateway::CardDetails,
            id::OrderId,
            order::{CartItem, PaymentMethod},
        },
        services::{
            instruments::{self, CheckoutRequest, DeclineReason, PaymentInstruction, SettlementOutcome},
            settlement, unlock,
        },
    },
    axum::{
        Extension, Json,
        extract::{Path, State, rejection::JsonRejection},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde::Deserialize,
    serde_json::{Value, json},
};

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub condo_id: i64,
    pub items: Vec<CartItem>,
    pub payment: PaymentBody,
}

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    pub method: PaymentMethod,
    pub card: Option<CardBody>,
}

#[derive(Debug, Deserialize)]
pub struct CardBody {
    pub token: String,
    pub payment_method_id: String,
    pub installments: Option<u32>,
    /// Card brick sends this as a string or a number.
    pub issuer_id: Option<Value>,
}

impl PaymentBody {
    fn into_instruction(self) -> Result<PaymentInstruction, SettlementError> {
        match self.method {
            PaymentMethod::Wallet => Ok(PaymentInstruction::Wallet),
            PaymentMethod::Credit => Ok(PaymentInstruction::Credit),
            PaymentMethod::Pix => Ok(PaymentInstruction::Pix),
            PaymentMethod::Card => {
                let card = self.card.ok_or_else(|| {
                    SettlementError::Validation("card payment requires card details".into())
                })?;
                if card.token.trim().is_empty() {
                    return Err(SettlementError::Validation("card token is empty".into()));
                }
                let issuer_id = match card.issuer_id {
                    Some(Value::String(s)) if !s.is_empty() => Some(s),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                };
                Ok(PaymentInstruction::Card(CardDetails {
                    token: card.token,
                    payment_method_id: card.payment_method_id,
                    installments: card.installments.unwrap_or(1).max(1),
                    issuer_id,
                }))
            }
        }
    }
}

pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| SettlementError::Validation(e.body_text()).into())
}

#[tracing::instrument(skip_all, fields(user_id = user.user_id))]
pub async fn checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = json_body(payload)?;
    let request = CheckoutRequest {
        user_id: user.user_id,
        condo_id: body.condo_id,
        items: body.items,
        payment: body.payment.into_instruction()?,
    };

    let outcome = instruments::checkout(&state.pool, state.gateway.as_ref(), &request).await?;
    let status = outcome.status();

    let response = match outcome.settlement {
        SettlementOutcome::Paid { gateway_ref } => (
            StatusCode::CREATED,
            Json(json!({
                "order_id": outcome.order_id,
                "status": status,
                "total": outcome.total,
                "gateway_ref": gateway_ref,
            })),
        )
            .into_response(),
        SettlementOutcome::PendingExternal { gateway_ref, pix } => {
            let pix = pix.map(|p| {
                json!({
                    "qr_code": p.qr_code,
                    "qr_code_base64": p.qr_code_base64,
                    "gateway_ref": p.payment_id,
                })
            });
            (
                StatusCode::CREATED,
                Json(json!({
                    "order_id": outcome.order_id,
                    "status": status,
                    "total": outcome.total,
                    "gateway_ref": gateway_ref,
                    "pix": pix,
                })),
            )
                .into_response()
        }
        SettlementOutcome::Declined(reason) => declined(outcome.order_id, reason),
    };

    Ok(response)
}

fn declined(order_id: OrderId, reason: DeclineReason) -> Response {
    let (status, error_code, message) = match &reason {
        DeclineReason::InsufficientFunds => error_parts(&SettlementError::InsufficientFunds),
        DeclineReason::CreditLimitExceeded => error_parts(&SettlementError::CreditLimitExceeded),
        DeclineReason::CardDeclined { detail } => (
            StatusCode::PAYMENT_REQUIRED,
            reason.as_str(),
            match detail {
                Some(d) => format!("card declined: {d}"),
                None => "card declined".to_string(),
            },
        ),
    };

    (
        status,
        Json(json!({
            "error_code": error_code,
            "message": message,
            "order_id": order_id,
        })),
    )
        .into_response()
}

pub async fn order_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let order = settlement::order_for_user(&state.pool, OrderId::new(order_id), user.user_id).await?;

    Ok(Json(json!({
        "order_id": order.id,
        "status": order.status,
        "payment_method": order.method,
        "total": order.total,
        "failure_reason": order.failure_reason,
        "created_at": order.created_at,
    })))
}

pub async fn unlock_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<i64>,
) -> Result<Json<unlock::UnlockStatus>, ApiError> {
    let status = unlock::unlock_status(&state.pool, OrderId::new(order_id), user.user_id).await?;
    Ok(Json(status))
}
