use {
    super::{errors::ApiError, orders::json_body},
    crate::{
        AppState,
        adapters::auth::AuthUser,
        domain::{error::SettlementError, invoice::CreditInvoice, money::MoneyAmount},
        services::billing::{self, WalletSummary},
    },
    axum::{
        Extension, Json,
        extract::{State, rejection::JsonRejection},
        http::StatusCode,
    },
    serde::Deserialize,
    serde_json::{Value, json},
};

#[derive(Debug, Deserialize)]
pub struct DepositBody {
    /// `"25.00"` or `25`.
    pub amount: Value,
}

fn amount_from_json(value: &Value) -> Result<MoneyAmount, SettlementError> {
    match value {
        Value::String(s) => MoneyAmount::parse_decimal(s),
        Value::Number(n) => MoneyAmount::from_json_number(n),
        other => Err(SettlementError::Validation(format!("invalid amount: {other}"))),
    }
}

pub async fn wallet_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<WalletSummary>, ApiError> {
    Ok(Json(billing::wallet_summary(&state.pool, user.user_id).await?))
}

pub async fn request_deposit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<DepositBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let body = json_body(payload)?;
    let amount = amount_from_json(&body.amount)?;

    let pix = billing::request_wallet_deposit(&state.pool, state.gateway.as_ref(), user.user_id, amount)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "amount": amount,
            "gateway_ref": pix.payment_id,
            "qr_code": pix.qr_code,
            "qr_code_base64": pix.qr_code_base64,
        })),
    ))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<CreditInvoice>>, ApiError> {
    Ok(Json(billing::list_invoices(&state.pool, user.user_id).await?))
}

pub async fn pay_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let today = chrono::Utc::now().date_naive();
    let request = billing::request_invoice_payment(
        &state.pool,
        state.gateway.as_ref(),
        user.user_id,
        today,
        state.invoice_rates,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "principal": request.charges.principal,
            "service_fee": request.charges.service_fee,
            "interest": request.charges.interest,
            "total": request.charges.total,
            "gateway_ref": request.pix.payment_id,
            "qr_code": request.pix.qr_code,
            "qr_code_base64": request.pix.qr_code_base64,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_amount_accepts_strings_and_numbers() {
        assert_eq!(amount_from_json(&json!("25.50")).unwrap().cents(), 2550);
        assert_eq!(amount_from_json(&json!(10)).unwrap().cents(), 1000);
        assert!(amount_from_json(&json!(null)).is_err());
        assert!(amount_from_json(&json!("-1")).is_err());
    }
}
