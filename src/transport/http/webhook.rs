use {
    super::errors::ApiError,
    crate::{
        AppState,
        adapters::auth::verify_webhook_signature,
        domain::error::SettlementError,
        services::reconciliation::{self, PaymentNotification, ReconcileOutcome},
    },
    axum::{
        Json,
        body::Bytes,
        extract::{Query, State},
        http::HeaderMap,
    },
    serde_json::{Value, json},
    std::collections::HashMap,
};

/// Mercado Pago notification endpoint. Anything past the signature check is
/// acknowledged with 200 so the gateway stops retrying; failures go to the
/// operator channel instead.
pub async fn mercadopago_webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let notification = PaymentNotification::from_parts(&payload, &query);

    if let Some(secret) = &state.webhook_secret {
        let signature = headers
            .get("x-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| SettlementError::WebhookSignature("missing x-signature header".into()))?;
        let request_id = headers.get("x-request-id").and_then(|v| v.to_str().ok());
        let data_id = query
            .get("data.id")
            .map(String::as_str)
            .or(notification.payment_id.as_deref());

        verify_webhook_signature(signature, request_id, data_id, secret).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected webhook");
        })?;
    }

    let status = match reconciliation::handle_payment_event(
        &state.pool,
        state.gateway.as_ref(),
        &notification,
    )
    .await
    {
        Ok(ReconcileOutcome::Ignored) => "ignored",
        Ok(ReconcileOutcome::NotApproved(_)) => "not_approved",
        Ok(ReconcileOutcome::OrderSettled(_)) => "settled",
        Ok(ReconcileOutcome::OrderAlreadyPaid(_)) | Ok(ReconcileOutcome::Duplicate) => "duplicate",
        Ok(ReconcileOutcome::DepositCredited { .. }) => "deposit_credited",
        Ok(ReconcileOutcome::InvoicePaid { .. }) => "invoice_paid",
        Err(e) => {
            reconciliation::report_failure(&state.pool, &notification, &e).await;
            "error"
        }
    };

    Ok(Json(json!({ "status": status })))
}
