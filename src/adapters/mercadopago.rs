//! Mercado Pago payments over its REST API (no SDK dependency).

use {
    crate::domain::{
        error::SettlementError,
        gateway::{
            CardCapture, CardCaptureRequest, FetchedPayment, GatewayFuture, GatewayPaymentStatus,
            PaymentGateway, Payer, PixCharge, PixChargeRequest,
        },
        id::GatewayPaymentId,
        money::MoneyAmount,
    },
    serde::Deserialize,
    serde_json::{Value, json},
    std::time::Duration,
};

pub const DEFAULT_API_BASE: &str = "https://api.mercadopago.com";

pub struct MercadoPagoGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MercadoPagoGateway {
    pub fn new(base_url: &str, access_token: &str) -> Result<Self, SettlementError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| SettlementError::Gateway(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: Value,
    status: String,
    status_detail: Option<String>,
    external_reference: Option<String>,
    transaction_amount: Option<serde_json::Number>,
    point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Deserialize)]
struct PointOfInteraction {
    transaction_data: Option<TransactionData>,
}

#[derive(Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
    qr_code_base64: Option<String>,
}

impl PaymentResponse {
    fn payment_id(&self) -> Result<GatewayPaymentId, SettlementError> {
        let raw = match &self.id {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            other => {
                return Err(SettlementError::Gateway(format!("unexpected payment id: {other}")));
            }
        };
        GatewayPaymentId::new(raw).map_err(|e| SettlementError::Gateway(e.to_string()))
    }
}

impl PaymentGateway for MercadoPagoGateway {
    fn fetch_payment<'a>(&'a self, id: &'a GatewayPaymentId) -> GatewayFuture<'a, FetchedPayment> {
        Box::pin(async move {
            let url = format!("{}/v1/payments/{}", self.base_url, id.as_str());
            let resp = self.send(self.client.get(url)).await?;

            let amount = resp
                .transaction_amount
                .as_ref()
                .map(MoneyAmount::from_json_number)
                .transpose()
                .map_err(|e| SettlementError::Gateway(e.to_string()))?
                .ok_or_else(|| SettlementError::Gateway("payment without transaction_amount".into()))?;

            Ok(FetchedPayment {
                id: resp.payment_id()?,
                status: map_status(&resp.status),
                external_reference: resp.external_reference,
                amount,
            })
        })
    }

    fn create_pix_charge<'a>(&'a self, request: &'a PixChargeRequest) -> GatewayFuture<'a, PixCharge> {
        Box::pin(async move {
            let body = json!({
                "transaction_amount": request.amount.to_json_number(),
                "description": request.description,
                "payment_method_id": "pix",
                "external_reference": request.external_reference,
                "payer": payer_json(&request.payer),
            });
            let resp = self
                .send(
                    self.client
                        .post(format!("{}/v1/payments", self.base_url))
                        .header("X-Idempotency-Key", &request.external_reference)
                        .json(&body),
                )
                .await?;

            let data = resp
                .point_of_interaction
                .as_ref()
                .and_then(|p| p.transaction_data.as_ref())
                .ok_or_else(|| SettlementError::Gateway("pix response without transaction_data".into()))?;
            let (Some(qr_code), Some(qr_code_base64)) =
                (data.qr_code.clone(), data.qr_code_base64.clone())
            else {
                return Err(SettlementError::Gateway("pix response without QR code".into()));
            };

            Ok(PixCharge {
                payment_id: resp.payment_id()?,
                qr_code,
                qr_code_base64,
            })
        })
    }

    fn capture_card<'a>(&'a self, request: &'a CardCaptureRequest) -> GatewayFuture<'a, CardCapture> {
        Box::pin(async move {
            let mut body = json!({
                "transaction_amount": request.amount.to_json_number(),
                "token": request.card.token,
                "description": request.description,
                "installments": request.card.installments,
                "payment_method_id": request.card.payment_method_id,
                "external_reference": request.external_reference,
                "payer": payer_json(&request.payer),
            });
            if let Some(issuer) = &request.card.issuer_id {
                body["issuer_id"] = json!(issuer);
            }

            let resp = self
                .send(
                    self.client
                        .post(format!("{}/v1/payments", self.base_url))
                        .header("X-Idempotency-Key", &request.idempotency_key)
                        .json(&body),
                )
                .await?;

            Ok(CardCapture {
                payment_id: resp.payment_id()?,
                status: map_status(&resp.status),
                status_detail: resp.status_detail,
            })
        })
    }
}

impl MercadoPagoGateway {
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<PaymentResponse, SettlementError> {
        let resp = req
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SettlementError::Gateway(format!("Mercado Pago request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Mercado Pago returned an error");
            let message = format!("Mercado Pago returned {status}");
            return Err(if is_definite_refusal(status) {
                SettlementError::GatewayRejected(message)
            } else {
                SettlementError::Gateway(message)
            });
        }

        resp.json::<PaymentResponse>()
            .await
            .map_err(|e| SettlementError::Gateway(format!("Mercado Pago response: {e}")))
    }
}

/// 4xx means the request was not processed. Timeouts and throttling leave
/// the outcome open.
fn is_definite_refusal(status: reqwest::StatusCode) -> bool {
    status.is_client_error()
        && status != reqwest::StatusCode::REQUEST_TIMEOUT
        && status != reqwest::StatusCode::TOO_MANY_REQUESTS
}

fn payer_json(payer: &Payer) -> Value {
    json!({
        "email": payer.email,
        "first_name": payer.first_name,
        "last_name": payer.last_name,
        "identification": { "type": "CPF", "number": payer.cpf },
    })
}

fn map_status(raw: &str) -> GatewayPaymentStatus {
    match raw {
        "approved" => GatewayPaymentStatus::Approved,
        "rejected" => GatewayPaymentStatus::Rejected,
        "cancelled" => GatewayPaymentStatus::Cancelled,
        "refunded" | "charged_back" => GatewayPaymentStatus::Refunded,
        "pending" | "in_process" | "authorized" | "in_mediation" => GatewayPaymentStatus::Pending,
        other => {
            tracing::warn!(status = other, "unknown Mercado Pago status, treating as pending");
            GatewayPaymentStatus::Pending
        }
    }
}
