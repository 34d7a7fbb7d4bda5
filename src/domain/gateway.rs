use {
    super::error::SettlementError,
    super::id::GatewayPaymentId,
    super::money::MoneyAmount,
    std::{future::Future, pin::Pin},
};

pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SettlementError>> + Send + 'a>>;

/// Payment status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Approved,
    Pending,
    Rejected,
    Cancelled,
    Refunded,
}

impl GatewayPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Pending => "pending",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Declines are final for a card capture attempt.
    pub fn is_decline(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }
}

/// Canonical payment state, always fetched from the gateway by id.
#[derive(Debug, Clone)]
pub struct FetchedPayment {
    pub id: GatewayPaymentId,
    pub status: GatewayPaymentStatus,
    pub external_reference: Option<String>,
    pub amount: MoneyAmount,
}

#[derive(Debug, Clone)]
pub struct Payer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub cpf: String,
}

impl Payer {
    /// Splits a full name into first / rest, reusing the first name when
    /// there is no surname.
    pub fn from_full_name(email: String, full_name: &str, cpf: &str) -> Self {
        let mut parts = full_name.split_whitespace();
        let first_name = parts.next().unwrap_or_default().to_string();
        let rest = parts.collect::<Vec<_>>().join(" ");
        let last_name = if rest.is_empty() {
            first_name.clone()
        } else {
            rest
        };
        Self {
            email,
            first_name,
            last_name,
            cpf: cpf.chars().filter(|c| c.is_ascii_digit()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PixChargeRequest {
    pub amount: MoneyAmount,
    pub description: String,
    pub external_reference: String,
    pub payer: Payer,
}

#[derive(Debug, Clone)]
pub struct PixCharge {
    pub payment_id: GatewayPaymentId,
    pub qr_code: String,
    pub qr_code_base64: String,
}

#[derive(Debug, Clone)]
pub struct CardDetails {
    pub token: String,
    pub payment_method_id: String,
    pub installments: u32,
    pub issuer_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CardCaptureRequest {
    pub amount: MoneyAmount,
    pub description: String,
    pub external_reference: String,
    pub idempotency_key: String,
    pub payer: Payer,
    pub card: CardDetails,
}

#[derive(Debug, Clone)]
pub struct CardCapture {
    pub payment_id: GatewayPaymentId,
    pub status: GatewayPaymentStatus,
    pub status_detail: Option<String>,
}

/// The card/PIX processor. Everything the settlement core needs from it.
pub trait PaymentGateway: Send + Sync {
    fn fetch_payment<'a>(&'a self, id: &'a GatewayPaymentId) -> GatewayFuture<'a, FetchedPayment>;

    fn create_pix_charge<'a>(&'a self, request: &'a PixChargeRequest) -> GatewayFuture<'a, PixCharge>;

    fn capture_card<'a>(&'a self, request: &'a CardCaptureRequest) -> GatewayFuture<'a, CardCapture>;
}
