use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::error::SettlementError;

/// Primary key of an `orders` row. Monotonic, assigned by the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(i64);

impl OrderId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

/// Physical refrigerator identifier (e.g. `GELADEIRA-01`), bound to one
/// condominium.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FridgeId(String);

impl FridgeId {
    pub fn new(id: impl Into<String>) -> Result<Self, SettlementError> {
        let id = id.into();
        if id.trim().is_empty() || id.len() > 64 {
            return Err(SettlementError::Validation(format!(
                "FridgeId must be 1..=64 characters, got: {id:?}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Gateway payment identifier. Mercado Pago uses numeric ids; they are kept
/// as strings end to end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayPaymentId(String);

impl GatewayPaymentId {
    pub fn new(id: impl Into<String>) -> Result<Self, SettlementError> {
        let id = id.into();
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(SettlementError::Validation(format!(
                "invalid gateway payment id: {id:?}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

const CREDIT_INVOICE_PREFIX: &str = "credit_invoice_";
const WALLET_DEPOSIT_PREFIX: &str = "wallet_deposit_";

/// What a gateway payment pays for, encoded in its `external_reference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalReference {
    /// `credit_invoice_<user_id>_<millis>`
    CreditInvoice { user_id: i64 },
    /// `wallet_deposit_<user_id>_<millis>`
    WalletDeposit { user_id: i64 },
    /// Bare order id.
    Order(OrderId),
}

impl ExternalReference {
    pub fn credit_invoice(user_id: i64, issued_at_millis: i64) -> String {
        format!("{CREDIT_INVOICE_PREFIX}{user_id}_{issued_at_millis}")
    }

    pub fn wallet_deposit(user_id: i64, issued_at_millis: i64) -> String {
        format!("{WALLET_DEPOSIT_PREFIX}{user_id}_{issued_at_millis}")
    }

    pub fn order(order_id: OrderId) -> String {
        order_id.to_string()
    }

    pub fn parse(raw: &str) -> Result<Self, SettlementError> {
        if let Some(rest) = raw.strip_prefix(CREDIT_INVOICE_PREFIX) {
            return Ok(Self::CreditInvoice {
                user_id: parse_user_segment(raw, rest)?,
            });
        }
        if let Some(rest) = raw.strip_prefix(WALLET_DEPOSIT_PREFIX) {
            return Ok(Self::WalletDeposit {
                user_id: parse_user_segment(raw, rest)?,
            });
        }
        raw.trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(|id| Self::Order(OrderId::new(id)))
            .ok_or_else(|| {
                SettlementError::Validation(format!("unrecognized external reference: {raw:?}"))
            })
    }
}

fn parse_user_segment(raw: &str, rest: &str) -> Result<i64, SettlementError> {
    rest.split('_')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            SettlementError::Validation(format!("external reference without user id: {raw:?}"))
        })
}
