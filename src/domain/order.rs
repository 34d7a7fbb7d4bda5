use {
    super::error::SettlementError,
    super::id::{FridgeId, OrderId},
    super::money::MoneyAmount,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Forward-only: pending → paid | failed.
    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid) | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = SettlementError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(SettlementError::Validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Wallet,
    Credit,
    Card,
    Pix,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Credit => "credit",
            Self::Card => "card",
            Self::Pix => "pix",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = SettlementError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "wallet" => Ok(Self::Wallet),
            "credit" => Ok(Self::Credit),
            "card" => Ok(Self::Card),
            "pix" => Ok(Self::Pix),
            other => Err(SettlementError::Validation(format!(
                "unknown payment method: {other}"
            ))),
        }
    }
}

/// A cart entry as submitted by the client. Prices never come from here.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub product_id: i64,
    pub quantity: i64,
}

/// A line with its unit price captured from the catalog at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: MoneyAmount,
}

impl OrderLine {
    pub fn subtotal(&self) -> Option<MoneyAmount> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Sum of quantity × unit price; `None` on overflow.
pub fn lines_total(lines: &[OrderLine]) -> Option<MoneyAmount> {
    lines.iter().try_fold(MoneyAmount::ZERO, |acc, line| {
        line.subtotal().and_then(|s| acc.checked_add(s))
    })
}

/// For INSERT. The total is derived from the lines and cannot be supplied.
#[derive(Debug, Clone)]
pub struct NewOrder {
    user_id: i64,
    condo_id: i64,
    fridge_id: FridgeId,
    method: PaymentMethod,
    lines: Vec<OrderLine>,
    total: MoneyAmount,
}

impl NewOrder {
    pub fn new(
        user_id: i64,
        condo_id: i64,
        fridge_id: FridgeId,
        method: PaymentMethod,
        lines: Vec<OrderLine>,
    ) -> Result<Self, SettlementError> {
        if lines.is_empty() {
            return Err(SettlementError::Validation("cart is empty".into()));
        }
        if let Some(bad) = lines.iter().find(|l| l.quantity <= 0) {
            return Err(SettlementError::Validation(format!(
                "quantity must be positive for product {}, got {}",
                bad.product_id, bad.quantity
            )));
        }
        let total = lines_total(&lines)
            .ok_or_else(|| SettlementError::Validation("order total overflows".into()))?;

        Ok(Self {
            user_id,
            condo_id,
            fridge_id,
            method,
            lines,
            total,
        })
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn condo_id(&self) -> i64 {
        self.condo_id
    }

    pub fn fridge_id(&self) -> &FridgeId {
        &self.fridge_id
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total(&self) -> MoneyAmount {
        self.total
    }
}

/// Full order record from DB (for reads).
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: i64,
    pub condo_id: i64,
    pub fridge_id: FridgeId,
    pub total: MoneyAmount,
    pub status: OrderStatus,
    pub method: PaymentMethod,
    pub gateway_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub door_opened_at: Option<DateTime<Utc>>,
}

/// What `mark_paid` must do for an order in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidDecision {
    Settle,
    AlreadyPaid,
    Reject { current: OrderStatus },
}

impl Order {
    pub fn decide_paid(&self) -> PaidDecision {
        match self.status {
            OrderStatus::Pending => PaidDecision::Settle,
            OrderStatus::Paid => PaidDecision::AlreadyPaid,
            current => PaidDecision::Reject { current },
        }
    }

    pub fn ensure_can_fail(&self) -> Result<(), SettlementError> {
        if self.status.can_transition_to(&OrderStatus::Failed) {
            Ok(())
        } else {
            Err(SettlementError::InvalidState(format!(
                "order {} cannot fail from {}",
                self.id, self.status
            )))
        }
    }
}

/// Gateway-facing description: `[Condo] 2x Coke, 1x Water`, max 255 chars.
pub fn payment_description(condo_name: &str, lines: &[OrderLine]) -> String {
    let summary = lines
        .iter()
        .map(|l| format!("{}x {}", l.quantity, l.product_name))
        .collect::<Vec<_>>()
        .join(", ");
    truncate_chars(&format!("[{condo_name}] {summary}"), 255, "")
}

/// Ledger description: `Compra Coke, Water`, names truncated with `...`.
pub fn ledger_description(lines: &[OrderLine]) -> String {
    let names = lines
        .iter()
        .map(|l| l.product_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Compra {}", truncate_chars(&names, 255, "..."))
}

fn truncate_chars(s: &str, max: usize, ellipsis: &str) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(ellipsis.chars().count());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(ellipsis);
    out
}
