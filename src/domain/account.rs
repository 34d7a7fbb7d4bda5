use {
    super::error::SettlementError,
    super::id::OrderId,
    super::money::MoneyAmount,
    serde::Serialize,
    std::fmt,
    uuid::Uuid,
};

/// Balance and credit fields of a `users` row, read under `FOR UPDATE`.
#[derive(Debug, Clone, Serialize)]
pub struct WalletAccount {
    pub user_id: i64,
    pub balance: MoneyAmount,
    pub credit_limit: MoneyAmount,
    pub credit_used: MoneyAmount,
    pub credit_due_day: u32,
}

impl WalletAccount {
    /// `limit - (used + open invoices)`, floored at zero.
    pub fn available_credit(&self, open_invoices: MoneyAmount) -> MoneyAmount {
        let debt = self
            .credit_used
            .checked_add(open_invoices)
            .unwrap_or(MoneyAmount::MAX);
        self.credit_limit.saturating_sub(debt)
    }

    pub fn debit_wallet(&self, amount: MoneyAmount) -> Result<MoneyAmount, SettlementError> {
        self.balance
            .checked_sub(amount)
            .ok_or(SettlementError::InsufficientFunds)
    }

    pub fn draw_credit(
        &self,
        amount: MoneyAmount,
        open_invoices: MoneyAmount,
    ) -> Result<MoneyAmount, SettlementError> {
        if self.available_credit(open_invoices) < amount {
            return Err(SettlementError::CreditLimitExceeded);
        }
        self.credit_used
            .checked_add(amount)
            .ok_or(SettlementError::CreditLimitExceeded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Deposit,
    Purchase,
    CreditPurchase,
    InvoicePayment,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Purchase => "purchase",
            Self::CreditPurchase => "credit_purchase",
            Self::InvoicePayment => "invoice_payment",
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Row for `wallet_transactions`. `gateway_ref` is unique, which is what
/// makes deposit and invoice reconciliation check-before-apply.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub id: Uuid,
    pub user_id: i64,
    pub kind: LedgerKind,
    pub amount: MoneyAmount,
    pub related_order_id: Option<OrderId>,
    pub gateway_ref: Option<String>,
    pub description: String,
}

impl NewLedgerEntry {
    pub fn new(user_id: i64, kind: LedgerKind, amount: MoneyAmount, description: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            kind,
            amount,
            related_order_id: None,
            gateway_ref: None,
            description,
        }
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.related_order_id = Some(order_id);
        self
    }

    pub fn with_gateway_ref(mut self, gateway_ref: impl Into<String>) -> Self {
        self.gateway_ref = Some(gateway_ref.into());
        self
    }
}
