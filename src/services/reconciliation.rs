use {
    super::settlement::{self, MarkPaidOutcome},
    crate::domain::account::{LedgerKind, NewLedgerEntry},
    crate::domain::audit::NewAuditEntry,
    crate::domain::error::SettlementError,
    crate::domain::gateway::{FetchedPayment, GatewayPaymentStatus, PaymentGateway},
    crate::domain::id::{ExternalReference, GatewayPaymentId, OrderId},
    crate::domain::money::MoneyAmount,
    crate::infra::postgres::{self, account_repo, audit_repo},
    serde_json::Value,
    sqlx::PgPool,
    std::collections::HashMap,
};

const ACTOR: &str = "webhook:mercadopago";

/// Topic and payment id of an incoming notification. Nothing else in the
/// payload is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub topic: Option<String>,
    pub payment_id: Option<String>,
}

impl PaymentNotification {
    /// Reads `type`/`topic` and `data.id` from the body, falling back to the
    /// query string (`type`, `topic`, `data.id`, `id`).
    pub fn from_parts(body: &Value, query: &HashMap<String, String>) -> Self {
        let topic = ["type", "topic"]
            .iter()
            .find_map(|k| body.get(*k).and_then(Value::as_str).map(str::to_string))
            .or_else(|| {
                ["type", "topic"]
                    .iter()
                    .find_map(|k| query.get(*k).cloned())
            });

        let payment_id = body
            .get("data")
            .and_then(|d| d.get("id"))
            .and_then(scalar_to_string)
            .or_else(|| {
                ["data.id", "id"]
                    .iter()
                    .find_map(|k| query.get(*k).cloned())
            });

        Self { topic, payment_id }
    }

    pub fn is_payment(&self) -> bool {
        self.topic.as_deref() == Some("payment")
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// What one webhook delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not a payment notification, or no id to act on.
    Ignored,
    /// Gateway says the payment is not approved (yet); nothing changed.
    NotApproved(GatewayPaymentStatus),
    OrderSettled(OrderId),
    OrderAlreadyPaid(OrderId),
    DepositCredited { user_id: i64, amount: MoneyAmount },
    InvoicePaid { user_id: i64, invoices: u64 },
    /// This payment id was already applied to the wallet ledger.
    Duplicate,
}

/// Re-fetches the payment and re-drives the matching transition. Safe to
/// call any number of times for the same payment.
#[tracing::instrument(skip_all, fields(topic = ?notification.topic, payment_id = ?notification.payment_id))]
pub async fn handle_payment_event(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    notification: &PaymentNotification,
) -> Result<ReconcileOutcome, SettlementError> {
    if !notification.is_payment() {
        tracing::debug!("non-payment notification ignored");
        return Ok(ReconcileOutcome::Ignored);
    }
    let Some(raw_id) = notification.payment_id.as_deref() else {
        tracing::warn!("payment notification without id");
        return Ok(ReconcileOutcome::Ignored);
    };
    let payment_id = GatewayPaymentId::new(raw_id)?;

    let payment = gateway.fetch_payment(&payment_id).await?;
    if payment.status != GatewayPaymentStatus::Approved {
        tracing::info!(status = payment.status.as_str(), "payment not approved, nothing to do");
        return Ok(ReconcileOutcome::NotApproved(payment.status));
    }

    let reference = payment.external_reference.as_deref().ok_or_else(|| {
        SettlementError::Gateway(format!("payment {payment_id} has no external_reference"))
    })?;

    match ExternalReference::parse(reference)? {
        ExternalReference::Order(order_id) => {
            match settlement::mark_paid(pool, order_id, Some(payment_id.as_str()), ACTOR).await? {
                MarkPaidOutcome::Settled { .. } => Ok(ReconcileOutcome::OrderSettled(order_id)),
                MarkPaidOutcome::AlreadyPaid => Ok(ReconcileOutcome::OrderAlreadyPaid(order_id)),
            }
        }
        ExternalReference::WalletDeposit { user_id } => credit_deposit(pool, user_id, &payment).await,
        ExternalReference::CreditInvoice { user_id } => pay_invoices(pool, user_id, &payment).await,
    }
}

/// Credits the gateway's amount once per payment id.
async fn credit_deposit(
    pool: &PgPool,
    user_id: i64,
    payment: &FetchedPayment,
) -> Result<ReconcileOutcome, SettlementError> {
    let mut tx = postgres::begin(pool).await?;

    let account = account_repo::lock_account(&mut tx, user_id)
        .await?
        .ok_or_else(|| SettlementError::NotFound(format!("user {user_id}")))?;

    let entry = NewLedgerEntry::new(
        user_id,
        LedgerKind::Deposit,
        payment.amount,
        "Depósito via PIX".to_string(),
    )
    .with_gateway_ref(payment.id.as_str());
    if !account_repo::insert_ledger_entry(&mut tx, &entry).await? {
        tx.commit().await?;
        tracing::info!(user_id, "deposit already credited");
        return Ok(ReconcileOutcome::Duplicate);
    }

    let balance = account
        .balance
        .checked_add(payment.amount)
        .ok_or_else(|| SettlementError::Validation("wallet balance overflow".into()))?;
    account_repo::set_wallet_balance(&mut tx, user_id, balance).await?;

    let audit = NewAuditEntry::new(
        "user",
        Some(user_id.to_string()),
        "wallet_deposit",
        ACTOR,
        serde_json::json!({
            "gateway_ref": payment.id.as_str(),
            "amount": payment.amount.to_string(),
            "balance": balance.to_string(),
        }),
    );
    audit_repo::insert_audit_entry(&mut *tx, &audit).await?;
    tx.commit().await?;

    tracing::info!(user_id, amount = %payment.amount, %balance, "wallet deposit credited");
    Ok(ReconcileOutcome::DepositCredited {
        user_id,
        amount: payment.amount,
    })
}

/// Zeroes the current cycle and settles every open/late invoice, once per
/// payment id.
async fn pay_invoices(
    pool: &PgPool,
    user_id: i64,
    payment: &FetchedPayment,
) -> Result<ReconcileOutcome, SettlementError> {
    let mut tx = postgres::begin(pool).await?;

    let account = account_repo::lock_account(&mut tx, user_id)
        .await?
        .ok_or_else(|| SettlementError::NotFound(format!("user {user_id}")))?;

    let entry = NewLedgerEntry::new(
        user_id,
        LedgerKind::InvoicePayment,
        payment.amount,
        "Pagamento de fatura".to_string(),
    )
    .with_gateway_ref(payment.id.as_str());
    if !account_repo::insert_ledger_entry(&mut tx, &entry).await? {
        tx.commit().await?;
        tracing::info!(user_id, "invoice payment already applied");
        return Ok(ReconcileOutcome::Duplicate);
    }

    // The payment clears the whole cycle, including spending drawn after the
    // invoice was issued. The audit entry keeps what was cleared.
    account_repo::set_credit_used(&mut tx, user_id, MoneyAmount::ZERO).await?;
    let invoices = account_repo::settle_outstanding_invoices(&mut tx, user_id).await?;

    let audit = NewAuditEntry::new(
        "user",
        Some(user_id.to_string()),
        "invoice_paid",
        ACTOR,
        serde_json::json!({
            "gateway_ref": payment.id.as_str(),
            "amount": payment.amount.to_string(),
            "invoices": invoices,
            "credit_used_cleared": account.credit_used.to_string(),
        }),
    );
    audit_repo::insert_audit_entry(&mut *tx, &audit).await?;
    tx.commit().await?;

    tracing::info!(
        user_id,
        amount = %payment.amount,
        invoices,
        cleared = %account.credit_used,
        "credit invoices paid"
    );
    Ok(ReconcileOutcome::InvoicePaid { user_id, invoices })
}

/// Operator channel for deliveries that were acknowledged but not applied.
/// Best effort: a failure here is only logged.
pub async fn report_failure(
    pool: &PgPool,
    notification: &PaymentNotification,
    error: &SettlementError,
) {
    tracing::error!(
        payment_id = ?notification.payment_id,
        topic = ?notification.topic,
        error = %error,
        "webhook reconciliation failed"
    );

    let audit = NewAuditEntry::new(
        "payment",
        notification.payment_id.clone(),
        "reconciliation_failed",
        ACTOR,
        serde_json::json!({
            "topic": notification.topic,
            "error": error.to_string(),
        }),
    );
    if let Err(e) = audit_repo::insert_audit_entry(pool, &audit).await {
        tracing::error!(error = %e, "failed to record reconciliation failure");
    }
}
