use {
    super::instruments::payer_for,
    crate::domain::error::SettlementError,
    crate::domain::gateway::{PaymentGateway, PixCharge, PixChargeRequest},
    crate::domain::id::ExternalReference,
    crate::domain::invoice::{self, CreditInvoice, InvoiceCharges, InvoiceRates},
    crate::domain::money::MoneyAmount,
    crate::infra::postgres::account_repo,
    chrono::{NaiveDate, Utc},
    serde::Serialize,
    sqlx::PgPool,
};

#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    pub balance: MoneyAmount,
    pub credit_limit: MoneyAmount,
    pub credit_used: MoneyAmount,
    pub open_invoices: MoneyAmount,
    pub available_credit: MoneyAmount,
    pub credit_due_day: u32,
}

pub async fn wallet_summary(pool: &PgPool, user_id: i64) -> Result<WalletSummary, SettlementError> {
    let account = account_repo::get_account(pool, user_id)
        .await?
        .ok_or_else(|| SettlementError::NotFound(format!("user {user_id}")))?;

    let open_invoices = account_repo::outstanding_invoices(pool, user_id)
        .await?
        .iter()
        .try_fold(MoneyAmount::ZERO, |acc, inv| acc.checked_add(inv.amount))
        .ok_or_else(|| SettlementError::Validation("invoice total overflows".into()))?;

    Ok(WalletSummary {
        balance: account.balance,
        credit_limit: account.credit_limit,
        credit_used: account.credit_used,
        open_invoices,
        available_credit: account.available_credit(open_invoices),
        credit_due_day: account.credit_due_day,
    })
}

pub async fn list_invoices(pool: &PgPool, user_id: i64) -> Result<Vec<CreditInvoice>, SettlementError> {
    account_repo::list_invoices(pool, user_id).await
}

/// PIX charge that tops up the wallet once the webhook confirms it.
#[tracing::instrument(skip(pool, gateway))]
pub async fn request_wallet_deposit(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    user_id: i64,
    amount: MoneyAmount,
) -> Result<PixCharge, SettlementError> {
    if amount.is_zero() {
        return Err(SettlementError::Validation("deposit amount must be positive".into()));
    }

    let request = PixChargeRequest {
        amount,
        description: format!("Depósito na carteira SmartFridge - R$ {amount}"),
        external_reference: ExternalReference::wallet_deposit(user_id, Utc::now().timestamp_millis()),
        payer: payer_for(pool, user_id).await?,
    };
    let charge = gateway.create_pix_charge(&request).await?;

    tracing::info!(gateway_ref = %charge.payment_id, "wallet deposit charge created");
    Ok(charge)
}

/// Amount due today: the current cycle at its next due date plus every
/// open/late invoice at its own due date.
pub async fn quote_invoice(
    pool: &PgPool,
    user_id: i64,
    today: NaiveDate,
    rates: InvoiceRates,
) -> Result<InvoiceCharges, SettlementError> {
    let account = account_repo::get_account(pool, user_id)
        .await?
        .ok_or_else(|| SettlementError::NotFound(format!("user {user_id}")))?;
    let outstanding = account_repo::outstanding_invoices(pool, user_id).await?;

    let overflow = || SettlementError::Validation("invoice charges overflow".into());
    let mut total = InvoiceCharges::zero();

    if !account.credit_used.is_zero() {
        let due = invoice::next_due_date(account.credit_due_day, today).ok_or_else(|| {
            SettlementError::Validation(format!("invalid due day {}", account.credit_due_day))
        })?;
        let current = invoice::charges(account.credit_used, due, today, rates)?;
        total = total.checked_add(current).ok_or_else(overflow)?;
    }
    for inv in &outstanding {
        let charges = invoice::charges(inv.amount, inv.due_date, today, rates)?;
        total = total.checked_add(charges).ok_or_else(overflow)?;
    }

    Ok(total)
}

#[derive(Debug, Clone)]
pub struct InvoicePaymentRequest {
    pub charges: InvoiceCharges,
    pub pix: PixCharge,
}

#[tracing::instrument(skip(pool, gateway, rates))]
pub async fn request_invoice_payment(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    user_id: i64,
    today: NaiveDate,
    rates: InvoiceRates,
) -> Result<InvoicePaymentRequest, SettlementError> {
    let charges = quote_invoice(pool, user_id, today, rates).await?;
    if charges.total.is_zero() {
        return Err(SettlementError::Validation("no invoice amount due".into()));
    }

    let request = PixChargeRequest {
        amount: charges.total,
        description: format!("Pagamento de fatura SmartFridge - R$ {}", charges.total),
        external_reference: ExternalReference::credit_invoice(user_id, Utc::now().timestamp_millis()),
        payer: payer_for(pool, user_id).await?,
    };
    let pix = gateway.create_pix_charge(&request).await?;

    tracing::info!(
        gateway_ref = %pix.payment_id,
        principal = %charges.principal,
        total = %charges.total,
        "invoice payment charge created"
    );
    Ok(InvoicePaymentRequest { charges, pix })
}
