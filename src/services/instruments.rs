use {
    super::settlement::{self, MarkPaidOutcome, OpenedOrder},
    crate::domain::account::{LedgerKind, NewLedgerEntry},
    crate::domain::error::SettlementError,
    crate::domain::gateway::{
        CardCaptureRequest, CardDetails, GatewayPaymentStatus, Payer, PaymentGateway, PixCharge,
        PixChargeRequest,
    },
    crate::domain::id::{ExternalReference, OrderId},
    crate::domain::money::MoneyAmount,
    crate::domain::order::{CartItem, OrderStatus, PaymentMethod, ledger_description, payment_description},
    crate::infra::postgres::{self, account_repo},
    sqlx::PgPool,
};

const ACTOR: &str = "checkout";

/// How the purchaser wants to pay, with the card token when applicable.
#[derive(Debug, Clone)]
pub enum PaymentInstruction {
    Wallet,
    Credit,
    Card(CardDetails),
    Pix,
}

impl PaymentInstruction {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::Wallet => PaymentMethod::Wallet,
            Self::Credit => PaymentMethod::Credit,
            Self::Card(_) => PaymentMethod::Card,
            Self::Pix => PaymentMethod::Pix,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: i64,
    pub condo_id: i64,
    pub items: Vec<CartItem>,
    pub payment: PaymentInstruction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReason {
    InsufficientFunds,
    CreditLimitExceeded,
    CardDeclined { detail: Option<String> },
}

impl DeclineReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientFunds => "insufficient_funds",
            Self::CreditLimitExceeded => "credit_limit_exceeded",
            Self::CardDeclined { .. } => "card_declined",
        }
    }
}

/// Result of one settlement attempt against an instrument.
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    Paid { gateway_ref: Option<String> },
    /// Waiting for the gateway webhook. PIX carries the QR payload.
    PendingExternal {
        gateway_ref: String,
        pix: Option<PixCharge>,
    },
    Declined(DeclineReason),
}

impl SettlementOutcome {
    pub fn order_status(&self) -> OrderStatus {
        match self {
            Self::Paid { .. } => OrderStatus::Paid,
            Self::PendingExternal { .. } => OrderStatus::Pending,
            Self::Declined(_) => OrderStatus::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order_id: OrderId,
    pub total: MoneyAmount,
    pub settlement: SettlementOutcome,
}

impl CheckoutOutcome {
    pub fn status(&self) -> OrderStatus {
        self.settlement.order_status()
    }
}

/// Creates the pending order, then dispatches it to its instrument.
#[tracing::instrument(skip_all, fields(user_id = request.user_id, method = %request.payment.method()))]
pub async fn checkout(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    request: &CheckoutRequest,
) -> Result<CheckoutOutcome, SettlementError> {
    let order = settlement::open_order(
        pool,
        request.user_id,
        request.condo_id,
        &request.items,
        request.payment.method(),
    )
    .await?;

    let settlement = match &request.payment {
        PaymentInstruction::Wallet => settle_with_wallet(pool, &order).await?,
        PaymentInstruction::Credit => settle_with_credit(pool, &order).await?,
        PaymentInstruction::Card(card) => settle_with_card(pool, gateway, &order, card).await?,
        PaymentInstruction::Pix => settle_with_pix(pool, gateway, &order).await?,
    };

    Ok(CheckoutOutcome {
        order_id: order.id,
        total: order.total,
        settlement,
    })
}

/// Debit, ledger row and paid transition commit together or not at all.
/// A short balance fails the order in the same unit of work.
pub async fn settle_with_wallet(
    pool: &PgPool,
    order: &OpenedOrder,
) -> Result<SettlementOutcome, SettlementError> {
    let mut tx = postgres::begin(pool).await?;

    let account = account_repo::lock_account(&mut tx, order.user_id)
        .await?
        .ok_or_else(|| SettlementError::NotFound(format!("user {}", order.user_id)))?;
    settlement::lock_pending_order(&mut tx, order.id).await?;

    let new_balance = match account.debit_wallet(order.total) {
        Ok(balance) => balance,
        Err(e) if e.is_business_rejection() => {
            settlement::mark_failed_in_tx(&mut tx, order.id, &e.to_string(), ACTOR).await?;
            tx.commit().await?;
            tracing::info!(
                order_id = %order.id,
                balance = %account.balance,
                total = %order.total,
                "wallet debit rejected"
            );
            return Ok(SettlementOutcome::Declined(DeclineReason::InsufficientFunds));
        }
        Err(e) => return Err(e),
    };

    account_repo::set_wallet_balance(&mut tx, order.user_id, new_balance).await?;
    let entry = NewLedgerEntry::new(
        order.user_id,
        LedgerKind::Purchase,
        order.total,
        ledger_description(&order.lines),
    )
    .for_order(order.id);
    account_repo::insert_ledger_entry(&mut tx, &entry).await?;

    settlement::mark_paid_in_tx(&mut tx, order.id, None, ACTOR).await?;
    tx.commit().await?;

    Ok(SettlementOutcome::Paid { gateway_ref: None })
}

/// Same shape as the wallet path, against `limit - (used + open invoices)`.
pub async fn settle_with_credit(
    pool: &PgPool,
    order: &OpenedOrder,
) -> Result<SettlementOutcome, SettlementError> {
    let mut tx = postgres::begin(pool).await?;

    let account = account_repo::lock_account(&mut tx, order.user_id)
        .await?
        .ok_or_else(|| SettlementError::NotFound(format!("user {}", order.user_id)))?;
    settlement::lock_pending_order(&mut tx, order.id).await?;
    let open_invoices = account_repo::outstanding_invoice_total(&mut tx, order.user_id).await?;

    let new_used = match account.draw_credit(order.total, open_invoices) {
        Ok(used) => used,
        Err(e) if e.is_business_rejection() => {
            settlement::mark_failed_in_tx(&mut tx, order.id, &e.to_string(), ACTOR).await?;
            tx.commit().await?;
            tracing::info!(
                order_id = %order.id,
                available = %account.available_credit(open_invoices),
                total = %order.total,
                "credit draw rejected"
            );
            return Ok(SettlementOutcome::Declined(DeclineReason::CreditLimitExceeded));
        }
        Err(e) => return Err(e),
    };

    account_repo::set_credit_used(&mut tx, order.user_id, new_used).await?;
    let entry = NewLedgerEntry::new(
        order.user_id,
        LedgerKind::CreditPurchase,
        order.total,
        ledger_description(&order.lines),
    )
    .for_order(order.id);
    account_repo::insert_ledger_entry(&mut tx, &entry).await?;

    settlement::mark_paid_in_tx(&mut tx, order.id, None, ACTOR).await?;
    tx.commit().await?;

    Ok(SettlementOutcome::Paid { gateway_ref: None })
}

/// Synchronous capture. An unknown outcome leaves the order pending so a
/// later webhook (keyed by the order id) can still settle it; a refused
/// request fails it.
pub async fn settle_with_card(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    order: &OpenedOrder,
    card: &CardDetails,
) -> Result<SettlementOutcome, SettlementError> {
    let request = CardCaptureRequest {
        amount: order.total,
        description: payment_description(&order.condo_name, &order.lines),
        external_reference: ExternalReference::order(order.id),
        idempotency_key: format!("card-order-{}", order.id),
        payer: payer_for(pool, order.user_id).await?,
        card: card.clone(),
    };

    let capture = match gateway.capture_card(&request).await {
        Ok(capture) => capture,
        Err(SettlementError::GatewayRejected(detail)) => {
            tracing::warn!(order_id = %order.id, detail = %detail, "card capture refused by gateway");
            settlement::mark_failed(pool, order.id, &format!("card refused: {detail}"), ACTOR).await?;
            return Ok(SettlementOutcome::Declined(DeclineReason::CardDeclined {
                detail: Some(detail),
            }));
        }
        Err(e) => {
            tracing::warn!(order_id = %order.id, error = %e, "card capture outcome unknown, order left pending");
            return Err(e);
        }
    };
    let gateway_ref = capture.payment_id.into_inner();

    match capture.status {
        GatewayPaymentStatus::Approved => {
            if settlement::mark_paid(pool, order.id, Some(&gateway_ref), ACTOR).await?
                == MarkPaidOutcome::AlreadyPaid
            {
                tracing::info!(order_id = %order.id, "webhook settled the order first");
            }
            Ok(SettlementOutcome::Paid {
                gateway_ref: Some(gateway_ref),
            })
        }
        status if status.is_decline() => {
            let reason = match &capture.status_detail {
                Some(detail) => format!("card {}: {detail}", status.as_str()),
                None => format!("card {}", status.as_str()),
            };
            settlement::mark_failed(pool, order.id, &reason, ACTOR).await?;
            Ok(SettlementOutcome::Declined(DeclineReason::CardDeclined {
                detail: capture.status_detail,
            }))
        }
        status => {
            tracing::info!(
                order_id = %order.id,
                gateway_ref,
                status = status.as_str(),
                "card capture not final, awaiting webhook"
            );
            Ok(SettlementOutcome::PendingExternal {
                gateway_ref,
                pix: None,
            })
        }
    }
}

/// Creates the PIX charge. The order stays pending until the webhook.
pub async fn settle_with_pix(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    order: &OpenedOrder,
) -> Result<SettlementOutcome, SettlementError> {
    let request = PixChargeRequest {
        amount: order.total,
        description: payment_description(&order.condo_name, &order.lines),
        external_reference: ExternalReference::order(order.id),
        payer: payer_for(pool, order.user_id).await?,
    };

    let charge = gateway.create_pix_charge(&request).await.inspect_err(|e| {
        tracing::warn!(order_id = %order.id, error = %e, "pix charge failed, order left pending");
    })?;

    tracing::info!(order_id = %order.id, gateway_ref = %charge.payment_id, "pix charge created");
    Ok(SettlementOutcome::PendingExternal {
        gateway_ref: charge.payment_id.to_string(),
        pix: Some(charge),
    })
}

pub(crate) async fn payer_for(pool: &PgPool, user_id: i64) -> Result<Payer, SettlementError> {
    let profile = account_repo::get_profile(pool, user_id)
        .await?
        .ok_or_else(|| SettlementError::NotFound(format!("user {user_id}")))?;
    Ok(Payer::from_full_name(profile.email, &profile.name, &profile.cpf))
}
