use {
    crate::domain::audit::NewAuditEntry,
    crate::domain::error::SettlementError,
    crate::domain::id::{FridgeId, OrderId},
    crate::domain::money::MoneyAmount,
    crate::domain::order::{CartItem, NewOrder, Order, OrderLine, OrderStatus, PaidDecision, PaymentMethod},
    crate::infra::postgres::{self, audit_repo, catalog_repo, inventory_repo, order_repo, unlock_repo},
    sqlx::PgPool,
    std::collections::HashMap,
};

/// A freshly persisted `pending` order plus what the instrument adapters
/// need to charge it.
#[derive(Debug, Clone)]
pub struct OpenedOrder {
    pub id: OrderId,
    pub user_id: i64,
    pub condo_name: String,
    pub fridge_id: FridgeId,
    pub method: PaymentMethod,
    pub lines: Vec<OrderLine>,
    pub total: MoneyAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkPaidOutcome {
    /// Transition applied: stock decremented, unlock command enqueued.
    Settled { unlock_command_id: i64 },
    /// Order was already paid; nothing changed.
    AlreadyPaid,
}

/// Resolves the fridge and catalog prices, then persists the order and its
/// lines in `pending` as one unit.
#[tracing::instrument(skip(pool, items), fields(order_id = tracing::field::Empty))]
pub async fn open_order(
    pool: &PgPool,
    user_id: i64,
    condo_id: i64,
    items: &[CartItem],
    method: PaymentMethod,
) -> Result<OpenedOrder, SettlementError> {
    if items.is_empty() {
        return Err(SettlementError::Validation("cart is empty".into()));
    }
    if let Some(bad) = items.iter().find(|i| i.quantity <= 0) {
        return Err(SettlementError::Validation(format!(
            "quantity must be positive for product {}",
            bad.product_id
        )));
    }

    let mut tx = postgres::begin(pool).await?;

    let condo = catalog_repo::find_condo(&mut tx, condo_id).await?.ok_or_else(|| {
        SettlementError::Configuration(format!("condominium {condo_id} not found"))
    })?;
    let fridge_id = match condo.fridge_id {
        Some(id) => FridgeId::new(id)?,
        None => {
            return Err(SettlementError::Configuration(format!(
                "no fridge bound to condominium {condo_id}"
            )));
        }
    };

    let product_ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
    let products: HashMap<i64, catalog_repo::ProductRow> =
        catalog_repo::find_products(&mut tx, &product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

    let lines = items
        .iter()
        .map(|item| {
            let product = products.get(&item.product_id).ok_or_else(|| {
                SettlementError::Validation(format!("unknown product {}", item.product_id))
            })?;
            Ok(OrderLine {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: item.quantity,
                unit_price: MoneyAmount::new(product.sale_price_cents)?,
            })
        })
        .collect::<Result<Vec<_>, SettlementError>>()?;

    let new_order = NewOrder::new(user_id, condo_id, fridge_id, method, lines)?;
    let id = order_repo::insert_order(&mut tx, &new_order).await?;
    tx.commit().await?;

    tracing::Span::current().record("order_id", tracing::field::display(id));
    tracing::info!(total = %new_order.total(), %method, "order opened");

    Ok(OpenedOrder {
        id,
        user_id,
        condo_name: condo.name,
        fridge_id: new_order.fridge_id().clone(),
        method,
        total: new_order.total(),
        lines: new_order.lines().to_vec(),
    })
}

/// The single settlement step shared by every payment path.
pub async fn mark_paid(
    pool: &PgPool,
    order_id: OrderId,
    gateway_ref: Option<&str>,
    actor: &str,
) -> Result<MarkPaidOutcome, SettlementError> {
    let mut tx = postgres::begin(pool).await?;
    let outcome = mark_paid_in_tx(&mut tx, order_id, gateway_ref, actor).await?;
    tx.commit().await?;
    Ok(outcome)
}

/// Status change, stock decrement and unlock emission inside the caller's
/// transaction. Callers holding a user row lock must have taken it before
/// calling this.
pub async fn mark_paid_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: OrderId,
    gateway_ref: Option<&str>,
    actor: &str,
) -> Result<MarkPaidOutcome, SettlementError> {
    let order = order_repo::lock_order(tx, order_id)
        .await?
        .ok_or_else(|| SettlementError::NotFound(format!("order {order_id}")))?;

    match order.decide_paid() {
        PaidDecision::AlreadyPaid => {
            tracing::info!(%order_id, "order already paid, no-op");
            return Ok(MarkPaidOutcome::AlreadyPaid);
        }
        PaidDecision::Reject { current } => {
            return Err(SettlementError::InvalidState(format!(
                "order {order_id} cannot be paid from {current}"
            )));
        }
        PaidDecision::Settle => {}
    }

    order_repo::set_paid(tx, order_id, gateway_ref).await?;

    let lines = order_repo::order_lines(tx, order_id).await?;
    for line in &lines {
        let remaining =
            inventory_repo::decrement(tx, order.condo_id, line.product_id, line.quantity).await?;
        if remaining < 0 {
            tracing::warn!(
                %order_id,
                condo_id = order.condo_id,
                product_id = line.product_id,
                remaining,
                "stock went negative"
            );
        }
    }

    let unlock_command_id = unlock_repo::enqueue(tx, &order.fridge_id, order_id).await?;

    let audit = NewAuditEntry::new(
        "order",
        Some(order_id.to_string()),
        "paid",
        actor,
        serde_json::json!({
            "method": order.method.as_str(),
            "total": order.total.to_string(),
            "gateway_ref": gateway_ref,
            "lines": lines.len(),
            "unlock_command_id": unlock_command_id,
        }),
    );
    audit_repo::insert_audit_entry(&mut **tx, &audit).await?;

    tracing::info!(
        %order_id,
        fridge_id = %order.fridge_id,
        gateway_ref = gateway_ref.unwrap_or("-"),
        unlock_command_id,
        "order paid"
    );

    Ok(MarkPaidOutcome::Settled { unlock_command_id })
}

/// pending → failed. No stock or unlock side effects.
pub async fn mark_failed(
    pool: &PgPool,
    order_id: OrderId,
    reason: &str,
    actor: &str,
) -> Result<(), SettlementError> {
    let mut tx = postgres::begin(pool).await?;
    mark_failed_in_tx(&mut tx, order_id, reason, actor).await?;
    tx.commit().await?;
    Ok(())
}

pub async fn mark_failed_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: OrderId,
    reason: &str,
    actor: &str,
) -> Result<(), SettlementError> {
    let order = order_repo::lock_order(tx, order_id)
        .await?
        .ok_or_else(|| SettlementError::NotFound(format!("order {order_id}")))?;
    order.ensure_can_fail()?;

    order_repo::set_failed(tx, order_id, reason).await?;

    let audit = NewAuditEntry::new(
        "order",
        Some(order_id.to_string()),
        "failed",
        actor,
        serde_json::json!({ "method": order.method.as_str(), "reason": reason }),
    );
    audit_repo::insert_audit_entry(&mut **tx, &audit).await?;

    tracing::info!(%order_id, reason, "order failed");
    Ok(())
}

/// Order as seen by its purchaser.
pub async fn order_for_user(
    pool: &PgPool,
    order_id: OrderId,
    user_id: i64,
) -> Result<Order, SettlementError> {
    order_repo::get_user_order(pool, order_id, user_id)
        .await?
        .ok_or_else(|| SettlementError::NotFound(format!("order {order_id}")))
}

/// Guard used by the synchronous adapters before they touch the balance.
pub(crate) async fn lock_pending_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: OrderId,
) -> Result<Order, SettlementError> {
    let order = order_repo::lock_order(tx, order_id)
        .await?
        .ok_or_else(|| SettlementError::NotFound(format!("order {order_id}")))?;
    if order.status != OrderStatus::Pending {
        return Err(SettlementError::InvalidState(format!(
            "order {order_id} is {}, expected pending",
            order.status
        )));
    }
    Ok(order)
}
