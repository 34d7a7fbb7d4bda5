use {
    crate::domain::error::SettlementError,
    crate::domain::id::{FridgeId, OrderId},
    crate::domain::money::MoneyAmount,
    crate::domain::order::{NewOrder, Order, OrderLine, OrderStatus, PaymentMethod},
    chrono::{DateTime, Utc},
    sqlx::PgPool,
};

const ORDER_COLUMNS: &str = "id, user_id, condo_id, fridge_id, total_cents, status, payment_method, \
     gateway_ref, failure_reason, created_at, door_opened_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    condo_id: i64,
    fridge_id: String,
    total_cents: i64,
    status: String,
    payment_method: String,
    gateway_ref: Option<String>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    door_opened_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = SettlementError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: OrderId::new(row.id),
            user_id: row.user_id,
            condo_id: row.condo_id,
            fridge_id: FridgeId::new(row.fridge_id)?,
            total: MoneyAmount::new(row.total_cents)?,
            status: OrderStatus::try_from(row.status.as_str())?,
            method: PaymentMethod::try_from(row.payment_method.as_str())?,
            gateway_ref: row.gateway_ref,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            door_opened_at: row.door_opened_at,
        })
    }
}

/// Stored line, as read back for the stock decrement.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredLine {
    pub product_id: i64,
    pub quantity: i32,
    pub price_at_purchase_cents: i64,
}

/// Inserts the order in `pending` together with all of its lines.
pub async fn insert_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order: &NewOrder,
) -> Result<OrderId, SettlementError> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO orders (user_id, condo_id, fridge_id, total_cents, status, payment_method)
        VALUES ($1, $2, $3, $4, 'pending', $5)
        RETURNING id
        "#,
    )
    .bind(order.user_id())
    .bind(order.condo_id())
    .bind(order.fridge_id().as_str())
    .bind(order.total().cents())
    .bind(order.method().as_str())
    .fetch_one(&mut **tx)
    .await?;

    for line in order.lines() {
        insert_line(tx, id, line).await?;
    }

    Ok(OrderId::new(id))
}

async fn insert_line(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: i64,
    line: &OrderLine,
) -> Result<(), SettlementError> {
    let quantity = i32::try_from(line.quantity).map_err(|_| {
        SettlementError::Validation(format!("quantity too large: {}", line.quantity))
    })?;

    sqlx::query(
        r#"
        INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase_cents)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(order_id)
    .bind(line.product_id)
    .bind(quantity)
    .bind(line.unit_price.cents())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Row lock on the order. Every status transition goes through this.
pub async fn lock_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: OrderId,
) -> Result<Option<Order>, SettlementError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id.get())
        .fetch_optional(&mut **tx)
        .await?;

    row.map(Order::try_from).transpose()
}

pub async fn get_order(pool: &PgPool, id: OrderId) -> Result<Option<Order>, SettlementError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id.get())
        .fetch_optional(pool)
        .await?;

    row.map(Order::try_from).transpose()
}

/// Same as [`get_order`] but scoped to the purchasing user.
pub async fn get_user_order(
    pool: &PgPool,
    id: OrderId,
    user_id: i64,
) -> Result<Option<Order>, SettlementError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id.get())
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    row.map(Order::try_from).transpose()
}

pub async fn order_lines(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: OrderId,
) -> Result<Vec<StoredLine>, SettlementError> {
    let lines = sqlx::query_as::<_, StoredLine>(
        "SELECT product_id, quantity, price_at_purchase_cents FROM order_items WHERE order_id = $1 ORDER BY id",
    )
    .bind(id.get())
    .fetch_all(&mut **tx)
    .await?;

    Ok(lines)
}

pub async fn set_paid(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: OrderId,
    gateway_ref: Option<&str>,
) -> Result<(), SettlementError> {
    sqlx::query(
        "UPDATE orders SET status = 'paid', gateway_ref = $2, paid_at = now() WHERE id = $1 AND status = 'pending'",
    )
    .bind(id.get())
    .bind(gateway_ref)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn set_failed(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: OrderId,
    reason: &str,
) -> Result<(), SettlementError> {
    sqlx::query(
        "UPDATE orders SET status = 'failed', failure_reason = $2 WHERE id = $1 AND status = 'pending'",
    )
    .bind(id.get())
    .bind(reason)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Sets `door_opened_at` once, on paid orders only. Returns `false` when
/// nothing was updated.
pub async fn set_door_opened(pool: &PgPool, id: OrderId) -> Result<bool, SettlementError> {
    let result = sqlx::query(
        "UPDATE orders SET door_opened_at = now() \
         WHERE id = $1 AND status = 'paid' AND door_opened_at IS NULL",
    )
    .bind(id.get())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
