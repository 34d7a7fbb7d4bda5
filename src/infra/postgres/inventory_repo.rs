use crate::domain::error::SettlementError;

/// Decrements stock for one line and returns the remaining quantity.
/// A missing entry is created at the negative quantity so the discrepancy
/// stays visible.
pub async fn decrement(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    condo_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<i32, SettlementError> {
    let remaining: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO inventory (condo_id, product_id, quantity)
        VALUES ($1, $2, -$3)
        ON CONFLICT (condo_id, product_id)
        DO UPDATE SET quantity = inventory.quantity - $3
        RETURNING quantity
        "#,
    )
    .bind(condo_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(&mut **tx)
    .await?;

    Ok(remaining)
}
