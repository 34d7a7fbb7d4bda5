pub mod account_repo;
pub mod audit_repo;
pub mod catalog_repo;
pub mod inventory_repo;
pub mod order_repo;
pub mod unlock_repo;

use crate::domain::error::SettlementError;

/// Opens the unit of work every settlement path runs in.
pub async fn begin(
    pool: &sqlx::PgPool,
) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, SettlementError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET LOCAL lock_timeout = '5s'")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}
