use {
    crate::domain::error::SettlementError,
    crate::domain::id::{FridgeId, OrderId},
    crate::domain::unlock::UnlockCommand,
    chrono::{DateTime, Utc},
    sqlx::PgPool,
};

#[derive(sqlx::FromRow)]
struct CommandRow {
    id: i64,
    fridge_id: String,
    order_id: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<CommandRow> for UnlockCommand {
    type Error = SettlementError;

    fn try_from(row: CommandRow) -> Result<Self, Self::Error> {
        Ok(UnlockCommand {
            id: row.id,
            fridge_id: FridgeId::new(row.fridge_id)?,
            order_id: OrderId::new(row.order_id),
            created_at: row.created_at,
        })
    }
}

/// Append-only. Only called from inside the paid transition.
pub async fn enqueue(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    fridge_id: &FridgeId,
    order_id: OrderId,
) -> Result<i64, SettlementError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO unlock_commands (fridge_id, order_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(fridge_id.as_str())
    .bind(order_id.get())
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}

/// Claim-and-delete the oldest command for a fridge in one statement.
/// SKIP LOCKED lets a concurrent poller fall through to the next row (or to
/// nothing) instead of waiting and then double-claiming.
pub async fn claim_next(
    pool: &PgPool,
    fridge_id: &FridgeId,
) -> Result<Option<UnlockCommand>, SettlementError> {
    let row = sqlx::query_as::<_, CommandRow>(
        r#"
        DELETE FROM unlock_commands
        WHERE id = (
            SELECT id FROM unlock_commands
            WHERE fridge_id = $1
            ORDER BY created_at, id
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, fridge_id, order_id, created_at
        "#,
    )
    .bind(fridge_id.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(UnlockCommand::try_from).transpose()
}
