use {
    super::settlement,
    crate::domain::error::SettlementError,
    crate::domain::id::{FridgeId, OrderId},
    crate::domain::order::OrderStatus,
    crate::domain::unlock::UnlockCommand,
    crate::infra::postgres::{order_repo, unlock_repo},
    chrono::{DateTime, Utc},
    serde::Serialize,
    sqlx::PgPool,
};

/// Hands the oldest pending command for this fridge to exactly one caller.
#[tracing::instrument(skip_all, fields(fridge_id = %fridge_id))]
pub async fn claim_next(
    pool: &PgPool,
    fridge_id: &FridgeId,
) -> Result<Option<UnlockCommand>, SettlementError> {
    let claimed = unlock_repo::claim_next(pool, fridge_id).await?;
    if let Some(command) = &claimed {
        tracing::info!(command_id = command.id, order_id = %command.order_id, "unlock command claimed");
    }
    Ok(claimed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorConfirmation {
    Recorded,
    AlreadyRecorded,
    /// Order is unknown or was never paid.
    Ignored,
}

impl DoorConfirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Recorded | Self::AlreadyRecorded)
    }
}

/// Idempotent: repeated confirmations keep the first timestamp.
#[tracing::instrument(skip(pool))]
pub async fn confirm_door_opened(
    pool: &PgPool,
    order_id: OrderId,
) -> Result<DoorConfirmation, SettlementError> {
    if order_repo::set_door_opened(pool, order_id).await? {
        tracing::info!("door opened");
        return Ok(DoorConfirmation::Recorded);
    }

    match order_repo::get_order(pool, order_id).await? {
        Some(order) if order.door_opened_at.is_some() => Ok(DoorConfirmation::AlreadyRecorded),
        Some(order) => {
            tracing::warn!(status = %order.status, "door-open report for unpaid order");
            Ok(DoorConfirmation::Ignored)
        }
        None => {
            tracing::warn!("door-open report for unknown order");
            Ok(DoorConfirmation::Ignored)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnlockStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub door_opened: bool,
    pub door_opened_at: Option<DateTime<Utc>>,
}

pub async fn unlock_status(
    pool: &PgPool,
    order_id: OrderId,
    user_id: i64,
) -> Result<UnlockStatus, SettlementError> {
    let order = settlement::order_for_user(pool, order_id, user_id).await?;
    Ok(UnlockStatus {
        order_id: order.id,
        status: order.status,
        door_opened: order.door_opened_at.is_some(),
        door_opened_at: order.door_opened_at,
    })
}
