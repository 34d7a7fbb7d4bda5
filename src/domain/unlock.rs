use {
    super::id::{FridgeId, OrderId},
    chrono::{DateTime, Utc},
    serde::Serialize,
};

/// A pending, unconsumed instruction to open one fridge. Claiming deletes
/// the row; there is no "used" flag.
#[derive(Debug, Clone, Serialize)]
pub struct UnlockCommand {
    pub id: i64,
    pub fridge_id: FridgeId,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
}
