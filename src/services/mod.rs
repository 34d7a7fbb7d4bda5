pub mod billing;
pub mod instruments;
pub mod reconciliation;
pub mod settlement;
pub mod unlock;
