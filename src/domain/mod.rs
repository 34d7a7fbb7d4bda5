pub mod account;
pub mod audit;
pub mod error;
pub mod gateway;
pub mod id;
pub mod invoice;
pub mod money;
pub mod order;
pub mod unlock;
