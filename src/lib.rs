pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;
pub mod transport;

use {
    crate::domain::{gateway::PaymentGateway, invoice::InvoiceRates},
    std::sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub gateway: Arc<dyn PaymentGateway>,
    pub jwt_secret: Arc<str>,
    pub fridge_api_key: Arc<str>,
    pub webhook_secret: Option<Arc<str>>,
    pub invoice_rates: InvoiceRates,
}
