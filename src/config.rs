use {
    crate::{adapters::mercadopago::DEFAULT_API_BASE, domain::invoice::InvoiceRates},
    std::{env, str::FromStr},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub http_port: u16,
    pub database_max_connections: u32,
    pub mercadopago_access_token: String,
    pub mercadopago_api_base: String,
    pub mercadopago_webhook_secret: Option<String>,
    pub jwt_secret: String,
    pub fridge_api_key: String,
    pub invoice_rates: InvoiceRates,
}

impl Config {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = InvoiceRates::default();
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            http_port: parsed("HTTP_PORT", 3000)?,
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS", 20)?,
            mercadopago_access_token: required("MERCADOPAGO_ACCESS_TOKEN")?,
            mercadopago_api_base: optional("MERCADOPAGO_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            mercadopago_webhook_secret: optional("MERCADOPAGO_WEBHOOK_SECRET"),
            jwt_secret: required("JWT_SECRET")?,
            fridge_api_key: required("FRIDGE_API_KEY")?,
            invoice_rates: InvoiceRates {
                service_fee_bps: parsed("INVOICE_SERVICE_FEE_BPS", defaults.service_fee_bps)?,
                daily_late_fee_bps: parsed(
                    "INVOICE_DAILY_LATE_FEE_BPS",
                    defaults.daily_late_fee_bps,
                )?,
            },
        })
    }
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
