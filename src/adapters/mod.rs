pub mod auth;
pub mod mercadopago;
