pub mod errors;
pub mod fridge;
pub mod orders;
pub mod wallet;
pub mod webhook;

use {
    crate::{
        AppState,
        adapters::auth::{fridge_auth_middleware, user_auth_middleware},
    },
    axum::{
        Router,
        extract::DefaultBodyLimit,
        http::StatusCode,
        middleware,
        routing::{get, post},
    },
    std::time::Duration,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
};

pub fn router(state: AppState) -> Router {
    let user = Router::new()
        .route("/api/orders/checkout", post(orders::checkout))
        .route("/api/orders/{id}/status", get(orders::order_status))
        .route("/api/orders/{id}/unlock-status", get(orders::unlock_status))
        .route("/api/wallet", get(wallet::wallet_summary))
        .route("/api/wallet/deposit", post(wallet::request_deposit))
        .route("/api/credit/invoices", get(wallet::list_invoices))
        .route("/api/credit/pay-invoice", post(wallet::pay_invoice))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            user_auth_middleware,
        ));

    let fridge = Router::new()
        .route("/api/fridges/{fridge_id}/claim", post(fridge::claim))
        .route("/api/fridges/door-opened", post(fridge::door_opened))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            fridge_auth_middleware,
        ));

    let webhook = Router::new().route(
        "/api/webhooks/mercadopago",
        post(webhook::mercadopago_webhook),
    );

    Router::new()
        .route("/", get(|| async { "ok" }))
        .merge(user)
        .merge(fridge)
        .merge(webhook)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
