use {
    smartfridge::{AppState, adapters::mercadopago::MercadoPagoGateway, config::Config},
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::signal,
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let gateway = MercadoPagoGateway::new(
        &config.mercadopago_api_base,
        &config.mercadopago_access_token,
    )
    .expect("failed to build Mercado Pago client");

    if config.mercadopago_webhook_secret.is_none() {
        tracing::warn!("MERCADOPAGO_WEBHOOK_SECRET not set, webhook signatures are not checked");
    }

    let state = AppState {
        pool,
        gateway: Arc::new(gateway),
        jwt_secret: config.jwt_secret.into(),
        fridge_api_key: config.fridge_api_key.into(),
        webhook_secret: config.mercadopago_webhook_secret.map(Into::into),
        invoice_rates: config.invoice_rates,
    };

    let app = smartfridge::transport::http::router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    tracing::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
