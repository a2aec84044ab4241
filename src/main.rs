use {
    axum::http::StatusCode,
    sqlx::postgres::PgPoolOptions,
    stayspace_orders::{
        AppState,
        adapters::stripe::{StripeGateway, WebhookVerifier},
        config::Config,
        infra::postgres::PgStore,
        transport::http::router,
    },
    std::{sync::Arc, time::Duration},
    tokio::signal,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
    tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt},
};

/// Upper bound for a whole request, gateway round trip included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let verifier = WebhookVerifier::new(
        config.stripe_webhook_secret.as_str(),
        config.webhook_tolerance_secs,
    );
    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
        gateway: Arc::new(StripeGateway::new(
            &config.stripe_secret_key,
            verifier,
            config.gateway_timeout,
        )),
        currency: config.currency,
    };

    let app = router(state)
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, currency = %config.currency, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl+c: {e}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
