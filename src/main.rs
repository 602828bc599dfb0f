use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use dotenv::dotenv;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use subpay_backend::api::{self, AppState};
use subpay_backend::catalog::PlanCatalog;
use subpay_backend::config::AppConfig;
use subpay_backend::currency::CurrencyConverter;
use subpay_backend::database;
use subpay_backend::database::session_repository::PaymentSessionRepository;
use subpay_backend::health;
use subpay_backend::logging::init_tracing;
use subpay_backend::middleware::logging::UuidRequestId;
use subpay_backend::payments::provider::{CardGateway, MobileMoneyGateway};
use subpay_backend::payments::providers::{CardNetworkProvider, MobileMoneyProvider};
use subpay_backend::services::callback_reconciler::CallbackReconciler;
use subpay_backend::services::payment_orchestrator::{OrchestratorConfig, PaymentOrchestrator};
use subpay_backend::workers::session_sweeper::{SessionSweeper, SessionSweeperConfig};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "Starting subpay backend service"
    );

    let pool = database::init_pool_from_config(&config.database).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let converter = CurrencyConverter::new(
        config.payment.canonical_currency.clone(),
        config.payment.localized_currency.clone(),
        config.payment.mobile_money_rate.clone(),
    )?;

    let catalog = Arc::new(match &config.payment.plan_catalog_path {
        Some(path) => {
            info!(path = %path, "Loading plan catalog from file");
            PlanCatalog::from_json_file(path, &converter)?
        }
        None => PlanCatalog::builtin(&converter)?,
    });
    info!(plans = catalog.len(), "Plan catalog loaded and validated");

    let card: Arc<dyn CardGateway> = Arc::new(CardNetworkProvider::from_env()?);
    let mobile_money: Arc<dyn MobileMoneyGateway> = Arc::new(MobileMoneyProvider::from_env()?);

    let sessions = PaymentSessionRepository::new(pool.clone());
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        catalog.clone(),
        sessions.clone(),
        card.clone(),
        mobile_money,
        OrchestratorConfig::from(&config.payment),
    ));
    let reconciler = Arc::new(CallbackReconciler::new(
        pool.clone(),
        catalog,
        converter,
    ));

    let state = AppState {
        orchestrator,
        reconciler,
        card_gateway: card,
        pool: pool.clone(),
    };

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/payments/card/intent", post(api::payments::create_card_intent))
        .route(
            "/payments/mobile-money/push",
            post(api::payments::create_mobile_money_push),
        )
        .route("/payments/status", get(api::payments::get_status))
        .route(
            "/payments/mobile-money/callback",
            post(api::callbacks::mobile_money_callback),
        )
        .route("/payments/card/webhook", post(api::callbacks::card_webhook))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = SessionSweeper::new(
        sessions,
        SessionSweeperConfig::new(config.payment.sweep_interval_seconds),
    );
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening for requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(shutdown_tx))
        .await?;

    let _ = sweeper_handle.await;
    info!("Shutdown complete");

    Ok(())
}
