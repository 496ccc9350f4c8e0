use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use kpay_orchestrator::config::AppConfig;
use kpay_orchestrator::gateways::registry::AdapterRegistry;
use kpay_orchestrator::gateways::HttpTransport;
use kpay_orchestrator::http::handlers::{k_wallets, ops, payments, webhooks};
use kpay_orchestrator::http::middleware::{platform_auth, rate_limit};
use kpay_orchestrator::service::callbacks::CallbackService;
use kpay_orchestrator::service::failover::FailoverOrchestrator;
use kpay_orchestrator::service::k_wallet_service::KWalletService;
use kpay_orchestrator::service::payment_service::PaymentService;
use kpay_orchestrator::service::platform_cache::PlatformCache;
use kpay_orchestrator::service::reconciliation::Reconciler;
use kpay_orchestrator::service::store::{PaymentStore, PgPaymentStore};
use kpay_orchestrator::service::webhook_dispatcher::WebhookDispatcher;
use kpay_orchestrator::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let store: Arc<dyn PaymentStore> = Arc::new(PgPaymentStore::new(pool.clone()));
    let transport = HttpTransport::new(cfg.gateway_timeout_ms);
    let registry = Arc::new(AdapterRegistry::standard(transport.clone()));
    let notifier = WebhookDispatcher::new(store.clone(), cfg.notify_timeout_ms);

    let reconciler = Reconciler {
        store: store.clone(),
        registry: registry.clone(),
        notifier: notifier.clone(),
    };
    let wallet_service = KWalletService {
        store: store.clone(),
        transport,
    };
    let payment_service = PaymentService {
        store: store.clone(),
        failover: FailoverOrchestrator {
            store: store.clone(),
            registry,
            va_expiry_minutes: cfg.va_expiry_minutes,
        },
        wallet: wallet_service.clone(),
        reconciler,
    };
    let callbacks = CallbackService {
        store: store.clone(),
        notifier,
    };
    let platform_cache = PlatformCache::new(store, Duration::from_secs(300));

    let state = AppState {
        payment_service,
        wallet_service,
        callbacks,
        pool,
        redis_client: redis::Client::open(cfg.redis_url.clone())?,
    };

    let platform_routes = Router::new()
        .route("/payments", post(payments::create_payment).get(payments::list_payments))
        .route("/payments/check-status", post(payments::check_status))
        .route("/payments/:transaction_id", get(payments::get_payment))
        .route("/k-wallets", post(k_wallets::create_wallet))
        .route("/k-wallets/:no_rekening", get(k_wallets::get_wallet))
        .layer(from_fn_with_state(platform_cache, platform_auth::require_platform));

    let webhook_routes = Router::new()
        .route("/webhooks/midtrans", post(webhooks::midtrans))
        .route("/webhooks/senangpay", post(webhooks::senangpay))
        .route("/webhooks/espay/inquiry", post(webhooks::espay_inquiry))
        .route("/webhooks/espay/payment", post(webhooks::espay_payment))
        .route("/webhooks/espay/topup", post(webhooks::espay_topup));

    let app = Router::new()
        .route("/health", get(ops::health))
        .route("/ops/readiness", get(ops::readiness))
        .route("/ops/liveness", get(ops::liveness))
        .merge(platform_routes)
        .merge(webhook_routes)
        .layer(from_fn_with_state(
            rate_limit::RateLimitState {
                redis_client: redis::Client::open(cfg.redis_url.clone())?,
                max_per_minute: cfg.rate_limit_per_minute,
            },
            rate_limit::enforce,
        ))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
