use anyhow::Result;
use kpay_orchestrator::config::AppConfig;
use kpay_orchestrator::gateways::registry::AdapterRegistry;
use kpay_orchestrator::gateways::HttpTransport;
use kpay_orchestrator::service::reconciliation::Reconciler;
use kpay_orchestrator::service::store::{PaymentStore, PgPaymentStore};
use kpay_orchestrator::service::webhook_dispatcher::WebhookDispatcher;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await?;

    let store: Arc<dyn PaymentStore> = Arc::new(PgPaymentStore::new(pool));
    let registry = Arc::new(AdapterRegistry::standard(HttpTransport::new(cfg.gateway_timeout_ms)));
    let reconciler = Reconciler {
        store: store.clone(),
        registry,
        notifier: WebhookDispatcher::new(store, cfg.notify_timeout_ms),
    };

    let interval = std::time::Duration::from_secs(cfg.reconcile_interval_secs);
    let stale_after = chrono::Duration::seconds(cfg.reconcile_interval_secs as i64);
    loop {
        match reconciler.run_once(stale_after, cfg.reconcile_batch).await {
            Ok(summary) if summary.checked > 0 || summary.expired > 0 => info!(
                checked = summary.checked,
                changed = summary.changed,
                expired = summary.expired,
                failed = summary.failed,
                "reconciliation sweep finished"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "reconciliation sweep failed"),
        }
        tokio::time::sleep(interval).await;
    }
}
