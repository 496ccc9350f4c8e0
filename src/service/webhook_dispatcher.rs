use crate::domain::canonical::PlatformCallback;
use crate::domain::payment::Payment;
use crate::service::store::PaymentStore;
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Best-effort status notification to the owning platform.
#[derive(Clone)]
pub struct WebhookDispatcher {
    pub store: Arc<dyn PaymentStore>,
    pub client: reqwest::Client,
    pub timeout: Duration,
}

impl WebhookDispatcher {
    pub fn new(store: Arc<dyn PaymentStore>, timeout_ms: u64) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Never fails the caller; the outcome is logged and, on success,
    /// recorded on the payment.
    pub async fn notify(&self, payment: &Payment) {
        match self.deliver(payment).await {
            Ok(true) => info!(transaction_id = %payment.transaction_id, "platform notified"),
            Ok(false) => {}
            Err(e) => warn!(
                transaction_id = %payment.transaction_id,
                error = %e,
                "platform notification failed"
            ),
        }
    }

    /// Runs `notify` on its own task so the caller never waits on it.
    pub fn spawn(&self, payment: Payment) {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.notify(&payment).await });
    }

    async fn deliver(&self, payment: &Payment) -> Result<bool> {
        let Some(platform) = self.store.find_platform(payment.platform_id).await? else {
            bail!("platform {} not found", payment.platform_id);
        };
        let Some(url) = platform.notification_url.filter(|u| !u.is_empty()) else {
            return Ok(false);
        };

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&PlatformCallback::from_payment(payment))
            .timeout(self.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("{url} answered {}", resp.status());
        }
        self.store.mark_notified(payment.id).await?;
        Ok(true)
    }
}
