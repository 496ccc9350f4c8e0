use crate::domain::audit::{Actor, StatusChange};
use crate::domain::canonical::CanonicalResponse;
use crate::domain::channel::Channel;
use crate::domain::payment::{Payment, PaymentStatus};
use crate::error::PaymentError;
use crate::gateways::registry::AdapterRegistry;
use crate::gateways::StatusQuery;
use crate::service::k_wallet_service::wallet_response;
use crate::service::store::PaymentStore;
use crate::service::webhook_dispatcher::WebhookDispatcher;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub checked: usize,
    pub changed: usize,
    pub expired: usize,
    pub failed: usize,
}

/// Re-queries aggregators for open payments and applies the canonical
/// status with its audit rows in one unit.
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn PaymentStore>,
    pub registry: Arc<AdapterRegistry>,
    pub notifier: WebhookDispatcher,
}

impl Reconciler {
    async fn channel_of(&self, payment: &Payment) -> Result<Channel, PaymentError> {
        self.store
            .find_channel_by_id(payment.channel_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("channel".to_string()))
    }

    /// Canonical response rebuilt from the stored gateway body. Never calls
    /// an aggregator.
    pub async fn describe(&self, payment: &Payment) -> Result<CanonicalResponse, PaymentError> {
        let channel = self.channel_of(payment).await?;
        if channel.is_wallet() {
            return Ok(wallet_response(payment, &channel));
        }
        let aggregator_id = payment
            .aggregator_id
            .ok_or_else(|| PaymentError::NotFound("aggregator".to_string()))?;
        let configuration = self
            .store
            .find_configuration(payment.platform_id, aggregator_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("platform configuration".to_string()))?;
        let (_, adapter) = self.registry.resolve_for(&configuration.aggregator_slug, &channel)?;
        Ok(adapter.map_to_canonical(&channel, payment)?)
    }

    /// Platform-facing status check. Terminal payments are answered from
    /// storage without contacting the aggregator.
    pub async fn check_status(&self, platform_id: i64, transaction_id: &str) -> Result<CanonicalResponse, PaymentError> {
        let payment = self
            .store
            .find_by_transaction_id(transaction_id)
            .await?
            .filter(|p| p.platform_id == platform_id)
            .ok_or_else(|| PaymentError::NotFound("payment".to_string()))?;
        if payment.status.is_terminal() {
            return self.describe(&payment).await;
        }
        let current = self.refresh(payment, Actor::orchestrator()).await?;
        self.describe(&current).await
    }

    /// Queries the aggregator once and applies a changed status. Returns the
    /// payment as it stands afterwards.
    pub async fn refresh(&self, payment: Payment, actor: Actor) -> Result<Payment, PaymentError> {
        let channel = self.channel_of(&payment).await?;
        let aggregator_id = payment
            .aggregator_id
            .ok_or_else(|| PaymentError::NotFound("aggregator".to_string()))?;
        let configuration = self
            .store
            .find_configuration(payment.platform_id, aggregator_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("platform configuration".to_string()))?;
        let (family, adapter) = self.registry.resolve_for(&configuration.aggregator_slug, &channel)?;

        let query = StatusQuery {
            order_id: payment.order_id.clone(),
            transaction_id: payment.transaction_id.clone(),
            reference_id: payment.gateway_reference.clone(),
            bank_code: channel.bank_code.clone(),
        };
        let raw = adapter.check_status(&configuration.credentials(), &query).await?;
        let status = adapter.map_status(&payment, &raw)?;
        if status == payment.status {
            return Ok(payment);
        }

        let change = StatusChange::new(payment.id, status, family.as_str(), raw.raw, actor)
            .with_reference(raw.reference_id)
            .with_note(format!("status check reported {}", raw.status));
        match self.store.apply_status_change(&change).await? {
            Some(updated) => {
                info!(
                    transaction_id = %updated.transaction_id,
                    from = payment.status.as_str(),
                    to = updated.status.as_str(),
                    "payment status reconciled"
                );
                self.notifier.spawn(updated.clone());
                Ok(updated)
            }
            None => self
                .store
                .find_by_transaction_id(&payment.transaction_id)
                .await?
                .ok_or_else(|| PaymentError::NotFound("payment".to_string())),
        }
    }

    /// Pending payments past `expired_at` become EXPIRED.
    pub async fn expire_overdue(&self, now: DateTime<Utc>, limit: i64) -> Result<usize, PaymentError> {
        let mut expired = 0;
        for payment in self.store.list_overdue(now, limit).await? {
            let change = StatusChange::new(
                payment.id,
                PaymentStatus::Expired,
                "expiry",
                json!({ "expiredAt": payment.expired_at }),
                Actor::reconciler(),
            )
            .with_note("payment window elapsed");
            if let Some(updated) = self.store.apply_status_change(&change).await? {
                info!(transaction_id = %updated.transaction_id, "payment expired");
                self.notifier.spawn(updated);
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// One sweep of the background reconciler.
    pub async fn run_once(&self, stale_after: Duration, batch: i64) -> Result<ReconcileSummary, PaymentError> {
        let now = Utc::now();
        let mut summary = ReconcileSummary::default();
        for payment in self.store.list_stale(now - stale_after, batch).await? {
            summary.checked += 1;
            let before = payment.status;
            let transaction_id = payment.transaction_id.clone();
            match self.refresh(payment, Actor::reconciler()).await {
                Ok(after) if after.status != before => summary.changed += 1,
                Ok(_) => {}
                Err(e) => {
                    summary.failed += 1;
                    warn!(transaction_id = %transaction_id, error = %e, "status check failed");
                }
            }
        }
        match self.expire_overdue(now, batch).await {
            Ok(n) => summary.expired = n,
            Err(e) => error!(error = %e, "expiring overdue payments failed"),
        }
        Ok(summary)
    }
}
