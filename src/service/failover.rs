use crate::domain::audit::{Actor, StatusChange};
use crate::domain::canonical::CanonicalResponse;
use crate::domain::configuration::GatewayConfiguration;
use crate::domain::context::PaymentContext;
use crate::domain::payment::{NewPayment, Payment, PaymentStatus};
use crate::error::PaymentError;
use crate::fee;
use crate::gateways::registry::AdapterRegistry;
use crate::gateways::{GatewayAdapter, GatewayRequest};
use crate::service::store::{FinalizedAttempt, PaymentStore};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Drives one gateway-backed charge across the platform's configurations,
/// strictly one aggregator at a time.
#[derive(Clone)]
pub struct FailoverOrchestrator {
    pub store: Arc<dyn PaymentStore>,
    pub registry: Arc<AdapterRegistry>,
    pub va_expiry_minutes: i64,
}

impl FailoverOrchestrator {
    pub async fn execute(&self, ctx: &PaymentContext) -> Result<CanonicalResponse, PaymentError> {
        let configurations = self
            .store
            .list_configurations(ctx.platform.id, ctx.channel.currency)
            .await?;
        if configurations.is_empty() {
            return Err(PaymentError::NotFound("platform configuration".to_string()));
        }

        let transaction_id = Uuid::new_v4().to_string();
        let mut payment: Option<Payment> = None;

        for (attempt, configuration) in configurations.iter().enumerate() {
            let breakdown = fee::calculate(ctx.amount, &ctx.channel.fee_policy);
            let current = match payment.take() {
                None => {
                    self.store
                        .insert_pending(&new_payment(ctx, &transaction_id, configuration, breakdown))
                        .await?
                }
                Some(mut p) => {
                    if let Err(e) = self
                        .store
                        .update_attempt(p.id, configuration.aggregator_id, breakdown.fee, breakdown.total)
                        .await
                    {
                        let payload = json!({ "aggregator": configuration.aggregator_slug, "error": e.to_string() });
                        return Err(self.abandon(p.id, payload, e.into()).await);
                    }
                    p.aggregator_id = Some(configuration.aggregator_id);
                    p.fee_amount = breakdown.fee;
                    p.total_amount = breakdown.total;
                    p
                }
            };
            info!(
                transaction_id = %transaction_id,
                attempt,
                aggregator = %configuration.aggregator_slug,
                "payment attempt started"
            );

            let adapter = match self.registry.resolve_for(&configuration.aggregator_slug, &ctx.channel) {
                Ok((_, adapter)) => adapter,
                Err(e) => {
                    error!(aggregator = %configuration.aggregator_slug, error = %e, "no adapter for configuration");
                    payment = Some(current);
                    continue;
                }
            };

            let request = self.request_for(ctx, &current, configuration);
            match adapter.pay(&configuration.credentials(), &request).await {
                Ok(reply) => {
                    let payment_id = current.id;
                    let raw = reply.raw;
                    let response = match self
                        .finalize(ctx, adapter.as_ref(), current, raw.clone(), breakdown, request.requested_at)
                        .await
                    {
                        Ok(response) => response,
                        Err(e) => return Err(self.abandon(payment_id, raw, e).await),
                    };
                    info!(
                        transaction_id = %transaction_id,
                        aggregator = %configuration.aggregator_slug,
                        "payment created"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        transaction_id = %transaction_id,
                        attempt,
                        aggregator = %configuration.aggregator_slug,
                        kind = e.kind(),
                        error = %e,
                        "aggregator attempt failed"
                    );
                    payment = Some(current);
                }
            }
        }

        if let Some(p) = payment {
            self.store
                .mark_exhausted(p.id, ctx.channel.id, &Actor::orchestrator())
                .await?;
        }
        error!(
            transaction_id = %transaction_id,
            channel_id = ctx.channel.id,
            "every aggregator failed, channel deactivated"
        );
        Err(PaymentError::Exhausted)
    }

    /// Moves a payment whose charge cannot continue to FAILED, with the last
    /// payload as its callback row, and hands back the original error.
    async fn abandon(&self, payment_id: i64, payload: serde_json::Value, err: PaymentError) -> PaymentError {
        let change = StatusChange::new(payment_id, PaymentStatus::Failed, "orchestrator", payload, Actor::orchestrator())
            .with_note(err.to_string());
        match self.store.apply_status_change(&change).await {
            Ok(_) => error!(payment_id, error = %err, "payment abandoned"),
            Err(e) => error!(payment_id, error = %err, record_error = %e, "payment abandoned without audit rows"),
        }
        err
    }

    fn request_for(&self, ctx: &PaymentContext, payment: &Payment, configuration: &GatewayConfiguration) -> GatewayRequest {
        let return_url = ctx
            .return_url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| configuration.config_json.return_url.clone());
        GatewayRequest {
            transaction_id: payment.transaction_id.clone(),
            order_id: payment.order_id.clone(),
            amount: payment.amount,
            fee: payment.fee_amount,
            total: payment.total_amount,
            currency: payment.currency,
            customer: payment.customer.clone(),
            bank_code: ctx.channel.bank_code.clone(),
            product_code: ctx.channel.product_code.clone(),
            product_name: ctx.channel.product_name.clone(),
            expiry_minutes: self.va_expiry_minutes,
            return_url,
            rq_uuid: Uuid::new_v4().to_string(),
            requested_at: Utc::now(),
        }
    }

    async fn finalize(
        &self,
        ctx: &PaymentContext,
        adapter: &dyn GatewayAdapter,
        mut payment: Payment,
        raw: serde_json::Value,
        breakdown: fee::FeeBreakdown,
        requested_at: DateTime<Utc>,
    ) -> Result<CanonicalResponse, PaymentError> {
        payment.gateway_response = Some(raw.clone());
        let draft = adapter
            .map_to_canonical(&ctx.channel, &payment)
            .map_err(|e| PaymentError::Internal(format!("cannot read aggregator response: {e}")))?;
        let expired_at = parse_expiry(&draft.payment_detail.expire_time)
            .unwrap_or_else(|| requested_at + Duration::minutes(self.va_expiry_minutes));

        let stored = self
            .store
            .finalize_attempt(
                payment.id,
                &FinalizedAttempt {
                    gateway_response: raw,
                    fee: breakdown.fee,
                    total: breakdown.total,
                    expired_at: Some(expired_at),
                },
            )
            .await?;
        Ok(adapter.map_to_canonical(&ctx.channel, &stored)?)
    }
}

fn new_payment(
    ctx: &PaymentContext,
    transaction_id: &str,
    configuration: &GatewayConfiguration,
    breakdown: fee::FeeBreakdown,
) -> NewPayment {
    NewPayment {
        transaction_id: transaction_id.to_string(),
        order_id: ctx.order_id.clone(),
        platform_id: ctx.platform.id,
        channel_id: ctx.channel.id,
        aggregator_id: Some(configuration.aggregator_id),
        amount: ctx.amount,
        fee_amount: breakdown.fee,
        total_amount: breakdown.total,
        currency: ctx.channel.currency,
        status: PaymentStatus::Pending,
        customer: ctx.customer.clone(),
        reference_id: ctx.reference_id.clone(),
        reference_type: ctx.reference_type.clone(),
        gateway_reference: None,
        gateway_response: None,
        return_url: ctx.return_url.clone(),
        paid_at: None,
    }
}

/// Aggregators report expiry either as RFC 3339 or as Jakarta wall-clock
/// `YYYY-MM-DD HH:MM:SS`.
pub fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok()?;
    let offset = chrono::FixedOffset::east_opt(7 * 3600)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_expiry_is_jakarta_time() {
        let t = parse_expiry("2024-05-01 10:00:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-05-01T03:00:00+00:00");
    }

    #[test]
    fn blank_expiry_is_none() {
        assert!(parse_expiry("").is_none());
        assert!(parse_expiry("tomorrow").is_none());
    }
}
