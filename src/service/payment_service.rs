use crate::domain::canonical::CanonicalResponse;
use crate::domain::channel::Channel;
use crate::domain::context::{build_context, plan_charges, PlannedCharge};
use crate::domain::payment::{CreatePaymentRequest, Payment, PaymentIntent};
use crate::domain::platform::Platform;
use crate::error::PaymentError;
use crate::repo::query_builder::{ListPaymentsQuery, PaymentFilter};
use crate::service::failover::FailoverOrchestrator;
use crate::service::k_wallet_service::KWalletService;
use crate::service::reconciliation::Reconciler;
use crate::service::store::PaymentStore;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPage {
    pub payments: Vec<Payment>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Entry point for platform requests: intake validation, then the wallet
/// path or the failover orchestrator per planned charge.
#[derive(Clone)]
pub struct PaymentService {
    pub store: Arc<dyn PaymentStore>,
    pub failover: FailoverOrchestrator,
    pub wallet: KWalletService,
    pub reconciler: Reconciler,
}

struct ResolvedCharge<'a> {
    intent: &'a PaymentIntent,
    charge: PlannedCharge,
    channel: Channel,
}

impl PaymentService {
    /// Every intent is validated and its channels resolved before any money
    /// moves.
    pub async fn create(
        &self,
        platform: &Platform,
        req: CreatePaymentRequest,
    ) -> Result<Vec<CanonicalResponse>, PaymentError> {
        if req.payments.is_empty() {
            return Err(PaymentError::Validation("payments must not be empty".to_string()));
        }

        let mut planned = Vec::new();
        for intent in &req.payments {
            for charge in plan_charges(intent)? {
                let channel = self
                    .store
                    .find_channel(platform.id, charge.channel_id)
                    .await?
                    .ok_or_else(|| PaymentError::NotFound(format!("channel {}", charge.channel_id)))?;
                if !channel.is_active {
                    return Err(PaymentError::Validation(format!("channel {} is not active", channel.code)));
                }
                if channel.is_wallet() && charge.no_rekening.as_deref().map_or(true, str::is_empty) {
                    return Err(PaymentError::Validation("noRekening is required for k-wallet".to_string()));
                }
                planned.push(ResolvedCharge { intent, charge, channel });
            }
        }

        let mut responses = Vec::with_capacity(planned.len());
        for item in &planned {
            let ctx = build_context(&req, item.intent, &item.charge, platform, &item.channel);
            let response = if item.channel.is_wallet() {
                self.wallet.pay(&ctx, Decimal::from(item.intent.amount)).await?
            } else {
                self.failover.execute(&ctx).await?
            };
            info!(
                platform = %platform.code,
                order_id = %response.order_id,
                transaction_id = %response.transaction_id,
                status = response.status.as_str(),
                "payment accepted"
            );
            responses.push(response);
        }
        Ok(responses)
    }

    pub async fn check_status(&self, platform: &Platform, transaction_id: &str) -> Result<CanonicalResponse, PaymentError> {
        if transaction_id.trim().is_empty() {
            return Err(PaymentError::Validation("transactionId is required".to_string()));
        }
        self.reconciler.check_status(platform.id, transaction_id).await
    }

    pub async fn detail(&self, platform: &Platform, transaction_id: &str) -> Result<CanonicalResponse, PaymentError> {
        let payment = self
            .store
            .find_by_transaction_id(transaction_id)
            .await?
            .filter(|p| p.platform_id == platform.id)
            .ok_or_else(|| PaymentError::NotFound("payment".to_string()))?;
        self.reconciler.describe(&payment).await
    }

    pub async fn list(&self, platform: &Platform, query: &ListPaymentsQuery) -> Result<PaymentPage, PaymentError> {
        let filter = PaymentFilter::from_query(platform.id, query)?;
        let (payments, total) = self.store.list_payments(&filter).await?;
        Ok(PaymentPage {
            payments,
            total,
            page: filter.page,
            per_page: filter.per_page,
        })
    }
}
