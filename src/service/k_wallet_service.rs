use crate::domain::canonical::{base_response, CanonicalResponse, PaymentDetail};
use crate::domain::channel::Channel;
use crate::domain::context::PaymentContext;
use crate::domain::payment::{Currency, NewPayment, Payment, PaymentStatus, PaymentType};
use crate::domain::wallet::{account_numbers, KWallet, LedgerEntry, WalletStatus, WalletVirtualAccount, WalletCharge};
use crate::error::PaymentError;
use crate::fee;
use crate::gateways::espay::{create_static_va, StaticVaRequest};
use crate::gateways::{str_field, HttpTransport};
use crate::gateways::registry::AggregatorFamily;
use crate::service::store::PaymentStore;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const RECENT_ENTRIES: i64 = 20;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub member_id: String,
    pub full_name: String,
    pub currency: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    #[serde(flatten)]
    pub wallet: KWallet,
    pub symbol: &'static str,
    pub transactions: Vec<LedgerEntry>,
}

/// Canonical response of a wallet-funded payment. The account number
/// stands in for the virtual-account number.
pub fn wallet_response(payment: &Payment, channel: &Channel) -> CanonicalResponse {
    let no_rekening = payment
        .gateway_response
        .as_ref()
        .map(|v| str_field(v, "noRekening").to_string())
        .unwrap_or_default();
    base_response(
        payment,
        channel,
        PaymentType::Va,
        PaymentDetail {
            va_number: no_rekening,
            transaction_time: payment.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ..Default::default()
        },
    )
}

#[derive(Clone)]
pub struct KWalletService {
    pub store: Arc<dyn PaymentStore>,
    pub transport: HttpTransport,
}

impl KWalletService {
    pub async fn create_wallet(&self, req: CreateWalletRequest) -> Result<KWallet, PaymentError> {
        if req.member_id.trim().is_empty() || req.full_name.trim().is_empty() {
            return Err(PaymentError::Validation("memberId and fullName are required".to_string()));
        }
        let currency = Currency::parse(&req.currency)
            .ok_or_else(|| PaymentError::Validation(format!("unsupported currency {}", req.currency)))?;
        if self.store.wallet_exists(&req.member_id, currency).await? {
            return Err(PaymentError::Validation(format!(
                "member {} already has a {} k-wallet",
                req.member_id,
                currency.as_str()
            )));
        }

        let now = Utc::now();
        let sequence = self.store.next_wallet_sequence().await?;
        let (no_rekening, gen_va) = account_numbers(sequence, now);
        let virtual_accounts = match currency {
            Currency::Idr => self.static_virtual_accounts(&req, &gen_va).await?,
            Currency::Myr => Vec::new(),
        };

        let wallet = self
            .store
            .create_wallet(&KWallet {
                id: 0,
                member_id: req.member_id.clone(),
                full_name: req.full_name.clone(),
                no_rekening,
                gen_va,
                balance: Decimal::ZERO,
                currency,
                status: WalletStatus::Active,
                version: 0,
                virtual_accounts,
            })
            .await?;
        info!(wallet_id = wallet.id, member_id = %wallet.member_id, "k-wallet created");
        Ok(wallet)
    }

    async fn static_virtual_accounts(
        &self,
        req: &CreateWalletRequest,
        gen_va: &str,
    ) -> Result<Vec<WalletVirtualAccount>, PaymentError> {
        let configuration = self
            .store
            .find_configuration_by_slug(AggregatorFamily::Espay.as_str(), Currency::Idr)
            .await?
            .ok_or_else(|| PaymentError::NotFound("espay configuration".to_string()))?;
        let list = create_static_va(
            &self.transport,
            &configuration.credentials(),
            &StaticVaRequest {
                rq_uuid: Uuid::new_v4().to_string(),
                requested_at: Utc::now(),
                gen_va: gen_va.to_string(),
                currency: Currency::Idr.as_str().to_string(),
                customer_name: req.full_name.clone(),
                customer_email: req.email.clone(),
                customer_phone: req.phone.clone(),
                bank_code: String::new(),
            },
        )
        .await?;
        let mut accounts: Vec<_> = list
            .into_iter()
            .map(|(bank, va)| WalletVirtualAccount {
                bank,
                bank_code: va.bank_code,
                virtual_account: va.va_number,
            })
            .collect();
        accounts.sort_by(|a, b| a.bank.cmp(&b.bank));
        Ok(accounts)
    }

    pub async fn lookup(&self, no_rekening: &str) -> Result<WalletSummary, PaymentError> {
        let wallet = self
            .store
            .find_wallet(no_rekening)
            .await?
            .ok_or_else(|| PaymentError::NotFound("k-wallet".to_string()))?;
        let transactions = self.store.recent_entries(wallet.id, RECENT_ENTRIES).await?;
        Ok(WalletSummary {
            symbol: wallet.currency.symbol(),
            wallet,
            transactions,
        })
    }

    /// Debits the wallet for one planned charge. `intent_total` is the full
    /// amount of the intent the charge belongs to.
    pub async fn pay(&self, ctx: &PaymentContext, intent_total: Decimal) -> Result<CanonicalResponse, PaymentError> {
        let no_rekening = ctx
            .no_rekening
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| PaymentError::Validation("noRekening is required for k-wallet".to_string()))?;
        let breakdown = fee::calculate(ctx.amount, &ctx.channel.fee_policy);
        let charge = WalletCharge {
            no_rekening,
            amount: ctx.amount,
            total: breakdown.total,
            intent_total,
            split: ctx.split,
            payment: NewPayment {
                transaction_id: Uuid::new_v4().to_string(),
                order_id: ctx.order_id.clone(),
                platform_id: ctx.platform.id,
                channel_id: ctx.channel.id,
                aggregator_id: None,
                amount: ctx.amount,
                fee_amount: breakdown.fee,
                total_amount: breakdown.total,
                currency: ctx.channel.currency,
                status: PaymentStatus::Success,
                customer: ctx.customer.clone(),
                reference_id: ctx.reference_id.clone(),
                reference_type: ctx.reference_type.clone(),
                gateway_reference: Some(ctx.platform.name.clone()),
                gateway_response: None,
                return_url: ctx.return_url.clone(),
                paid_at: None,
            },
        };
        let (payment, _) = self.store.pay_with_wallet(&charge).await?;
        Ok(wallet_response(&payment, &ctx.channel))
    }
}
