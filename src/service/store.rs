use crate::domain::audit::{Actor, StatusChange};
use crate::domain::channel::Channel;
use crate::domain::configuration::GatewayConfiguration;
use crate::domain::payment::{Currency, NewPayment, Payment, PaymentStatus};
use crate::domain::payment::PaymentMethod;
use crate::domain::platform::Platform;
use crate::domain::wallet::{authorize_charge, plan_credit, snapshot, KWallet, LedgerEntry, TopupCommand, WalletCharge};
use crate::error::PaymentError;
use crate::repo::audit_repo::AuditRepo;
use crate::repo::channels_repo::ChannelsRepo;
use crate::repo::configurations_repo::ConfigurationsRepo;
use crate::repo::k_wallet_repo::KWalletRepo;
use crate::repo::payments_repo::PaymentsRepo;
use crate::repo::platforms_repo::PlatformsRepo;
use crate::repo::query_builder::PaymentFilter;
use crate::repo::topup_repo::TopupRepo;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;

/// Outcome of a successful aggregator call, written onto the payment.
#[derive(Debug, Clone)]
pub struct FinalizedAttempt {
    pub gateway_response: serde_json::Value,
    pub fee: Decimal,
    pub total: Decimal,
    pub expired_at: Option<DateTime<Utc>>,
}

/// Persistence seam of the orchestration core. Every method that spans
/// more than one row is a single atomic unit in the implementation.
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync {
    async fn list_configurations(
        &self,
        platform_id: i64,
        currency: Currency,
    ) -> anyhow::Result<Vec<GatewayConfiguration>>;

    async fn find_configuration(
        &self,
        platform_id: i64,
        aggregator_id: i64,
    ) -> anyhow::Result<Option<GatewayConfiguration>>;

    async fn find_configuration_by_slug(
        &self,
        slug: &str,
        currency: Currency,
    ) -> anyhow::Result<Option<GatewayConfiguration>>;

    /// Channel as offered to one platform.
    async fn find_channel(&self, platform_id: i64, channel_id: i64) -> anyhow::Result<Option<Channel>>;

    async fn find_channel_by_id(&self, channel_id: i64) -> anyhow::Result<Option<Channel>>;

    async fn find_channel_by_bank_code(
        &self,
        method: PaymentMethod,
        bank_code: &str,
        currency: Currency,
    ) -> anyhow::Result<Option<Channel>>;

    async fn find_platform_by_api_key(&self, api_key: &str) -> anyhow::Result<Option<Platform>>;

    async fn find_platform(&self, platform_id: i64) -> anyhow::Result<Option<Platform>>;

    async fn insert_pending(&self, payment: &NewPayment) -> anyhow::Result<Payment>;

    async fn update_attempt(
        &self,
        payment_id: i64,
        aggregator_id: i64,
        fee: Decimal,
        total: Decimal,
    ) -> anyhow::Result<()>;

    async fn finalize_attempt(&self, payment_id: i64, attempt: &FinalizedAttempt) -> anyhow::Result<Payment>;

    /// Marks the payment failed, deactivates the channel and records history.
    async fn mark_exhausted(&self, payment_id: i64, channel_id: i64, actor: &Actor) -> anyhow::Result<()>;

    async fn find_by_transaction_id(&self, transaction_id: &str) -> anyhow::Result<Option<Payment>>;

    async fn find_by_order_id(&self, order_id: &str) -> anyhow::Result<Option<Payment>>;

    /// Payment update, callback row and history row in one unit. Returns
    /// `None` when the payment had already reached a terminal state.
    async fn apply_status_change(&self, change: &StatusChange) -> anyhow::Result<Option<Payment>>;

    async fn mark_notified(&self, payment_id: i64) -> anyhow::Result<()>;

    async fn list_stale(&self, before: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Payment>>;

    async fn list_overdue(&self, now: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Payment>>;

    /// One page of rows plus the total count for the same filter.
    async fn list_payments(&self, filter: &PaymentFilter) -> anyhow::Result<(Vec<Payment>, i64)>;

    async fn next_wallet_sequence(&self) -> anyhow::Result<i64>;

    async fn wallet_exists(&self, member_id: &str, currency: Currency) -> anyhow::Result<bool>;

    /// Inserts the wallet and its virtual accounts together.
    async fn create_wallet(&self, wallet: &KWallet) -> anyhow::Result<KWallet>;

    async fn find_wallet(&self, no_rekening: &str) -> anyhow::Result<Option<KWallet>>;

    async fn recent_entries(&self, wallet_id: i64, limit: i64) -> anyhow::Result<Vec<LedgerEntry>>;

    /// Debit, ledger entry and payment row in one unit, serialized per wallet.
    async fn pay_with_wallet(&self, charge: &WalletCharge) -> Result<(Payment, KWallet), PaymentError>;

    /// Credit, ledger entry and top-up record in one unit.
    async fn topup(&self, command: &TopupCommand) -> Result<(KWallet, LedgerEntry), PaymentError>;
}

#[derive(Clone)]
pub struct PgPaymentStore {
    pub pool: PgPool,
    pub payments: PaymentsRepo,
    pub configurations: ConfigurationsRepo,
    pub channels: ChannelsRepo,
    pub platforms: PlatformsRepo,
    pub wallets: KWalletRepo,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            payments: PaymentsRepo { pool: pool.clone() },
            configurations: ConfigurationsRepo { pool: pool.clone() },
            channels: ChannelsRepo { pool: pool.clone() },
            platforms: PlatformsRepo { pool: pool.clone() },
            wallets: KWalletRepo { pool: pool.clone() },
            pool,
        }
    }
}

#[async_trait::async_trait]
impl PaymentStore for PgPaymentStore {
    async fn list_configurations(
        &self,
        platform_id: i64,
        currency: Currency,
    ) -> anyhow::Result<Vec<GatewayConfiguration>> {
        self.configurations.list_active(platform_id, currency).await
    }

    async fn find_configuration(
        &self,
        platform_id: i64,
        aggregator_id: i64,
    ) -> anyhow::Result<Option<GatewayConfiguration>> {
        self.configurations.find(platform_id, aggregator_id).await
    }

    async fn find_configuration_by_slug(
        &self,
        slug: &str,
        currency: Currency,
    ) -> anyhow::Result<Option<GatewayConfiguration>> {
        self.configurations.find_by_slug(slug, currency).await
    }

    async fn find_channel(&self, platform_id: i64, channel_id: i64) -> anyhow::Result<Option<Channel>> {
        self.channels.find_for_platform(platform_id, channel_id).await
    }

    async fn find_channel_by_id(&self, channel_id: i64) -> anyhow::Result<Option<Channel>> {
        self.channels.find_by_id(channel_id).await
    }

    async fn find_channel_by_bank_code(
        &self,
        method: PaymentMethod,
        bank_code: &str,
        currency: Currency,
    ) -> anyhow::Result<Option<Channel>> {
        self.channels.find_by_bank_code(method, bank_code, currency).await
    }

    async fn find_platform_by_api_key(&self, api_key: &str) -> anyhow::Result<Option<Platform>> {
        self.platforms.find_by_api_key(api_key).await
    }

    async fn find_platform(&self, platform_id: i64) -> anyhow::Result<Option<Platform>> {
        self.platforms.find_by_id(platform_id).await
    }

    async fn insert_pending(&self, payment: &NewPayment) -> anyhow::Result<Payment> {
        self.payments.insert(payment).await
    }

    async fn update_attempt(
        &self,
        payment_id: i64,
        aggregator_id: i64,
        fee: Decimal,
        total: Decimal,
    ) -> anyhow::Result<()> {
        self.payments.update_attempt(payment_id, aggregator_id, fee, total).await
    }

    async fn finalize_attempt(&self, payment_id: i64, attempt: &FinalizedAttempt) -> anyhow::Result<Payment> {
        self.payments
            .finalize_attempt(
                payment_id,
                &attempt.gateway_response,
                attempt.fee,
                attempt.total,
                attempt.expired_at,
            )
            .await
    }

    async fn mark_exhausted(&self, payment_id: i64, channel_id: i64, actor: &Actor) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        let failed = PaymentsRepo::transition_tx(&mut tx, payment_id, PaymentStatus::Failed, None, None).await?;
        if failed.is_some() {
            AuditRepo::insert_history_tx(
                &mut tx,
                payment_id,
                PaymentStatus::Failed,
                "all aggregator configurations failed",
                actor,
            )
            .await?;
        }
        ChannelsRepo::deactivate_tx(&mut tx, channel_id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> anyhow::Result<Option<Payment>> {
        self.payments.find_by_transaction_id(transaction_id).await
    }

    async fn find_by_order_id(&self, order_id: &str) -> anyhow::Result<Option<Payment>> {
        self.payments.find_by_order_id(order_id).await
    }

    async fn apply_status_change(&self, change: &StatusChange) -> anyhow::Result<Option<Payment>> {
        let mut tx = self.pool.begin().await?;
        let Some(updated) = PaymentsRepo::transition_tx(
            &mut tx,
            change.payment_id,
            change.status,
            change.paid_at,
            change.reference_id.as_deref(),
        )
        .await?
        else {
            return Ok(None);
        };
        AuditRepo::insert_callback_tx(&mut tx, change.payment_id, &change.source, change.status, &change.payload)
            .await?;
        AuditRepo::insert_history_tx(&mut tx, change.payment_id, change.status, &change.note, &change.actor)
            .await?;
        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn mark_notified(&self, payment_id: i64) -> anyhow::Result<()> {
        self.payments.mark_notified(payment_id).await
    }

    async fn list_stale(&self, before: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Payment>> {
        self.payments.list_stale(before, limit).await
    }

    async fn list_overdue(&self, now: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Payment>> {
        self.payments.list_overdue(now, limit).await
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> anyhow::Result<(Vec<Payment>, i64)> {
        tokio::try_join!(self.payments.list(filter), self.payments.count(filter))
    }

    async fn next_wallet_sequence(&self) -> anyhow::Result<i64> {
        self.wallets.next_sequence().await
    }

    async fn wallet_exists(&self, member_id: &str, currency: Currency) -> anyhow::Result<bool> {
        self.wallets.exists(member_id, currency).await
    }

    async fn create_wallet(&self, wallet: &KWallet) -> anyhow::Result<KWallet> {
        let mut tx = self.pool.begin().await?;
        let id = KWalletRepo::insert_tx(&mut tx, wallet).await?;
        for va in &wallet.virtual_accounts {
            KWalletRepo::insert_virtual_account_tx(&mut tx, id, va).await?;
        }
        tx.commit().await?;
        Ok(KWallet { id, ..wallet.clone() })
    }

    async fn find_wallet(&self, no_rekening: &str) -> anyhow::Result<Option<KWallet>> {
        self.wallets.find_by_no_rekening(no_rekening).await
    }

    async fn recent_entries(&self, wallet_id: i64, limit: i64) -> anyhow::Result<Vec<LedgerEntry>> {
        self.wallets.recent_entries(wallet_id, limit).await
    }

    async fn pay_with_wallet(&self, charge: &WalletCharge) -> Result<(Payment, KWallet), PaymentError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let wallet = KWalletRepo::lock_by_no_rekening_tx(&mut tx, &charge.no_rekening).await?;
        let mutation = authorize_charge(wallet.as_ref(), charge, now)?;
        let Some(mut wallet) = wallet else {
            return Err(PaymentError::Ledger("k-wallet not found".to_string()));
        };

        let mut new_payment = charge.payment.clone();
        new_payment.gateway_response = Some(snapshot(&wallet, mutation.new_balance));
        new_payment.paid_at = Some(now);
        let payment = PaymentsRepo::insert_tx(&mut tx, &new_payment).await?;

        let mut entry = mutation.entry;
        entry.payment_id = Some(payment.id);
        KWalletRepo::insert_entry_tx(&mut tx, &entry).await?;
        KWalletRepo::update_balance_tx(&mut tx, wallet.id, mutation.new_balance, wallet.version).await?;
        AuditRepo::insert_history_tx(&mut tx, payment.id, PaymentStatus::Success, "paid with k-wallet", &Actor::orchestrator())
            .await?;
        tx.commit().await?;

        info!(
            wallet_id = wallet.id,
            payment_id = payment.id,
            balance = %mutation.new_balance,
            "k-wallet debited"
        );
        wallet.balance = mutation.new_balance;
        wallet.version += 1;
        Ok((payment, wallet))
    }

    async fn topup(&self, command: &TopupCommand) -> Result<(KWallet, LedgerEntry), PaymentError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        if TopupRepo::exists_tx(&mut tx, &command.reference_id).await? {
            return Err(PaymentError::Accepted("top-up has already been processed".to_string()));
        }
        let mut wallet = KWalletRepo::lock_by_gen_va_tx(&mut tx, &command.gen_va)
            .await?
            .ok_or_else(|| PaymentError::NotFound("k-wallet".to_string()))?;
        if wallet.currency != command.currency {
            return Err(PaymentError::Validation("top-up currency does not match the k-wallet".to_string()));
        }
        let mutation = plan_credit(&wallet, command.amount, command.fee, &command.transaction_code, now)?;
        let topup_id = TopupRepo::insert_tx(&mut tx, &command.record(&wallet, now)).await?;

        let mut entry = mutation.entry;
        entry.topup_id = Some(topup_id);
        KWalletRepo::insert_entry_tx(&mut tx, &entry).await?;
        KWalletRepo::update_balance_tx(&mut tx, wallet.id, mutation.new_balance, wallet.version).await?;
        tx.commit().await?;

        info!(wallet_id = wallet.id, topup_id, balance = %mutation.new_balance, "k-wallet topped up");
        wallet.balance = mutation.new_balance;
        wallet.version += 1;
        Ok((wallet, entry))
    }
}
