//! In-process `PaymentStore` used by the integration tests and local demos.
//! Each multi-row operation runs under one lock, so it is all-or-nothing in
//! the same way as the Postgres transactions.

use crate::domain::audit::{Actor, StatusChange};
use crate::domain::channel::Channel;
use crate::domain::configuration::GatewayConfiguration;
use crate::domain::payment::{Currency, NewPayment, Payment, PaymentMethod, PaymentStatus};
use crate::domain::platform::Platform;
use crate::domain::wallet::{
    authorize_charge, plan_credit, snapshot, KWallet, LedgerEntry, TopupCommand, TopupTransaction, WalletCharge,
};
use crate::error::PaymentError;
use crate::repo::query_builder::PaymentFilter;
use crate::service::store::{FinalizedAttempt, PaymentStore};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct CallbackRow {
    pub payment_id: i64,
    pub source: String,
    pub status: PaymentStatus,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub payment_id: i64,
    pub status: PaymentStatus,
    pub note: String,
    pub actor: Actor,
}

#[derive(Default, Clone)]
struct Tables {
    platforms: Vec<Platform>,
    configurations: Vec<GatewayConfiguration>,
    channels: Vec<Channel>,
    platform_channels: HashSet<(i64, i64)>,
    payments: Vec<Payment>,
    callbacks: Vec<CallbackRow>,
    history: Vec<HistoryRow>,
    wallets: Vec<KWallet>,
    entries: Vec<LedgerEntry>,
    topups: Vec<TopupTransaction>,
    wallet_sequence: i64,
}

impl Tables {
    fn payment_mut(&mut self, id: i64) -> anyhow::Result<&mut Payment> {
        self.payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow!("payment {id} not found"))
    }

    fn insert_payment(&mut self, data: &NewPayment) -> anyhow::Result<Payment> {
        if self.payments.iter().any(|p| p.transaction_id == data.transaction_id) {
            return Err(anyhow!("duplicate transaction id {}", data.transaction_id));
        }
        let now = Utc::now();
        let payment = Payment {
            id: self.payments.len() as i64 + 1,
            transaction_id: data.transaction_id.clone(),
            order_id: data.order_id.clone(),
            platform_id: data.platform_id,
            channel_id: data.channel_id,
            aggregator_id: data.aggregator_id,
            amount: data.amount,
            fee_amount: data.fee_amount,
            total_amount: data.total_amount,
            currency: data.currency,
            status: data.status,
            customer: data.customer.clone(),
            reference_id: data.reference_id.clone(),
            reference_type: data.reference_type.clone(),
            gateway_reference: data.gateway_reference.clone(),
            gateway_response: data.gateway_response.clone(),
            return_url: data.return_url.clone(),
            expired_at: None,
            paid_at: data.paid_at,
            notification_sent: false,
            created_at: now,
            updated_at: now,
        };
        self.payments.push(payment.clone());
        Ok(payment)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_ledger_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_platform(&self, platform: Platform) {
        self.tables.lock().await.platforms.push(platform);
    }

    pub async fn add_configuration(&self, configuration: GatewayConfiguration) {
        self.tables.lock().await.configurations.push(configuration);
    }

    /// Registers the channel and offers it to `platform_id`.
    pub async fn add_channel(&self, platform_id: i64, channel: Channel) {
        let mut t = self.tables.lock().await;
        t.platform_channels.insert((platform_id, channel.id));
        t.channels.push(channel);
    }

    pub async fn add_wallet(&self, wallet: KWallet) -> KWallet {
        let mut t = self.tables.lock().await;
        let stored = KWallet {
            id: t.wallets.len() as i64 + 1,
            ..wallet
        };
        t.wallets.push(stored.clone());
        stored
    }

    /// Makes wallet operations fail after every row was written to the
    /// staged tables, so the commit at the end never happens.
    pub fn fail_ledger_writes(&self, fail: bool) {
        self.fail_ledger_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.tables.lock().await.payments.clone()
    }

    pub async fn channel(&self, channel_id: i64) -> Option<Channel> {
        self.tables.lock().await.channels.iter().find(|c| c.id == channel_id).cloned()
    }

    pub async fn wallet(&self, no_rekening: &str) -> Option<KWallet> {
        self.tables
            .lock()
            .await
            .wallets
            .iter()
            .find(|w| w.no_rekening == no_rekening)
            .cloned()
    }

    pub async fn entries(&self, wallet_id: i64) -> Vec<LedgerEntry> {
        self.tables
            .lock()
            .await
            .entries
            .iter()
            .filter(|e| e.k_wallet_id == wallet_id)
            .cloned()
            .collect()
    }

    pub async fn topups(&self) -> Vec<TopupTransaction> {
        self.tables.lock().await.topups.clone()
    }

    pub async fn history(&self, payment_id: i64) -> Vec<HistoryRow> {
        self.tables
            .lock()
            .await
            .history
            .iter()
            .filter(|h| h.payment_id == payment_id)
            .cloned()
            .collect()
    }

    pub async fn callbacks(&self, payment_id: i64) -> Vec<CallbackRow> {
        self.tables
            .lock()
            .await
            .callbacks
            .iter()
            .filter(|c| c.payment_id == payment_id)
            .cloned()
            .collect()
    }

    /// Rewinds `updated_at` so the payment looks stale to the reconciler.
    pub async fn age_payment(&self, payment_id: i64, by: chrono::Duration) {
        let mut t = self.tables.lock().await;
        if let Ok(p) = t.payment_mut(payment_id) {
            p.updated_at -= by;
        }
    }

    pub async fn set_expiry(&self, payment_id: i64, expired_at: DateTime<Utc>) {
        let mut t = self.tables.lock().await;
        if let Ok(p) = t.payment_mut(payment_id) {
            p.expired_at = Some(expired_at);
        }
    }
}

fn is_open(status: PaymentStatus) -> bool {
    matches!(status, PaymentStatus::Pending | PaymentStatus::Processing)
}

#[async_trait::async_trait]
impl PaymentStore for MemoryStore {
    async fn list_configurations(
        &self,
        platform_id: i64,
        currency: Currency,
    ) -> anyhow::Result<Vec<GatewayConfiguration>> {
        let t = self.tables.lock().await;
        let mut list: Vec<_> = t
            .configurations
            .iter()
            .filter(|c| c.platform_id == platform_id && c.currency == currency && c.is_active)
            .cloned()
            .collect();
        list.sort_by_key(|c| c.id);
        Ok(list)
    }

    async fn find_configuration(
        &self,
        platform_id: i64,
        aggregator_id: i64,
    ) -> anyhow::Result<Option<GatewayConfiguration>> {
        let t = self.tables.lock().await;
        Ok(t.configurations
            .iter()
            .filter(|c| c.platform_id == platform_id && c.aggregator_id == aggregator_id)
            .min_by_key(|c| c.id)
            .cloned())
    }

    async fn find_configuration_by_slug(
        &self,
        slug: &str,
        currency: Currency,
    ) -> anyhow::Result<Option<GatewayConfiguration>> {
        let t = self.tables.lock().await;
        Ok(t.configurations
            .iter()
            .filter(|c| c.aggregator_slug == slug && c.currency == currency && c.is_active)
            .min_by_key(|c| c.id)
            .cloned())
    }

    async fn find_channel(&self, platform_id: i64, channel_id: i64) -> anyhow::Result<Option<Channel>> {
        let t = self.tables.lock().await;
        if !t.platform_channels.contains(&(platform_id, channel_id)) {
            return Ok(None);
        }
        Ok(t.channels.iter().find(|c| c.id == channel_id).cloned())
    }

    async fn find_channel_by_id(&self, channel_id: i64) -> anyhow::Result<Option<Channel>> {
        Ok(self.channel(channel_id).await)
    }

    async fn find_channel_by_bank_code(
        &self,
        method: PaymentMethod,
        bank_code: &str,
        currency: Currency,
    ) -> anyhow::Result<Option<Channel>> {
        let t = self.tables.lock().await;
        Ok(t.channels
            .iter()
            .find(|c| c.payment_method == method && c.bank_code == bank_code && c.currency == currency)
            .cloned())
    }

    async fn find_platform_by_api_key(&self, api_key: &str) -> anyhow::Result<Option<Platform>> {
        let t = self.tables.lock().await;
        Ok(t.platforms.iter().find(|p| p.api_key == api_key).cloned())
    }

    async fn find_platform(&self, platform_id: i64) -> anyhow::Result<Option<Platform>> {
        let t = self.tables.lock().await;
        Ok(t.platforms.iter().find(|p| p.id == platform_id).cloned())
    }

    async fn insert_pending(&self, payment: &NewPayment) -> anyhow::Result<Payment> {
        self.tables.lock().await.insert_payment(payment)
    }

    async fn update_attempt(
        &self,
        payment_id: i64,
        aggregator_id: i64,
        fee: Decimal,
        total: Decimal,
    ) -> anyhow::Result<()> {
        let mut t = self.tables.lock().await;
        let p = t.payment_mut(payment_id)?;
        p.aggregator_id = Some(aggregator_id);
        p.fee_amount = fee;
        p.total_amount = total;
        p.updated_at = Utc::now();
        Ok(())
    }

    async fn finalize_attempt(&self, payment_id: i64, attempt: &FinalizedAttempt) -> anyhow::Result<Payment> {
        let mut t = self.tables.lock().await;
        let p = t.payment_mut(payment_id)?;
        p.gateway_response = Some(attempt.gateway_response.clone());
        p.fee_amount = attempt.fee;
        p.total_amount = attempt.total;
        p.expired_at = attempt.expired_at;
        p.updated_at = Utc::now();
        Ok(p.clone())
    }

    async fn mark_exhausted(&self, payment_id: i64, channel_id: i64, actor: &Actor) -> anyhow::Result<()> {
        let mut t = self.tables.lock().await;
        let p = t.payment_mut(payment_id)?;
        if !p.status.is_terminal() {
            p.status = PaymentStatus::Failed;
            p.updated_at = Utc::now();
            t.history.push(HistoryRow {
                payment_id,
                status: PaymentStatus::Failed,
                note: "all aggregator configurations failed".to_string(),
                actor: actor.clone(),
            });
        }
        if let Some(c) = t.channels.iter_mut().find(|c| c.id == channel_id) {
            c.is_active = false;
        }
        Ok(())
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> anyhow::Result<Option<Payment>> {
        let t = self.tables.lock().await;
        Ok(t.payments.iter().find(|p| p.transaction_id == transaction_id).cloned())
    }

    async fn find_by_order_id(&self, order_id: &str) -> anyhow::Result<Option<Payment>> {
        let t = self.tables.lock().await;
        Ok(t.payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .max_by_key(|p| (is_open(p.status), p.id))
            .cloned())
    }

    async fn apply_status_change(&self, change: &StatusChange) -> anyhow::Result<Option<Payment>> {
        let mut t = self.tables.lock().await;
        let p = t.payment_mut(change.payment_id)?;
        if p.status.is_terminal() {
            return Ok(None);
        }
        p.status = change.status;
        if change.paid_at.is_some() {
            p.paid_at = change.paid_at;
        }
        if change.reference_id.is_some() {
            p.gateway_reference = change.reference_id.clone();
        }
        p.updated_at = Utc::now();
        let updated = p.clone();
        t.callbacks.push(CallbackRow {
            payment_id: change.payment_id,
            source: change.source.clone(),
            status: change.status,
            payload: change.payload.clone(),
        });
        t.history.push(HistoryRow {
            payment_id: change.payment_id,
            status: change.status,
            note: change.note.clone(),
            actor: change.actor.clone(),
        });
        Ok(Some(updated))
    }

    async fn mark_notified(&self, payment_id: i64) -> anyhow::Result<()> {
        let mut t = self.tables.lock().await;
        t.payment_mut(payment_id)?.notification_sent = true;
        Ok(())
    }

    async fn list_stale(&self, before: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Payment>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<_> = t
            .payments
            .iter()
            .filter(|p| is_open(p.status) && p.aggregator_id.is_some() && p.updated_at < before)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.updated_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn list_overdue(&self, now: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Payment>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<_> = t
            .payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Pending && p.expired_at.is_some_and(|e| e < now))
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.expired_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> anyhow::Result<(Vec<Payment>, i64)> {
        let t = self.tables.lock().await;
        let mut rows: Vec<_> = t.payments.iter().filter(|p| filter.matches(p)).cloned().collect();
        let total = rows.len() as i64;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let page = rows
            .into_iter()
            .skip(filter.offset().max(0) as usize)
            .take(filter.per_page.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn next_wallet_sequence(&self) -> anyhow::Result<i64> {
        let mut t = self.tables.lock().await;
        t.wallet_sequence += 1;
        Ok(t.wallet_sequence)
    }

    async fn wallet_exists(&self, member_id: &str, currency: Currency) -> anyhow::Result<bool> {
        let t = self.tables.lock().await;
        Ok(t.wallets.iter().any(|w| w.member_id == member_id && w.currency == currency))
    }

    async fn create_wallet(&self, wallet: &KWallet) -> anyhow::Result<KWallet> {
        let mut t = self.tables.lock().await;
        if t.wallets
            .iter()
            .any(|w| w.member_id == wallet.member_id && w.currency == wallet.currency)
        {
            return Err(anyhow!("k-wallet already exists for member {}", wallet.member_id));
        }
        let stored = KWallet {
            id: t.wallets.len() as i64 + 1,
            ..wallet.clone()
        };
        t.wallets.push(stored.clone());
        Ok(stored)
    }

    async fn find_wallet(&self, no_rekening: &str) -> anyhow::Result<Option<KWallet>> {
        Ok(self.wallet(no_rekening).await)
    }

    async fn recent_entries(&self, wallet_id: i64, limit: i64) -> anyhow::Result<Vec<LedgerEntry>> {
        let mut rows = self.entries(wallet_id).await;
        rows.reverse();
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn pay_with_wallet(&self, charge: &WalletCharge) -> Result<(Payment, KWallet), PaymentError> {
        let now = Utc::now();
        let mut t = self.tables.lock().await;
        let index = t.wallets.iter().position(|w| w.no_rekening == charge.no_rekening);
        let mutation = authorize_charge(index.map(|i| &t.wallets[i]), charge, now)?;
        let Some(index) = index else {
            return Err(PaymentError::Ledger("k-wallet not found".to_string()));
        };

        let mut new_payment = charge.payment.clone();
        new_payment.gateway_response = Some(snapshot(&t.wallets[index], mutation.new_balance));
        new_payment.paid_at = Some(now);

        let mut staged = t.clone();
        let payment = staged.insert_payment(&new_payment)?;
        let mut entry = mutation.entry;
        entry.payment_id = Some(payment.id);
        staged.entries.push(entry);
        let wallet = &mut staged.wallets[index];
        wallet.balance = mutation.new_balance;
        wallet.version += 1;
        let wallet = wallet.clone();
        staged.history.push(HistoryRow {
            payment_id: payment.id,
            status: PaymentStatus::Success,
            note: "paid with k-wallet".to_string(),
            actor: Actor::orchestrator(),
        });
        if self.fail_ledger_writes.load(Ordering::SeqCst) {
            return Err(PaymentError::Internal("ledger write failed".to_string()));
        }
        *t = staged;
        Ok((payment, wallet))
    }

    async fn topup(&self, command: &TopupCommand) -> Result<(KWallet, LedgerEntry), PaymentError> {
        let now = Utc::now();
        let mut t = self.tables.lock().await;
        if t.topups.iter().any(|x| x.reference_id == command.reference_id) {
            return Err(PaymentError::Accepted("top-up has already been processed".to_string()));
        }
        let index = t
            .wallets
            .iter()
            .position(|w| w.gen_va == command.gen_va)
            .ok_or_else(|| PaymentError::NotFound("k-wallet".to_string()))?;
        if t.wallets[index].currency != command.currency {
            return Err(PaymentError::Validation("top-up currency does not match the k-wallet".to_string()));
        }
        let mutation = plan_credit(&t.wallets[index], command.amount, command.fee, &command.transaction_code, now)?;

        let mut staged = t.clone();
        let record = command.record(&staged.wallets[index], now);
        staged.topups.push(record);
        let mut entry = mutation.entry;
        entry.topup_id = Some(staged.topups.len() as i64);
        staged.entries.push(entry.clone());
        let wallet = &mut staged.wallets[index];
        wallet.balance = mutation.new_balance;
        wallet.version += 1;
        let wallet = wallet.clone();
        if self.fail_ledger_writes.load(Ordering::SeqCst) {
            return Err(PaymentError::Internal("ledger write failed".to_string()));
        }
        *t = staged;
        Ok((wallet, entry))
    }
}
