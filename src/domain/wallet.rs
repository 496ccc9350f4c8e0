use crate::domain::payment::{Currency, NewPayment};
use crate::error::PaymentError;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Active,
    Inactive,
    Blocked,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "active",
            WalletStatus::Inactive => "inactive",
            WalletStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => WalletStatus::Active,
            "blocked" => WalletStatus::Blocked,
            _ => WalletStatus::Inactive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("in") {
            Direction::In
        } else {
            Direction::Out
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KWallet {
    pub id: i64,
    pub member_id: String,
    pub full_name: String,
    pub no_rekening: String,
    pub gen_va: String,
    pub balance: Decimal,
    pub currency: Currency,
    pub status: WalletStatus,
    pub version: i64,
    pub virtual_accounts: Vec<WalletVirtualAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletVirtualAccount {
    pub bank: String,
    pub bank_code: String,
    pub virtual_account: String,
}

/// Append-only ledger line. `balance` is the balance after this entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub k_wallet_id: i64,
    pub transaction_code: String,
    pub title: String,
    pub direction: Direction,
    pub debit: Decimal,
    pub credit: Decimal,
    pub amount: Decimal,
    pub balance: Decimal,
    pub currency: Currency,
    pub month: i32,
    pub year: i32,
    pub date: String,
    pub time: String,
    pub date_time: DateTime<Utc>,
    pub payment_id: Option<i64>,
    pub topup_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopupTransaction {
    pub k_wallet_id: i64,
    pub member_id: String,
    pub channel_id: i64,
    pub aggregator: String,
    pub merchant: String,
    pub amount: Decimal,
    pub fee_admin: Decimal,
    pub currency: Currency,
    pub reference_id: String,
    pub status: String,
    pub completed_at: DateTime<Utc>,
}

/// Result of planning one balance mutation: the new balance and the entry
/// that records it. Nothing is persisted until the caller commits both.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerMutation {
    pub new_balance: Decimal,
    pub entry: LedgerEntry,
}

#[allow(clippy::too_many_arguments)]
fn entry_for(
    wallet: &KWallet,
    title: &str,
    transaction_code: &str,
    direction: Direction,
    amount: Decimal,
    value: Decimal,
    new_balance: Decimal,
    now: DateTime<Utc>,
) -> LedgerEntry {
    let (debit, credit) = match direction {
        Direction::Out => (value, Decimal::ZERO),
        Direction::In => (Decimal::ZERO, value),
    };
    LedgerEntry {
        k_wallet_id: wallet.id,
        transaction_code: transaction_code.to_string(),
        title: title.to_string(),
        direction,
        debit,
        credit,
        amount,
        balance: new_balance,
        currency: wallet.currency,
        month: now.month() as i32,
        year: now.year(),
        date: now.format("%Y-%m-%d").to_string(),
        time: now.format("%H:%M:%S").to_string(),
        date_time: now,
        payment_id: None,
        topup_id: None,
    }
}

/// Plans a wallet debit of `total` (amount plus fee).
pub fn plan_debit(
    wallet: &KWallet,
    amount: Decimal,
    total: Decimal,
    transaction_code: &str,
    now: DateTime<Utc>,
) -> Result<LedgerMutation, PaymentError> {
    if wallet.status != WalletStatus::Active {
        return Err(PaymentError::Ledger("k-wallet is not active".to_string()));
    }
    if total <= Decimal::ZERO {
        return Err(PaymentError::Validation("amount must be positive".to_string()));
    }
    if wallet.balance < total {
        return Err(PaymentError::Ledger("k-wallet balance is not enough".to_string()));
    }
    let new_balance = wallet.balance - total;
    Ok(LedgerMutation {
        new_balance,
        entry: entry_for(
            wallet,
            "Pembayaran",
            transaction_code,
            Direction::Out,
            amount,
            total,
            new_balance,
            now,
        ),
    })
}

/// Plans a top-up. The wallet is credited with `amount - fee`, and the entry
/// records that net value so entries always sum to the balance.
pub fn plan_credit(
    wallet: &KWallet,
    amount: Decimal,
    fee: Decimal,
    transaction_code: &str,
    now: DateTime<Utc>,
) -> Result<LedgerMutation, PaymentError> {
    let net = amount - fee;
    if net <= Decimal::ZERO {
        return Err(PaymentError::Validation(
            "top-up amount does not cover the admin fee".to_string(),
        ));
    }
    let new_balance = wallet.balance + net;
    Ok(LedgerMutation {
        new_balance,
        entry: entry_for(
            wallet,
            "Topup",
            transaction_code,
            Direction::In,
            amount,
            net,
            new_balance,
            now,
        ),
    })
}

/// A wallet-funded charge for one channel of an intent.
#[derive(Debug, Clone)]
pub struct WalletCharge {
    pub no_rekening: String,
    pub amount: Decimal,
    pub total: Decimal,
    /// Full amount of the intent the charge belongs to.
    pub intent_total: Decimal,
    pub split: bool,
    /// Payment row written together with the debit.
    pub payment: NewPayment,
}

/// Decides whether a wallet may fund a charge and plans the debit.
///
/// A single-channel intent needs enough balance for the whole total. A split
/// intent is refused when the wallet alone could have covered it.
pub fn authorize_charge(
    wallet: Option<&KWallet>,
    charge: &WalletCharge,
    now: DateTime<Utc>,
) -> Result<LedgerMutation, PaymentError> {
    let wallet = wallet
        .filter(|w| w.member_id == charge.payment.customer.id)
        .ok_or_else(|| PaymentError::Ledger("member has not registered a k-wallet".to_string()))?;
    if wallet.currency != charge.payment.currency {
        return Err(PaymentError::Validation(
            "k-wallet currency does not match the channel".to_string(),
        ));
    }
    if charge.split && wallet.balance >= charge.intent_total {
        return Err(PaymentError::InvalidSplit(
            "k-wallet balance covers the full amount, split payment is not allowed".to_string(),
        ));
    }
    if !charge.split && wallet.balance < charge.total {
        return Err(PaymentError::Ledger("k-wallet balance is not enough".to_string()));
    }
    plan_debit(wallet, charge.amount, charge.total, &charge.payment.transaction_id, now)
}

/// External funding event delivered by an aggregator notification.
#[derive(Debug, Clone)]
pub struct TopupCommand {
    pub gen_va: String,
    pub channel_id: i64,
    pub aggregator: String,
    pub merchant: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub currency: Currency,
    pub reference_id: String,
    pub transaction_code: String,
}

impl TopupCommand {
    pub fn record(&self, wallet: &KWallet, now: DateTime<Utc>) -> TopupTransaction {
        TopupTransaction {
            k_wallet_id: wallet.id,
            member_id: wallet.member_id.clone(),
            channel_id: self.channel_id,
            aggregator: self.aggregator.clone(),
            merchant: self.merchant.clone(),
            amount: self.amount,
            fee_admin: self.fee,
            currency: self.currency,
            reference_id: self.reference_id.clone(),
            status: "success".to_string(),
            completed_at: now,
        }
    }
}

/// Wallet state stored as the gateway response of a wallet payment.
pub fn snapshot(wallet: &KWallet, new_balance: Decimal) -> serde_json::Value {
    serde_json::json!({
        "id": wallet.id,
        "memberId": wallet.member_id,
        "fullName": wallet.full_name,
        "noRekening": wallet.no_rekening,
        "balance": new_balance.to_string(),
        "currency": wallet.currency,
    })
}

/// Account number is the unix timestamp followed by the zero-padded sequence;
/// the padded sequence doubles as the VA suffix.
pub fn account_numbers(sequence: i64, now: DateTime<Utc>) -> (String, String) {
    let gen_va = format!("{:08}", sequence);
    (format!("{}{}", now.timestamp(), gen_va), gen_va)
}
