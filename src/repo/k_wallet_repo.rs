use crate::domain::payment::Currency;
use crate::domain::wallet::{Direction, KWallet, LedgerEntry, WalletStatus, WalletVirtualAccount};
use anyhow::{anyhow, bail};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

#[derive(Clone)]
pub struct KWalletRepo {
    pub pool: PgPool,
}

const WALLET_COLUMNS: &str =
    "id, member_id, full_name, no_rekening, gen_va, balance, currency, status, version";

fn wallet_from_row(r: &PgRow) -> anyhow::Result<KWallet> {
    let currency: String = r.get("currency");
    let status: String = r.get("status");
    Ok(KWallet {
        id: r.get("id"),
        member_id: r.get("member_id"),
        full_name: r.get("full_name"),
        no_rekening: r.get("no_rekening"),
        gen_va: r.get("gen_va"),
        balance: r.get("balance"),
        currency: Currency::parse(&currency).ok_or_else(|| anyhow!("unknown currency {currency}"))?,
        status: WalletStatus::parse(&status),
        version: r.get("version"),
        virtual_accounts: Vec::new(),
    })
}

fn entry_from_row(r: &PgRow) -> anyhow::Result<LedgerEntry> {
    let currency: String = r.get("currency");
    let direction: String = r.get("direction");
    Ok(LedgerEntry {
        k_wallet_id: r.get("k_wallet_id"),
        transaction_code: r.get("transaction_code"),
        title: r.get("title"),
        direction: Direction::parse(&direction),
        debit: r.get("debit"),
        credit: r.get("credit"),
        amount: r.get("amount"),
        balance: r.get("balance"),
        currency: Currency::parse(&currency).ok_or_else(|| anyhow!("unknown currency {currency}"))?,
        month: r.get("month"),
        year: r.get("year"),
        date: r.get("date"),
        time: r.get("time"),
        date_time: r.get("date_time"),
        payment_id: r.get("payment_id"),
        topup_id: r.get("topup_id"),
    })
}

impl KWalletRepo {
    pub async fn next_sequence(&self) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT nextval('k_wallet_account_seq') AS seq")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("seq"))
    }

    pub async fn exists(&self, member_id: &str, currency: Currency) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM k_wallets WHERE member_id=$1 AND currency=$2) AS found")
            .bind(member_id)
            .bind(currency.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("found"))
    }

    pub async fn insert_tx(tx: &mut Transaction<'_, Postgres>, wallet: &KWallet) -> anyhow::Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO k_wallets (member_id, full_name, no_rekening, gen_va, balance, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&wallet.member_id)
        .bind(&wallet.full_name)
        .bind(&wallet.no_rekening)
        .bind(&wallet.gen_va)
        .bind(wallet.balance)
        .bind(wallet.currency.as_str())
        .bind(wallet.status.as_str())
        .fetch_one(tx.as_mut())
        .await?;
        Ok(row.get("id"))
    }

    pub async fn insert_virtual_account_tx(
        tx: &mut Transaction<'_, Postgres>,
        wallet_id: i64,
        va: &WalletVirtualAccount,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO k_wallet_virtual_accounts (k_wallet_id, bank, bank_code, virtual_account) VALUES ($1, $2, $3, $4)",
        )
        .bind(wallet_id)
        .bind(&va.bank)
        .bind(&va.bank_code)
        .bind(&va.virtual_account)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn find_by_no_rekening(&self, no_rekening: &str) -> anyhow::Result<Option<KWallet>> {
        let row = sqlx::query(&format!("SELECT {WALLET_COLUMNS} FROM k_wallets WHERE no_rekening=$1"))
            .bind(no_rekening)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut wallet = wallet_from_row(&row)?;
        wallet.virtual_accounts = self.virtual_accounts(wallet.id).await?;
        Ok(Some(wallet))
    }

    pub async fn virtual_accounts(&self, wallet_id: i64) -> anyhow::Result<Vec<WalletVirtualAccount>> {
        let rows = sqlx::query(
            "SELECT bank, bank_code, virtual_account FROM k_wallet_virtual_accounts WHERE k_wallet_id=$1 ORDER BY id",
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| WalletVirtualAccount {
                bank: r.get("bank"),
                bank_code: r.get("bank_code"),
                virtual_account: r.get("virtual_account"),
            })
            .collect())
    }

    /// Row-locks the wallet until the surrounding transaction ends.
    pub async fn lock_by_no_rekening_tx(
        tx: &mut Transaction<'_, Postgres>,
        no_rekening: &str,
    ) -> anyhow::Result<Option<KWallet>> {
        let row = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM k_wallets WHERE no_rekening=$1 FOR UPDATE"
        ))
        .bind(no_rekening)
        .fetch_optional(tx.as_mut())
        .await?;
        row.as_ref().map(wallet_from_row).transpose()
    }

    pub async fn lock_by_gen_va_tx(
        tx: &mut Transaction<'_, Postgres>,
        gen_va: &str,
    ) -> anyhow::Result<Option<KWallet>> {
        let row = sqlx::query(&format!("SELECT {WALLET_COLUMNS} FROM k_wallets WHERE gen_va=$1 FOR UPDATE"))
            .bind(gen_va)
            .fetch_optional(tx.as_mut())
            .await?;
        row.as_ref().map(wallet_from_row).transpose()
    }

    /// Compare-and-set on `version` on top of the row lock.
    pub async fn update_balance_tx(
        tx: &mut Transaction<'_, Postgres>,
        wallet_id: i64,
        new_balance: Decimal,
        expected_version: i64,
    ) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE k_wallets SET balance=$2, version=version+1, updated_at=now() WHERE id=$1 AND version=$3",
        )
        .bind(wallet_id)
        .bind(new_balance)
        .bind(expected_version)
        .execute(tx.as_mut())
        .await?;
        if result.rows_affected() != 1 {
            bail!("k-wallet {wallet_id} was modified concurrently");
        }
        Ok(())
    }

    pub async fn insert_entry_tx(tx: &mut Transaction<'_, Postgres>, entry: &LedgerEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO k_wallet_transactions (
                k_wallet_id, transaction_code, title, direction, debit, credit, amount, balance,
                currency, month, year, date, time, date_time, payment_id, topup_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(entry.k_wallet_id)
        .bind(&entry.transaction_code)
        .bind(&entry.title)
        .bind(entry.direction.as_str())
        .bind(entry.debit)
        .bind(entry.credit)
        .bind(entry.amount)
        .bind(entry.balance)
        .bind(entry.currency.as_str())
        .bind(entry.month)
        .bind(entry.year)
        .bind(&entry.date)
        .bind(&entry.time)
        .bind(entry.date_time)
        .bind(entry.payment_id)
        .bind(entry.topup_id)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn recent_entries(&self, wallet_id: i64, limit: i64) -> anyhow::Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT k_wallet_id, transaction_code, title, direction, debit, credit, amount, balance,
                   currency, month, year, date, time, date_time, payment_id, topup_id
            FROM k_wallet_transactions
            WHERE k_wallet_id=$1
            ORDER BY date_time DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(wallet_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(entry_from_row).collect()
    }
}
