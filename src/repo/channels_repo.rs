use crate::domain::channel::{Channel, FeePolicy, FeeType};
use crate::domain::payment::{BankChannel, Currency, PaymentMethod};
use anyhow::anyhow;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

#[derive(Clone)]
pub struct ChannelsRepo {
    pub pool: PgPool,
}

const COLUMNS: &str = "ch.id, ch.code, ch.name, ch.payment_method, ch.currency, ch.fee_type, ch.fee_amount, \
     ch.fee_percentage_bp, ch.is_active, ch.product_name, ch.product_code, ch.instruction, ch.bank_name, ch.bank_code";

fn from_row(r: &PgRow) -> anyhow::Result<Channel> {
    let method: String = r.get("payment_method");
    let currency: String = r.get("currency");
    let fee_type: String = r.get("fee_type");
    let bank_name: Option<String> = r.get("bank_name");
    Ok(Channel {
        id: r.get("id"),
        code: r.get("code"),
        name: r.get("name"),
        payment_method: PaymentMethod::parse(&method).ok_or_else(|| anyhow!("unknown payment method {method}"))?,
        currency: Currency::parse(&currency).ok_or_else(|| anyhow!("unknown currency {currency}"))?,
        fee_policy: FeePolicy {
            fee_type: FeeType::parse(&fee_type),
            fixed_amount: r.get("fee_amount"),
            percentage_bp: r.get("fee_percentage_bp"),
        },
        is_active: r.get("is_active"),
        product_name: r.get("product_name"),
        product_code: r.get("product_code"),
        instruction: r.get("instruction"),
        bank_name: bank_name.as_deref().and_then(BankChannel::parse),
        bank_code: r.get("bank_code"),
    })
}

impl ChannelsRepo {
    /// Channel offered to a platform. Inactive channels are returned too so
    /// the caller can report them distinctly.
    pub async fn find_for_platform(&self, platform_id: i64, channel_id: i64) -> anyhow::Result<Option<Channel>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS} FROM channels ch
            JOIN platform_channels pc ON pc.channel_id = ch.id
            WHERE pc.platform_id=$1 AND ch.id=$2
            "#
        ))
        .bind(platform_id)
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(from_row).transpose()
    }

    pub async fn find_by_id(&self, channel_id: i64) -> anyhow::Result<Option<Channel>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM channels ch WHERE ch.id=$1"))
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(from_row).transpose()
    }

    pub async fn find_by_bank_code(
        &self,
        method: PaymentMethod,
        bank_code: &str,
        currency: Currency,
    ) -> anyhow::Result<Option<Channel>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM channels ch WHERE ch.payment_method=$1 AND ch.bank_code=$2 AND ch.currency=$3 ORDER BY ch.id LIMIT 1"
        ))
        .bind(method.as_str())
        .bind(bank_code)
        .bind(currency.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(from_row).transpose()
    }

    pub async fn deactivate_tx(tx: &mut Transaction<'_, Postgres>, channel_id: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE channels SET is_active=false, updated_at=now() WHERE id=$1")
            .bind(channel_id)
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }
}
