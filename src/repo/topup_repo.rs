use crate::domain::wallet::TopupTransaction;
use sqlx::{Postgres, Row, Transaction};

pub struct TopupRepo;

impl TopupRepo {
    pub async fn exists_tx(tx: &mut Transaction<'_, Postgres>, reference_id: &str) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM topup_transactions WHERE reference_id=$1) AS found")
            .bind(reference_id)
            .fetch_one(tx.as_mut())
            .await?;
        Ok(row.get("found"))
    }

    pub async fn insert_tx(tx: &mut Transaction<'_, Postgres>, topup: &TopupTransaction) -> anyhow::Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO topup_transactions (
                k_wallet_id, member_id, channel_id, aggregator, merchant, amount, fee_admin,
                currency, reference_id, status, completed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(topup.k_wallet_id)
        .bind(&topup.member_id)
        .bind(topup.channel_id)
        .bind(&topup.aggregator)
        .bind(&topup.merchant)
        .bind(topup.amount)
        .bind(topup.fee_admin)
        .bind(topup.currency.as_str())
        .bind(&topup.reference_id)
        .bind(&topup.status)
        .bind(topup.completed_at)
        .fetch_one(tx.as_mut())
        .await?;
        Ok(row.get("id"))
    }
}
