use crate::domain::payment::{Currency, Customer, NewPayment, Payment, PaymentStatus};
use crate::repo::query_builder::PaymentFilter;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

pub(crate) const PAYMENT_COLUMNS: &str = "id, transaction_id, order_id, platform_id, channel_id, aggregator_id, \
     amount, fee_amount, total_amount, currency, status, customer_id, customer_name, customer_email, \
     customer_phone, reference_id, reference_type, gateway_reference, gateway_response, return_url, \
     expired_at, paid_at, notification_callback, created_at, updated_at";

#[derive(Clone)]
pub struct PaymentsRepo {
    pub pool: PgPool,
}

pub(crate) fn payment_from_row(r: &PgRow) -> anyhow::Result<Payment> {
    let status: String = r.get("status");
    let currency: String = r.get("currency");
    Ok(Payment {
        id: r.get("id"),
        transaction_id: r.get("transaction_id"),
        order_id: r.get("order_id"),
        platform_id: r.get("platform_id"),
        channel_id: r.get("channel_id"),
        aggregator_id: r.get("aggregator_id"),
        amount: r.get("amount"),
        fee_amount: r.get("fee_amount"),
        total_amount: r.get("total_amount"),
        currency: Currency::parse(&currency).ok_or_else(|| anyhow!("unknown currency {currency}"))?,
        status: PaymentStatus::parse(&status).ok_or_else(|| anyhow!("unknown payment status {status}"))?,
        customer: Customer {
            id: r.get("customer_id"),
            name: r.get("customer_name"),
            email: r.get("customer_email"),
            phone: r.get("customer_phone"),
        },
        reference_id: r.get("reference_id"),
        reference_type: r.get("reference_type"),
        gateway_reference: r.get("gateway_reference"),
        gateway_response: r.get("gateway_response"),
        return_url: r.get("return_url"),
        expired_at: r.get("expired_at"),
        paid_at: r.get("paid_at"),
        notification_sent: r.get("notification_callback"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

impl PaymentsRepo {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        data: &NewPayment,
    ) -> anyhow::Result<Payment> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (
                transaction_id, order_id, platform_id, channel_id, aggregator_id,
                amount, fee_amount, total_amount, currency, status,
                customer_id, customer_name, customer_email, customer_phone,
                reference_id, reference_type, gateway_reference, gateway_response, return_url, paid_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9, $10,
                $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20
            )
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(&data.transaction_id)
        .bind(&data.order_id)
        .bind(data.platform_id)
        .bind(data.channel_id)
        .bind(data.aggregator_id)
        .bind(data.amount)
        .bind(data.fee_amount)
        .bind(data.total_amount)
        .bind(data.currency.as_str())
        .bind(data.status.as_str())
        .bind(&data.customer.id)
        .bind(&data.customer.name)
        .bind(&data.customer.email)
        .bind(&data.customer.phone)
        .bind(&data.reference_id)
        .bind(&data.reference_type)
        .bind(&data.gateway_reference)
        .bind(&data.gateway_response)
        .bind(&data.return_url)
        .bind(data.paid_at)
        .fetch_one(tx.as_mut())
        .await?;

        payment_from_row(&row)
    }

    pub async fn insert(&self, data: &NewPayment) -> anyhow::Result<Payment> {
        let mut tx = self.pool.begin().await?;
        let payment = Self::insert_tx(&mut tx, data).await?;
        tx.commit().await?;
        Ok(payment)
    }

    /// Retry bookkeeping: same row and transaction id, next aggregator.
    pub async fn update_attempt(
        &self,
        payment_id: i64,
        aggregator_id: i64,
        fee: Decimal,
        total: Decimal,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE payments SET aggregator_id=$2, fee_amount=$3, total_amount=$4, updated_at=now() WHERE id=$1",
        )
        .bind(payment_id)
        .bind(aggregator_id)
        .bind(fee)
        .bind(total)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn finalize_attempt(
        &self,
        payment_id: i64,
        gateway_response: &serde_json::Value,
        fee: Decimal,
        total: Decimal,
        expired_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Payment> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET gateway_response=$2, fee_amount=$3, total_amount=$4, expired_at=$5, updated_at=now()
            WHERE id=$1
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(gateway_response)
        .bind(fee)
        .bind(total)
        .bind(expired_at)
        .fetch_one(&self.pool)
        .await?;
        payment_from_row(&row)
    }

    /// Moves a non-terminal payment to `status`. Returns `None` when the row
    /// was already terminal, in which case nothing is written.
    pub async fn transition_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment_id: i64,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
        reference_id: Option<&str>,
    ) -> anyhow::Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status=$2,
                paid_at=COALESCE($3, paid_at),
                gateway_reference=COALESCE($4, gateway_reference),
                updated_at=now()
            WHERE id=$1 AND status NOT IN ('success', 'failed', 'expired', 'cancelled')
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(status.as_str())
        .bind(paid_at)
        .bind(reference_id)
        .fetch_optional(tx.as_mut())
        .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    pub async fn find_by_transaction_id(&self, transaction_id: &str) -> anyhow::Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id=$1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    /// Latest payment for an order id, preferring one that is still open.
    pub async fn find_by_order_id(&self, order_id: &str) -> anyhow::Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE order_id=$1
            ORDER BY (status IN ('pending', 'processing')) DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    pub async fn mark_notified(&self, payment_id: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE payments SET notification_callback=true, updated_at=now() WHERE id=$1")
            .bind(payment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Open payments with a known aggregator not touched since `before`.
    pub async fn list_stale(&self, before: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE status IN ('pending', 'processing')
              AND aggregator_id IS NOT NULL
              AND updated_at < $1
            ORDER BY updated_at ASC
            LIMIT $2
            "#
        ))
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(payment_from_row).collect()
    }

    pub async fn list_overdue(&self, now: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE status = 'pending' AND expired_at IS NOT NULL AND expired_at < $1
            ORDER BY expired_at ASC
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(payment_from_row).collect()
    }

    pub async fn list(&self, filter: &PaymentFilter) -> anyhow::Result<Vec<Payment>> {
        let mut qb = filter.select(PAYMENT_COLUMNS);
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(payment_from_row).collect()
    }

    pub async fn count(&self, filter: &PaymentFilter) -> anyhow::Result<i64> {
        let mut qb = filter.count();
        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>(0))
    }
}
