use crate::domain::audit::Actor;
use crate::domain::payment::PaymentStatus;
use sqlx::{Postgres, Transaction};

/// Append-only audit rows. Both tables are only ever written inside the
/// transaction that changes the payment.
pub struct AuditRepo;

impl AuditRepo {
    pub async fn insert_callback_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment_id: i64,
        source: &str,
        status: PaymentStatus,
        payload: &serde_json::Value,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO payment_callbacks (payment_id, source, status, payload) VALUES ($1, $2, $3, $4)",
        )
        .bind(payment_id)
        .bind(source)
        .bind(status.as_str())
        .bind(payload)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn insert_history_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment_id: i64,
        status: PaymentStatus,
        note: &str,
        actor: &Actor,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO payment_status_history (payment_id, status, note, created_by) VALUES ($1, $2, $3, $4)",
        )
        .bind(payment_id)
        .bind(status.as_str())
        .bind(note)
        .bind(serde_json::to_value(actor)?)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }
}
