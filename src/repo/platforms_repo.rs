use crate::domain::platform::Platform;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

#[derive(Clone)]
pub struct PlatformsRepo {
    pub pool: PgPool,
}

fn from_row(r: &PgRow) -> Platform {
    Platform {
        id: r.get("id"),
        code: r.get("code"),
        name: r.get("name"),
        api_key: r.get("api_key"),
        secret_key: r.get("secret_key"),
        is_active: r.get("is_active"),
        notification_url: r.get("notification_url"),
    }
}

impl PlatformsRepo {
    pub async fn find_by_api_key(&self, api_key: &str) -> anyhow::Result<Option<Platform>> {
        let row = sqlx::query(
            "SELECT id, code, name, api_key, secret_key, is_active, notification_url FROM platforms WHERE api_key=$1",
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(from_row))
    }

    pub async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Platform>> {
        let row = sqlx::query(
            "SELECT id, code, name, api_key, secret_key, is_active, notification_url FROM platforms WHERE id=$1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(from_row))
    }
}
