use crate::domain::configuration::{ConfigJson, Environment, GatewayConfiguration};
use crate::domain::payment::Currency;
use anyhow::anyhow;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

#[derive(Clone)]
pub struct ConfigurationsRepo {
    pub pool: PgPool,
}

const SELECT: &str = r#"
    SELECT c.id, c.platform_id, c.aggregator_id, a.slug, a.name AS aggregator_name,
           c.currency, c.config_value, c.config_json, c.is_active
    FROM configurations c
    JOIN aggregators a ON a.id = c.aggregator_id
"#;

fn from_row(r: &PgRow) -> anyhow::Result<GatewayConfiguration> {
    let currency: String = r.get("currency");
    let env: String = r.get("config_value");
    let json: serde_json::Value = r.get("config_json");
    Ok(GatewayConfiguration {
        id: r.get("id"),
        platform_id: r.get("platform_id"),
        aggregator_id: r.get("aggregator_id"),
        aggregator_slug: r.get("slug"),
        aggregator_name: r.get("aggregator_name"),
        currency: Currency::parse(&currency).ok_or_else(|| anyhow!("unknown currency {currency}"))?,
        environment: Environment::parse(&env),
        config_json: serde_json::from_value::<ConfigJson>(json)?,
        is_active: r.get("is_active"),
    })
}

impl ConfigurationsRepo {
    /// Active configurations in failover order.
    pub async fn list_active(
        &self,
        platform_id: i64,
        currency: Currency,
    ) -> anyhow::Result<Vec<GatewayConfiguration>> {
        let rows = sqlx::query(&format!(
            "{SELECT} WHERE c.platform_id=$1 AND c.currency=$2 AND c.is_active=true AND a.is_active=true ORDER BY c.id ASC"
        ))
        .bind(platform_id)
        .bind(currency.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(from_row).collect()
    }

    pub async fn find(&self, platform_id: i64, aggregator_id: i64) -> anyhow::Result<Option<GatewayConfiguration>> {
        let row = sqlx::query(&format!(
            "{SELECT} WHERE c.platform_id=$1 AND c.aggregator_id=$2 ORDER BY c.id ASC LIMIT 1"
        ))
        .bind(platform_id)
        .bind(aggregator_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(from_row).transpose()
    }

    /// First active configuration of an aggregator for a currency, used by
    /// flows that are not tied to one platform (wallet VAs, top-ups).
    pub async fn find_by_slug(&self, slug: &str, currency: Currency) -> anyhow::Result<Option<GatewayConfiguration>> {
        let row = sqlx::query(&format!(
            "{SELECT} WHERE a.slug=$1 AND c.currency=$2 AND c.is_active=true ORDER BY c.id ASC LIMIT 1"
        ))
        .bind(slug)
        .bind(currency.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(from_row).transpose()
    }
}
