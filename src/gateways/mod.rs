use crate::domain::canonical::CanonicalResponse;
use crate::domain::channel::Channel;
use crate::domain::configuration::GatewayCredentials;
use crate::domain::payment::{Currency, Customer, Payment, PaymentStatus};
use crate::error::GatewayError;
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod espay;
pub mod midtrans;
pub mod mock;
pub mod registry;
pub mod senangpay;

/// Aggregator-specific request input for one attempt. Every family reads the
/// fields it needs.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub transaction_id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub total: Decimal,
    pub currency: Currency,
    pub customer: Customer,
    pub bank_code: String,
    pub product_code: String,
    pub product_name: String,
    pub expiry_minutes: i64,
    pub return_url: String,
    pub rq_uuid: String,
    pub requested_at: DateTime<Utc>,
}

/// Raw aggregator body of a successful `pay` call, persisted as the
/// payment's gateway response.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply {
    pub raw: serde_json::Value,
}

/// Status-check input. Some families query by order id, others by the
/// aggregator's own reference.
#[derive(Debug, Clone)]
pub struct StatusQuery {
    pub order_id: String,
    pub transaction_id: String,
    pub reference_id: Option<String>,
    pub bank_code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawStatus {
    pub status: String,
    pub reference_id: Option<String>,
    pub raw: serde_json::Value,
}

#[async_trait::async_trait]
pub trait GatewayAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn pay(
        &self,
        creds: &GatewayCredentials,
        request: &GatewayRequest,
    ) -> Result<GatewayReply, GatewayError>;

    async fn check_status(
        &self,
        creds: &GatewayCredentials,
        query: &StatusQuery,
    ) -> Result<RawStatus, GatewayError>;

    fn map_to_canonical(
        &self,
        channel: &Channel,
        payment: &Payment,
    ) -> Result<CanonicalResponse, GatewayError>;

    fn map_status(&self, payment: &Payment, raw: &RawStatus) -> Result<PaymentStatus, GatewayError>;
}

/// Shared outbound client. Credentials are never stored here.
#[derive(Clone)]
pub struct HttpTransport {
    pub client: reqwest::Client,
    pub timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

/// Turns a response into a JSON value, surfacing non-2xx statuses as typed
/// errors. A 2xx alone does not mean the aggregator accepted the request.
pub(crate) async fn read_json(
    resp: Result<reqwest::Response, reqwest::Error>,
) -> Result<serde_json::Value, GatewayError> {
    let resp = resp?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(GatewayError::Http {
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        });
    }
    Ok(serde_json::from_str(&body)?)
}

pub(crate) fn parse_stored<T: DeserializeOwned>(payment: &Payment) -> Result<T, GatewayError> {
    let raw = payment
        .gateway_response
        .clone()
        .ok_or_else(|| GatewayError::Malformed("payment has no gateway response".to_string()))?;
    Ok(serde_json::from_value(raw)?)
}

pub(crate) fn str_field<'a>(v: &'a serde_json::Value, key: &str) -> &'a str {
    v.get(key).and_then(|x| x.as_str()).unwrap_or_default()
}

/// Espay expects Western Indonesia time on the wire.
pub(crate) fn jakarta(ts: DateTime<Utc>) -> DateTime<FixedOffset> {
    match FixedOffset::east_opt(7 * 3600) {
        Some(offset) => ts.with_timezone(&offset),
        None => ts.fixed_offset(),
    }
}

pub(crate) fn amount_string(value: Decimal) -> String {
    value.trunc().to_string()
}
