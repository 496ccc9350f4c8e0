use crate::domain::canonical::{base_response, CanonicalResponse, PaymentDetail, RedirectAction};
use crate::domain::channel::Channel;
use crate::domain::configuration::GatewayCredentials;
use crate::domain::payment::{BankChannel, Payment, PaymentStatus, PaymentType};
use crate::error::GatewayError;
use crate::gateways::{
    parse_stored, read_json, GatewayAdapter, GatewayReply, GatewayRequest, HttpTransport,
    RawStatus, StatusQuery,
};
use crate::signature::{hmac_sha256_hex, md5_hex, senangpay_payment_hash};
use serde::Deserialize;
use serde_json::json;

/// Hosted-checkout redirect for Malaysian payments. The payment URL is
/// signed locally; no call is made until the customer opens it.
pub struct SenangpayAdapter {
    pub transport: HttpTransport,
}

#[derive(Debug, Deserialize)]
struct StoredRedirect {
    #[serde(rename = "redirectUrl")]
    redirect_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PaymentInfo {
    transaction_reference: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusData {
    payment_info: PaymentInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusResponse {
    status: i64,
    msg: String,
    data: Vec<StatusData>,
}

pub fn payment_url(creds: &GatewayCredentials, request: &GatewayRequest) -> Result<String, GatewayError> {
    let amount = format!("{:.2}", request.total.round_dp(2));
    let detail = if request.product_name.is_empty() {
        format!("Payment for {}", request.order_id)
    } else {
        request.product_name.clone()
    };
    let hash = senangpay_payment_hash(&creds.secret_key, &detail, &amount, &request.order_id);
    let query = serde_urlencoded::to_string([
        ("detail", detail.as_str()),
        ("amount", amount.as_str()),
        ("order_id", request.order_id.as_str()),
        ("name", request.customer.name.as_str()),
        ("email", request.customer.email.as_str()),
        ("phone", request.customer.phone.as_str()),
        ("hash", hash.as_str()),
    ])
    .map_err(|e| GatewayError::Malformed(e.to_string()))?;
    Ok(format!("{}/payment/{}?{}", creds.base_url, creds.merchant_id, query))
}

/// Transaction-reference lookups are signed with HMAC; order-id lookups
/// still use the legacy MD5 hash.
fn status_url(creds: &GatewayCredentials, query: &StatusQuery) -> Result<String, GatewayError> {
    let (path, params) = match &query.reference_id {
        Some(reference) if !reference.is_empty() => (
            "query_transaction_status",
            [
                ("merchant_id", creds.merchant_id.clone()),
                ("transaction_reference", reference.clone()),
                (
                    "hash",
                    hmac_sha256_hex(&creds.secret_key, &[&creds.merchant_id, &creds.secret_key, reference]),
                ),
            ],
        ),
        _ => (
            "query_order_status",
            [
                ("merchant_id", creds.merchant_id.clone()),
                ("order_id", query.order_id.clone()),
                ("hash", md5_hex(&[&creds.merchant_id, &creds.secret_key, &query.order_id])),
            ],
        ),
    };
    let encoded = serde_urlencoded::to_string(params).map_err(|e| GatewayError::Malformed(e.to_string()))?;
    Ok(format!("{}/apiv1/{}?{}", creds.base_url, path, encoded))
}

#[async_trait::async_trait]
impl GatewayAdapter for SenangpayAdapter {
    fn name(&self) -> &'static str {
        "senangpay"
    }

    async fn pay(
        &self,
        creds: &GatewayCredentials,
        request: &GatewayRequest,
    ) -> Result<GatewayReply, GatewayError> {
        if creds.merchant_id.is_empty() || creds.secret_key.is_empty() {
            return Err(GatewayError::Signature("senangpay credentials are incomplete".to_string()));
        }
        let url = payment_url(creds, request)?;
        Ok(GatewayReply {
            raw: json!({ "redirectUrl": url }),
        })
    }

    async fn check_status(
        &self,
        creds: &GatewayCredentials,
        query: &StatusQuery,
    ) -> Result<RawStatus, GatewayError> {
        let resp = self
            .transport
            .client
            .get(status_url(creds, query)?)
            .basic_auth(&creds.merchant_id, Some(""))
            .timeout(self.transport.timeout)
            .send()
            .await;
        let v = read_json(resp).await?;
        let parsed: StatusResponse = serde_json::from_value(v.clone())?;
        let info = parsed.data.into_iter().next().map(|d| d.payment_info).unwrap_or_default();
        let status = if parsed.status == 1 {
            "1".to_string()
        } else {
            format!("error:{}", parsed.msg)
        };
        Ok(RawStatus {
            status,
            reference_id: Some(info.transaction_reference).filter(|r| !r.is_empty()),
            raw: v,
        })
    }

    fn map_to_canonical(
        &self,
        channel: &Channel,
        payment: &Payment,
    ) -> Result<CanonicalResponse, GatewayError> {
        let stored: StoredRedirect = parse_stored(payment)?;
        Ok(base_response(
            payment,
            channel,
            PaymentType::Redirect,
            PaymentDetail {
                bank: Some(BankChannel::Senangpay),
                redirect_actions: vec![RedirectAction {
                    name: "url payment".to_string(),
                    method: "GET".to_string(),
                    url: stored.redirect_url,
                }],
                ..Default::default()
            },
        ))
    }

    fn map_status(&self, _payment: &Payment, raw: &RawStatus) -> Result<PaymentStatus, GatewayError> {
        Ok(map_payment_status(&raw.status))
    }
}

/// An API-level failure (`status` 0) maps to failed rather than an error.
pub fn map_payment_status(status: &str) -> PaymentStatus {
    if status.starts_with("error:") {
        return PaymentStatus::Failed;
    }
    match status.to_ascii_lowercase().as_str() {
        "paid" | "success" | "1" => PaymentStatus::Success,
        "failed" | "0" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

/// Callback `status_id`: only "1" is a successful payment.
pub fn map_callback_status(status_id: &str) -> PaymentStatus {
    if status_id.trim() == "1" {
        PaymentStatus::Success
    } else {
        PaymentStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Currency, Customer};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn creds() -> GatewayCredentials {
        GatewayCredentials {
            base_url: "https://sandbox.senangpay.my".to_string(),
            merchant_id: "MID1".to_string(),
            secret_key: "s3cret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn payment_url_carries_signed_amount() {
        let req = GatewayRequest {
            transaction_id: "T".to_string(),
            order_id: "ORD-9".to_string(),
            amount: dec!(10),
            fee: dec!(0.5),
            total: dec!(10.5),
            currency: Currency::Myr,
            customer: Customer {
                name: "Ali Bin Abu".to_string(),
                ..Default::default()
            },
            bank_code: String::new(),
            product_code: String::new(),
            product_name: "Order ORD-9".to_string(),
            expiry_minutes: 60,
            return_url: String::new(),
            rq_uuid: String::new(),
            requested_at: Utc::now(),
        };
        let url = payment_url(&creds(), &req).unwrap();
        let hash = senangpay_payment_hash("s3cret", "Order ORD-9", "10.50", "ORD-9");
        assert!(url.starts_with("https://sandbox.senangpay.my/payment/MID1?"));
        assert!(url.contains("amount=10.50"));
        assert!(url.contains(&format!("hash={hash}")));
    }

    #[test]
    fn status_lookup_prefers_transaction_reference() {
        let q = StatusQuery {
            order_id: "ORD-9".to_string(),
            transaction_id: "T".to_string(),
            reference_id: Some("REF-1".to_string()),
            bank_code: String::new(),
        };
        assert!(status_url(&creds(), &q).unwrap().contains("query_transaction_status"));
        let q = StatusQuery { reference_id: None, ..q };
        assert!(status_url(&creds(), &q).unwrap().contains("query_order_status"));
    }

    #[test]
    fn api_failure_maps_to_failed() {
        assert_eq!(map_payment_status("error:not found"), PaymentStatus::Failed);
        assert_eq!(map_payment_status("1"), PaymentStatus::Success);
        assert_eq!(map_payment_status(""), PaymentStatus::Pending);
    }
}
