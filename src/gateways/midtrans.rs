use crate::domain::canonical::{base_response, CanonicalResponse, PaymentDetail, RedirectAction};
use crate::domain::channel::Channel;
use crate::domain::configuration::GatewayCredentials;
use crate::domain::payment::{BankChannel, Payment, PaymentStatus, PaymentType};
use crate::error::GatewayError;
use crate::gateways::{
    amount_string, parse_stored, read_json, str_field, GatewayAdapter, GatewayReply,
    GatewayRequest, HttpTransport, RawStatus, StatusQuery,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;

/// Which Midtrans product a charge goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidtransProduct {
    /// `bank_transfer` VA for BCA, BNI, BRI and CIMB.
    BankTransfer(BankChannel),
    Permata,
    /// Mandiri bill payment.
    Echannel,
    Gopay,
    ShopeePay,
    Qris,
    /// Snap checkout restricted to DANA.
    Dana,
}

pub struct MidtransAdapter {
    pub transport: HttpTransport,
    pub product: MidtransProduct,
}

impl MidtransAdapter {
    pub fn new(transport: HttpTransport, product: MidtransProduct) -> Self {
        Self { transport, product }
    }

    fn authorization(creds: &GatewayCredentials) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:", creds.server_key)))
    }

    fn charge_body(&self, creds: &GatewayCredentials, request: &GatewayRequest) -> serde_json::Value {
        let (first_name, last_name) = request.customer.split_name();
        let gross_amount = amount_string(request.total).parse::<i64>().unwrap_or_default();
        let mut body = json!({
            "transaction_details": {
                "order_id": request.order_id,
                "gross_amount": gross_amount,
            },
            "customer_details": {
                "first_name": first_name,
                "last_name": last_name,
                "email": request.customer.email,
                "phone": request.customer.phone,
            },
        });
        let extra = match self.product {
            MidtransProduct::BankTransfer(bank) => json!({
                "payment_type": "bank_transfer",
                "bank_transfer": { "bank": bank.as_str().to_ascii_lowercase() },
            }),
            MidtransProduct::Permata => json!({
                "payment_type": "bank_transfer",
                "bank_transfer": {
                    "bank": "permata",
                    "permata": { "recipient_name": creds.merchant_id },
                },
            }),
            MidtransProduct::Echannel => json!({
                "payment_type": "echannel",
                "echannel": {
                    "bill_info1": "Payment For:",
                    "bill_info2": request.product_name,
                },
            }),
            MidtransProduct::Gopay => json!({
                "payment_type": "gopay",
                "gopay": {
                    "enable_callback": !request.return_url.is_empty(),
                    "callback_url": request.return_url,
                },
            }),
            MidtransProduct::ShopeePay => json!({
                "payment_type": "shopeepay",
                "shopeepay": { "callback_url": request.return_url },
            }),
            MidtransProduct::Qris => json!({
                "payment_type": "qris",
                "enabled_payments": ["other_qris"],
            }),
            MidtransProduct::Dana => json!({
                "enabled_payments": ["dana"],
                "callbacks": { "finish": request.return_url },
            }),
        };
        if let (Some(target), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                target.insert(k.clone(), v.clone());
            }
        }
        body
    }

    fn payment_type(&self) -> PaymentType {
        match self.product {
            MidtransProduct::BankTransfer(_) | MidtransProduct::Permata => PaymentType::Va,
            MidtransProduct::Echannel => PaymentType::Bill,
            MidtransProduct::Gopay | MidtransProduct::Qris => PaymentType::Qris,
            MidtransProduct::ShopeePay | MidtransProduct::Dana => PaymentType::Redirect,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VaNumber {
    bank: String,
    va_number: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Action {
    name: String,
    method: String,
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChargeResponse {
    status_code: String,
    status_message: String,
    transaction_time: String,
    expiry_time: String,
    va_numbers: Vec<VaNumber>,
    permata_va_number: String,
    bill_key: String,
    biller_code: String,
    actions: Vec<Action>,
    redirect_url: String,
}

/// Midtrans `transaction_status` to canonical status. `authorize` needs a
/// manual capture and is surfaced as an error.
pub fn map_transaction_status(status: &str) -> Result<PaymentStatus, GatewayError> {
    match status {
        "capture" | "settlement" => Ok(PaymentStatus::Success),
        "pending" => Ok(PaymentStatus::Pending),
        "cancel" => Ok(PaymentStatus::Cancelled),
        "expire" => Ok(PaymentStatus::Expired),
        "deny" | "failure" => Ok(PaymentStatus::Failed),
        "authorize" => Err(GatewayError::UnsupportedStatus(status.to_string())),
        _ => Ok(PaymentStatus::Pending),
    }
}

/// Reads a `/v2/{order_id}/status` body. Midtrans answers HTTP 200 with an
/// embedded `status_code`; only 200, 201 and 407 carry a transaction status.
pub fn status_reply(v: serde_json::Value) -> Result<RawStatus, GatewayError> {
    let code = str_field(&v, "status_code");
    if !matches!(code, "200" | "201" | "407") {
        return Err(GatewayError::Rejected {
            code: code.to_string(),
            message: str_field(&v, "status_message").to_string(),
        });
    }
    let status = str_field(&v, "transaction_status").to_string();
    if status.is_empty() {
        return Err(GatewayError::Malformed("status response has no transaction_status".to_string()));
    }
    Ok(RawStatus {
        status,
        reference_id: v
            .get("transaction_id")
            .and_then(|x| x.as_str())
            .map(str::to_string),
        raw: v,
    })
}

#[async_trait::async_trait]
impl GatewayAdapter for MidtransAdapter {
    fn name(&self) -> &'static str {
        match self.product {
            MidtransProduct::BankTransfer(_) => "midtrans_bank_transfer",
            MidtransProduct::Permata => "midtrans_permata",
            MidtransProduct::Echannel => "midtrans_echannel",
            MidtransProduct::Gopay => "midtrans_gopay",
            MidtransProduct::ShopeePay => "midtrans_shopeepay",
            MidtransProduct::Qris => "midtrans_qris",
            MidtransProduct::Dana => "midtrans_dana",
        }
    }

    async fn pay(
        &self,
        creds: &GatewayCredentials,
        request: &GatewayRequest,
    ) -> Result<GatewayReply, GatewayError> {
        let body = self.charge_body(creds, request);
        let url = match self.product {
            MidtransProduct::Dana => format!("{}/snap/v1/transactions", creds.base_url),
            _ => format!("{}/v2/charge", creds.base_url),
        };
        let resp = self
            .transport
            .client
            .post(url)
            .header("Accept", "application/json")
            .header("Authorization", Self::authorization(creds))
            .json(&body)
            .timeout(self.transport.timeout)
            .send()
            .await;
        let v = read_json(resp).await?;

        // Snap returns a token and redirect url without a status code.
        if self.product == MidtransProduct::Dana {
            if str_field(&v, "redirect_url").is_empty() {
                return Err(GatewayError::Malformed("snap response has no redirect_url".to_string()));
            }
            return Ok(GatewayReply { raw: v });
        }
        let code = str_field(&v, "status_code");
        if code != "201" {
            return Err(GatewayError::Rejected {
                code: code.to_string(),
                message: str_field(&v, "status_message").to_string(),
            });
        }
        Ok(GatewayReply { raw: v })
    }

    async fn check_status(
        &self,
        creds: &GatewayCredentials,
        query: &StatusQuery,
    ) -> Result<RawStatus, GatewayError> {
        let resp = self
            .transport
            .client
            .get(format!("{}/v2/{}/status", creds.base_url, query.order_id))
            .header("Accept", "application/json")
            .header("Authorization", Self::authorization(creds))
            .timeout(self.transport.timeout)
            .send()
            .await;
        status_reply(read_json(resp).await?)
    }

    fn map_to_canonical(
        &self,
        channel: &Channel,
        payment: &Payment,
    ) -> Result<CanonicalResponse, GatewayError> {
        let r: ChargeResponse = parse_stored(payment)?;
        if self.product != MidtransProduct::Dana && r.status_code != "201" {
            return Err(GatewayError::Rejected {
                code: r.status_code,
                message: r.status_message,
            });
        }

        let mut detail = PaymentDetail {
            transaction_time: r.transaction_time,
            expire_time: r.expiry_time,
            ..Default::default()
        };
        match self.product {
            MidtransProduct::BankTransfer(bank) => {
                let va = r
                    .va_numbers
                    .into_iter()
                    .next()
                    .ok_or_else(|| GatewayError::Malformed("va_numbers is empty".to_string()))?;
                detail.bank = BankChannel::parse(&va.bank).or(Some(bank));
                detail.va_number = va.va_number;
            }
            MidtransProduct::Permata => {
                detail.bank = Some(BankChannel::Permata);
                detail.va_number = r.permata_va_number;
            }
            MidtransProduct::Echannel => {
                detail.bank = Some(BankChannel::Mandiri);
                detail.bill_key = r.bill_key;
                detail.bill_code = r.biller_code;
            }
            MidtransProduct::Gopay | MidtransProduct::ShopeePay | MidtransProduct::Qris => {
                detail.redirect_actions = r
                    .actions
                    .into_iter()
                    .map(|a| RedirectAction {
                        name: a.name,
                        method: a.method,
                        url: a.url,
                    })
                    .collect();
            }
            MidtransProduct::Dana => {
                detail.bank = Some(BankChannel::Dana);
                detail.redirect_actions = vec![RedirectAction {
                    name: "snap url".to_string(),
                    method: "GET".to_string(),
                    url: r.redirect_url,
                }];
            }
        }
        Ok(base_response(payment, channel, self.payment_type(), detail))
    }

    fn map_status(&self, _payment: &Payment, raw: &RawStatus) -> Result<PaymentStatus, GatewayError> {
        map_transaction_status(&raw.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Currency, Customer};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn request() -> GatewayRequest {
        GatewayRequest {
            transaction_id: "TRX-1".to_string(),
            order_id: "ORD-1".to_string(),
            amount: dec!(10000),
            fee: dec!(4000),
            total: dec!(14000),
            currency: Currency::Idr,
            customer: Customer {
                id: "M1".to_string(),
                name: "Budi Santoso".to_string(),
                email: "b@example.com".to_string(),
                phone: "0812".to_string(),
            },
            bank_code: "014".to_string(),
            product_code: "BCA".to_string(),
            product_name: "Order ORD-1".to_string(),
            expiry_minutes: 180,
            return_url: String::new(),
            rq_uuid: "u".to_string(),
            requested_at: Utc::now(),
        }
    }

    #[test]
    fn bank_transfer_body_uses_lowercase_bank_and_total() {
        let adapter = MidtransAdapter::new(HttpTransport::new(1000), MidtransProduct::BankTransfer(BankChannel::Bni));
        let body = adapter.charge_body(&GatewayCredentials::default(), &request());
        assert_eq!(body["payment_type"], "bank_transfer");
        assert_eq!(body["bank_transfer"]["bank"], "bni");
        assert_eq!(body["transaction_details"]["gross_amount"], 14000);
        assert_eq!(body["customer_details"]["last_name"], "Santoso");
    }

    #[test]
    fn authorize_is_not_a_final_status() {
        assert!(map_transaction_status("authorize").is_err());
        assert_eq!(map_transaction_status("settlement").unwrap(), PaymentStatus::Success);
        assert_eq!(map_transaction_status("expire").unwrap(), PaymentStatus::Expired);
        assert_eq!(map_transaction_status("something").unwrap(), PaymentStatus::Pending);
    }

    #[test]
    fn embedded_error_code_in_status_reply_is_rejected() {
        let err = status_reply(json!({
            "status_code": "404",
            "status_message": "Transaction doesn't exist."
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Rejected { ref code, ref message }
                if code == "404" && message == "Transaction doesn't exist."
        ));
        assert!(status_reply(json!({"transaction_status": "settlement"})).is_err());
    }

    #[test]
    fn status_reply_reads_transaction_status() {
        let raw = status_reply(json!({
            "status_code": "200",
            "transaction_status": "settlement",
            "transaction_id": "mt-1"
        }))
        .unwrap();
        assert_eq!(raw.status, "settlement");
        assert_eq!(raw.reference_id.as_deref(), Some("mt-1"));

        let expired = status_reply(json!({"status_code": "407", "transaction_status": "expire"})).unwrap();
        assert_eq!(map_transaction_status(&expired.status).unwrap(), PaymentStatus::Expired);
    }
}
