use crate::domain::canonical::{base_response, CanonicalResponse, PaymentDetail, RedirectAction};
use crate::domain::channel::Channel;
use crate::domain::configuration::GatewayCredentials;
use crate::domain::payment::{Payment, PaymentStatus, PaymentType};
use crate::error::GatewayError;
use crate::gateways::{
    amount_string, jakarta, parse_stored, read_json, str_field, GatewayAdapter, GatewayReply,
    GatewayRequest, HttpTransport, RawStatus, StatusQuery,
};
use crate::signature::{espay_asymmetric_signature, espay_hash_signature, EspayAction, HashSignatureInput};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

pub const PATH_SEND_INVOICE: &str = "/rest/merchantpg/sendinvoice";
pub const PATH_HOST_TO_HOST: &str = "/api/v1.0/debit/payment-host-to-host";
pub const PATH_QRIS_MPM: &str = "/api/v1.0/qr/qr-mpm-generate";
pub const PATH_VA_STATUS: &str = "/apimerchant/v1.0/transfer-va/status";

pub const CODE_INVOICE_OK: &str = "0000";
pub const CODE_HOST_TO_HOST_OK: &str = "2005400";
pub const CODE_QRIS_OK: &str = "2004700";
pub const CODE_VA_STATUS_OK: &str = "2002600";

/// SNAP service codes used to build `responseCode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EspayService {
    Inquiry,
    Payment,
    InquiryStatus,
    CreateVa,
    DeleteVa,
    QrisMpm,
    HostToHost,
}

impl EspayService {
    pub fn code(&self) -> &'static str {
        match self {
            EspayService::Inquiry => "24",
            EspayService::Payment => "25",
            EspayService::InquiryStatus => "26",
            EspayService::CreateVa => "27",
            EspayService::DeleteVa => "31",
            EspayService::QrisMpm => "47",
            EspayService::HostToHost => "54",
        }
    }
}

/// `httpCode ++ serviceCode ++ caseCode`, e.g. `2002400`.
pub fn response_code(http_code: u16, service: EspayService, case_code: &str) -> String {
    format!("{}{}{}", http_code, service.code(), case_code)
}

pub fn response_message(http_code: u16, case_code: &str, detail: &str) -> String {
    match (http_code, case_code) {
        (200, "00") => "Successful, Transaction successful.".to_string(),
        (400, "01") => format!(
            "Invalid / Missing Field Format {detail}, Invalid data format in field {detail}"
        ),
        (400, "02") => format!(
            "Invalid Mandatory Field {detail}, Some mandatory parameters are missing or have an invalid format."
        ),
        (401, "00") => format!("Unauthorized. [{detail}], Authentication failed."),
        (404, "01") => "Transaction Not Found.".to_string(),
        (404, "14") => "Bill has been paid, The bill has already been paid.".to_string(),
        (500, "01") => {
            "Internal Server Error, An internal error occurred while processing the transaction."
                .to_string()
        }
        (504, _) => "Timeout, Transaction requests to the bank or issuer are taking longer than usual."
            .to_string(),
        _ => "General Error, A general error occurred while processing the transaction.".to_string(),
    }
}

fn snap_amount(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

/// Posts an asymmetrically signed SNAP request. The signature covers the
/// exact bytes that are sent.
async fn post_signed(
    transport: &HttpTransport,
    creds: &GatewayCredentials,
    path: &str,
    body: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<serde_json::Value, GatewayError> {
    let bytes = serde_json::to_vec(body)?;
    let timestamp = jakarta(now);
    let signature = espay_asymmetric_signature(&creds.private_key, "POST", path, &bytes, &timestamp)?;

    let resp = transport
        .client
        .post(format!("{}{}", creds.base_url, path))
        .header("Content-Type", "application/json")
        .header("X-TIMESTAMP", timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .header("X-SIGNATURE", signature)
        .header("X-EXTERNAL-ID", Uuid::new_v4().to_string())
        .header("X-PARTNER-ID", &creds.merchant_code)
        .header("CHANNEL-ID", "ESPAY")
        .body(bytes)
        .timeout(transport.timeout)
        .send()
        .await;
    read_json(resp).await
}

fn expect_code(v: &serde_json::Value, field: &str, expected: &str) -> Result<(), GatewayError> {
    let code = match v.get(field) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if code == expected {
        return Ok(());
    }
    let message = ["responseMessage", "error_message"]
        .iter()
        .map(|k| str_field(v, k))
        .find(|m| !m.is_empty())
        .unwrap_or("unknown error")
        .to_string();
    Err(GatewayError::Rejected { code, message })
}

/// Queries the SNAP virtual-account status endpoint, shared by every Espay
/// adapter.
async fn va_status(
    transport: &HttpTransport,
    creds: &GatewayCredentials,
    query: &StatusQuery,
) -> Result<RawStatus, GatewayError> {
    let body = json!({
        "partnerServiceId": creds.merchant_code,
        "customerNo": query.order_id,
        "virtualAccountNo": query.order_id,
        "inquiryRequestId": query.transaction_id,
    });
    let v = post_signed(transport, creds, PATH_VA_STATUS, &body, Utc::now()).await?;
    expect_code(&v, "responseCode", CODE_VA_STATUS_OK)?;
    let data = v.get("virtualAccountData").cloned().unwrap_or_default();
    Ok(RawStatus {
        status: str_field(&data, "latestTransactionStatus").to_string(),
        reference_id: data
            .get("referenceNo")
            .and_then(|x| x.as_str())
            .map(str::to_string),
        raw: v,
    })
}

/// SNAP `latestTransactionStatus` to canonical status.
pub fn map_snap_status(code: &str) -> PaymentStatus {
    match code {
        "00" => PaymentStatus::Success,
        "01" | "02" | "03" => PaymentStatus::Pending,
        "05" => PaymentStatus::Cancelled,
        "06" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

fn expire_time(payment: &Payment) -> String {
    payment
        .expired_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct InvoiceResponse {
    #[serde(default)]
    rs_datetime: String,
    #[serde(default)]
    va_number: String,
    #[serde(default)]
    expired: String,
}

/// Virtual account via form-encoded invoice submission.
pub struct EspayVirtualAccount {
    pub transport: HttpTransport,
}

#[async_trait::async_trait]
impl GatewayAdapter for EspayVirtualAccount {
    fn name(&self) -> &'static str {
        "espay_virtual_account"
    }

    async fn pay(
        &self,
        creds: &GatewayCredentials,
        request: &GatewayRequest,
    ) -> Result<GatewayReply, GatewayError> {
        let amount = amount_string(request.total);
        let rq_datetime = jakarta(request.requested_at).naive_local();
        let signature = espay_hash_signature(&HashSignatureInput {
            signature_key: &creds.signature_key,
            rq_uuid: &request.rq_uuid,
            rq_datetime,
            order_id: &request.order_id,
            amount: &amount,
            currency: request.currency.as_str(),
            comm_code: &creds.merchant_code,
            action: EspayAction::SendInvoice,
        });
        let form = [
            ("rq_uuid", request.rq_uuid.clone()),
            ("rq_datetime", rq_datetime.format("%Y-%m-%d %H:%M:%S").to_string()),
            ("order_id", request.order_id.clone()),
            ("amount", amount),
            ("ccy", request.currency.as_str().to_string()),
            ("comm_code", creds.merchant_code.clone()),
            ("remark1", request.customer.phone.clone()),
            ("remark2", request.customer.name.clone()),
            ("remark3", request.customer.email.clone()),
            ("remark4", creds.merchant_name.clone()),
            ("update", "N".to_string()),
            ("bank_code", request.bank_code.clone()),
            ("va_expired", request.expiry_minutes.to_string()),
            ("signature", signature),
        ];

        let resp = self
            .transport
            .client
            .post(format!("{}{}", creds.base_url, PATH_SEND_INVOICE))
            .header("Accept", "*/*")
            .form(&form)
            .timeout(self.transport.timeout)
            .send()
            .await;
        let v = read_json(resp).await?;
        expect_code(&v, "error_code", CODE_INVOICE_OK)?;
        Ok(GatewayReply { raw: v })
    }

    async fn check_status(
        &self,
        creds: &GatewayCredentials,
        query: &StatusQuery,
    ) -> Result<RawStatus, GatewayError> {
        va_status(&self.transport, creds, query).await
    }

    fn map_to_canonical(
        &self,
        channel: &Channel,
        payment: &Payment,
    ) -> Result<CanonicalResponse, GatewayError> {
        let r: InvoiceResponse = parse_stored(payment)?;
        Ok(base_response(
            payment,
            channel,
            PaymentType::Va,
            PaymentDetail {
                va_number: r.va_number,
                transaction_time: r.rs_datetime,
                expire_time: if r.expired.is_empty() { expire_time(payment) } else { r.expired },
                ..Default::default()
            },
        ))
    }

    fn map_status(&self, _payment: &Payment, raw: &RawStatus) -> Result<PaymentStatus, GatewayError> {
        Ok(map_snap_status(&raw.status))
    }
}

/// Credit card through the host-to-host redirect flow.
pub struct EspayCreditCard {
    pub transport: HttpTransport,
}

#[async_trait::async_trait]
impl GatewayAdapter for EspayCreditCard {
    fn name(&self) -> &'static str {
        "espay_credit_card"
    }

    async fn pay(
        &self,
        creds: &GatewayCredentials,
        request: &GatewayRequest,
    ) -> Result<GatewayReply, GatewayError> {
        let ccy = request.currency.as_str();
        let valid_up_to = jakarta(request.requested_at + Duration::minutes(request.expiry_minutes));
        let return_url = if request.return_url.is_empty() {
            creds.return_url.clone()
        } else {
            request.return_url.clone()
        };
        let body = json!({
            "partnerReferenceNo": request.order_id,
            "merchantId": creds.merchant_code,
            "subMerchantId": creds.api_key,
            "amount": { "value": snap_amount(request.amount), "currency": ccy },
            "urlParam": { "url": return_url, "type": "PAY_RETURN", "isDeeplink": "N" },
            "validUpTo": valid_up_to.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "pointOfInitiation": "",
            "payOptionDetails": {
                "payMethod": request.bank_code,
                "payOption": request.product_code,
                "transAmount": { "value": snap_amount(request.amount), "currency": ccy },
                "feeAmount": { "value": snap_amount(request.fee), "currency": ccy },
            },
            "additionalInfo": {
                "payType": "REDIRECT",
                "userId": request.customer.id,
                "userName": request.customer.name,
                "userEmail": request.customer.email,
                "userPhone": request.customer.phone,
                "productCode": request.product_code,
            },
        });
        let v = post_signed(&self.transport, creds, PATH_HOST_TO_HOST, &body, request.requested_at).await?;
        expect_code(&v, "responseCode", CODE_HOST_TO_HOST_OK)?;
        Ok(GatewayReply { raw: v })
    }

    async fn check_status(
        &self,
        creds: &GatewayCredentials,
        query: &StatusQuery,
    ) -> Result<RawStatus, GatewayError> {
        va_status(&self.transport, creds, query).await
    }

    fn map_to_canonical(
        &self,
        channel: &Channel,
        payment: &Payment,
    ) -> Result<CanonicalResponse, GatewayError> {
        let v: serde_json::Value = parse_stored(payment)?;
        expect_code(&v, "responseCode", CODE_HOST_TO_HOST_OK)?;
        let url = str_field(&v, "webRedirectUrl").to_string();
        Ok(base_response(
            payment,
            channel,
            PaymentType::Redirect,
            PaymentDetail {
                redirect_actions: vec![RedirectAction {
                    name: "url payment".to_string(),
                    method: "GET".to_string(),
                    url,
                }],
                transaction_time: payment.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                expire_time: expire_time(payment),
                ..Default::default()
            },
        ))
    }

    fn map_status(&self, _payment: &Payment, raw: &RawStatus) -> Result<PaymentStatus, GatewayError> {
        Ok(map_snap_status(&raw.status))
    }
}

/// Dynamic QRIS (merchant-presented mode).
pub struct EspayQris {
    pub transport: HttpTransport,
}

#[async_trait::async_trait]
impl GatewayAdapter for EspayQris {
    fn name(&self) -> &'static str {
        "espay_qris"
    }

    async fn pay(
        &self,
        creds: &GatewayCredentials,
        request: &GatewayRequest,
    ) -> Result<GatewayReply, GatewayError> {
        let validity = jakarta(request.requested_at + Duration::minutes(request.expiry_minutes));
        let body = json!({
            "partnerReferenceNo": request.order_id,
            "merchantId": creds.merchant_code,
            "amount": { "value": snap_amount(request.total), "currency": request.currency.as_str() },
            "additionalInfo": { "productCode": request.product_code },
            "validityPeriod": validity.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        });
        let v = post_signed(&self.transport, creds, PATH_QRIS_MPM, &body, request.requested_at).await?;
        expect_code(&v, "responseCode", CODE_QRIS_OK)?;
        Ok(GatewayReply { raw: v })
    }

    async fn check_status(
        &self,
        creds: &GatewayCredentials,
        query: &StatusQuery,
    ) -> Result<RawStatus, GatewayError> {
        va_status(&self.transport, creds, query).await
    }

    fn map_to_canonical(
        &self,
        channel: &Channel,
        payment: &Payment,
    ) -> Result<CanonicalResponse, GatewayError> {
        let v: serde_json::Value = parse_stored(payment)?;
        let mut actions = Vec::new();
        let qr_url = str_field(&v, "qrUrl");
        if !qr_url.is_empty() {
            actions.push(RedirectAction {
                name: "generate-qr-code".to_string(),
                method: "GET".to_string(),
                url: qr_url.to_string(),
            });
        }
        Ok(base_response(
            payment,
            channel,
            PaymentType::Qris,
            PaymentDetail {
                redirect_actions: actions,
                va_number: str_field(&v, "qrContent").to_string(),
                transaction_time: payment.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                expire_time: expire_time(payment),
                ..Default::default()
            },
        ))
    }

    fn map_status(&self, _payment: &Payment, raw: &RawStatus) -> Result<PaymentStatus, GatewayError> {
        Ok(map_snap_status(&raw.status))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticVa {
    #[serde(default)]
    pub bank_code: String,
    #[serde(default)]
    pub va_number: String,
}

#[derive(Debug, Clone)]
pub struct StaticVaRequest {
    pub rq_uuid: String,
    pub requested_at: DateTime<Utc>,
    pub gen_va: String,
    pub currency: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub bank_code: String,
}

/// Requests open-amount virtual accounts used to top up a wallet. The
/// result is keyed by bank code.
pub async fn create_static_va(
    transport: &HttpTransport,
    creds: &GatewayCredentials,
    request: &StaticVaRequest,
) -> Result<HashMap<String, StaticVa>, GatewayError> {
    let rq_datetime = jakarta(request.requested_at).naive_local();
    let signature = espay_hash_signature(&HashSignatureInput {
        signature_key: &creds.signature_key,
        rq_uuid: &request.rq_uuid,
        rq_datetime,
        order_id: &request.gen_va,
        amount: "",
        currency: &request.currency,
        comm_code: &creds.merchant_code,
        action: EspayAction::SendInvoice,
    });
    let form = [
        ("rq_uuid", request.rq_uuid.clone()),
        ("rq_datetime", rq_datetime.format("%Y-%m-%d %H:%M:%S").to_string()),
        ("order_id", request.gen_va.clone()),
        ("amount", String::new()),
        ("ccy", request.currency.clone()),
        ("comm_code", creds.merchant_code.clone()),
        ("remark1", request.customer_phone.clone()),
        ("remark2", request.customer_name.clone()),
        ("remark3", request.customer_email.clone()),
        ("remark4", creds.merchant_name.clone()),
        ("update", "N".to_string()),
        ("bank_code", request.bank_code.clone()),
        ("va_expired", "999999".to_string()),
        ("signature", signature),
    ];
    let resp = transport
        .client
        .post(format!("{}{}", creds.base_url, PATH_SEND_INVOICE))
        .form(&form)
        .timeout(transport.timeout)
        .send()
        .await;
    let v = read_json(resp).await?;
    expect_code(&v, "error_code", CODE_INVOICE_OK)?;
    let list = v.get("va_list").cloned().unwrap_or_else(|| json!({}));
    Ok(serde_json::from_value(list)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_snap_response_codes() {
        assert_eq!(response_code(200, EspayService::Inquiry, "00"), "2002400");
        assert_eq!(response_code(404, EspayService::Payment, "01"), "4042501");
        assert_eq!(response_code(200, EspayService::HostToHost, "00"), CODE_HOST_TO_HOST_OK);
        assert_eq!(response_code(200, EspayService::QrisMpm, "00"), CODE_QRIS_OK);
    }

    #[test]
    fn rejects_unexpected_code_with_message() {
        let v = json!({"responseCode": "4005401", "responseMessage": "Bad Request"});
        let err = expect_code(&v, "responseCode", CODE_HOST_TO_HOST_OK).unwrap_err();
        match err {
            GatewayError::Rejected { code, message } => {
                assert_eq!(code, "4005401");
                assert_eq!(message, "Bad Request");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn numeric_error_code_is_not_success() {
        let v = json!({"error_code": 0});
        assert!(expect_code(&v, "error_code", CODE_INVOICE_OK).is_err());
        let v = json!({"error_code": "0000"});
        assert!(expect_code(&v, "error_code", CODE_INVOICE_OK).is_ok());
    }

    #[test]
    fn snap_status_vocabulary() {
        assert_eq!(map_snap_status("00"), PaymentStatus::Success);
        assert_eq!(map_snap_status("06"), PaymentStatus::Failed);
        assert_eq!(map_snap_status("99"), PaymentStatus::Pending);
    }
}
