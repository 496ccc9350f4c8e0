use crate::domain::audit::{Actor, StatusChange};
use crate::domain::configuration::GatewayCredentials;
use crate::domain::payment::{Currency, Payment, PaymentMethod, PaymentStatus};
use crate::domain::wallet::TopupCommand;
use crate::error::PaymentError;
use crate::fee;
use crate::gateways::espay::{response_code, response_message, EspayService};
use crate::gateways::midtrans::map_transaction_status;
use crate::gateways::registry::AggregatorFamily;
use crate::gateways::senangpay::map_callback_status;
use crate::service::store::PaymentStore;
use crate::service::webhook_dispatcher::WebhookDispatcher;
use crate::signature::{midtrans_notification_signature, verify_espay_signature, verify_senangpay_callback};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidtransNotification {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub fraud_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SenangpayCallback {
    pub status_id: String,
    pub order_id: String,
    pub transaction_id: String,
    #[serde(default)]
    pub msg: String,
    pub hash: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapAmount {
    pub value: String,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EspayInquiry {
    pub partner_service_id: String,
    pub customer_no: String,
    pub virtual_account_no: String,
    pub inquiry_request_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EspayPaymentNotification {
    pub partner_service_id: String,
    pub customer_no: String,
    pub virtual_account_no: String,
    pub payment_request_id: String,
    pub paid_amount: SnapAmount,
    pub trx_date_time: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopupInfo {
    pub user_id: String,
    pub debit_from: String,
    pub debit_from_name: String,
    pub debit_from_bank: String,
    pub product_value: String,
    pub member_code: String,
}

impl TopupInfo {
    /// First non-empty field that can carry the wallet's `gen_va`.
    pub fn gen_va(&self) -> Option<&str> {
        [&self.user_id, &self.debit_from, &self.debit_from_name, &self.product_value]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EspayTopupNotification {
    pub virtual_account_no: String,
    pub trx_id: String,
    pub total_amount: SnapAmount,
    pub additional_info: TopupInfo,
}

/// Body and HTTP status answered to Espay. Espay reads `responseCode`, never
/// the error envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct EspayAck {
    pub http_code: u16,
    pub body: Value,
}

impl EspayAck {
    pub fn success(service: EspayService, extra: Value) -> Self {
        let mut body = json!({
            "responseCode": response_code(200, service, "00"),
            "responseMessage": response_message(200, "00", ""),
        });
        if let (Some(target), Value::Object(fields)) = (body.as_object_mut(), extra) {
            target.extend(fields);
        }
        Self { http_code: 200, body }
    }

    pub fn failure(http_code: u16, service: EspayService, case_code: &str, detail: &str) -> Self {
        Self {
            http_code,
            body: json!({
                "responseCode": response_code(http_code, service, case_code),
                "responseMessage": response_message(http_code, case_code, detail),
            }),
        }
    }

    pub fn response_code(&self) -> &str {
        self.body.get("responseCode").and_then(Value::as_str).unwrap_or_default()
    }
}

/// Inbound aggregator notifications. Every status change goes through the
/// same unit as reconciliation and is followed by a platform notification.
#[derive(Clone)]
pub struct CallbackService {
    pub store: Arc<dyn PaymentStore>,
    pub notifier: WebhookDispatcher,
}

impl CallbackService {
    /// The payment behind `order_id` together with its credentials, but only
    /// when it was routed through `family`. Anything else reads as `None` so
    /// callers answer unknown and foreign orders the same way.
    async fn routed_payment(
        &self,
        order_id: &str,
        family: AggregatorFamily,
    ) -> Result<Option<(Payment, GatewayCredentials)>, PaymentError> {
        let Some(payment) = self.store.find_by_order_id(order_id).await? else {
            return Ok(None);
        };
        let Some(aggregator_id) = payment.aggregator_id else {
            return Ok(None);
        };
        let Some(configuration) = self.store.find_configuration(payment.platform_id, aggregator_id).await? else {
            return Ok(None);
        };
        if AggregatorFamily::parse_slug(&configuration.aggregator_slug).ok() != Some(family) {
            return Ok(None);
        }
        Ok(Some((payment, configuration.credentials())))
    }

    fn accept_open(payment: Payment) -> Result<Payment, PaymentError> {
        if payment.status.is_terminal() {
            return Err(PaymentError::Accepted("notification has been accepted".to_string()));
        }
        Ok(payment)
    }

    async fn apply(&self, change: StatusChange) -> Result<Payment, PaymentError> {
        match self.store.apply_status_change(&change).await? {
            Some(updated) => {
                info!(
                    transaction_id = %updated.transaction_id,
                    status = updated.status.as_str(),
                    source = %change.source,
                    "payment status updated from callback"
                );
                self.notifier.spawn(updated.clone());
                Ok(updated)
            }
            None => Err(PaymentError::Accepted("notification has been accepted".to_string())),
        }
    }

    pub async fn midtrans(&self, notification: MidtransNotification) -> Result<Payment, PaymentError> {
        let verified = self
            .routed_payment(&notification.order_id, AggregatorFamily::Midtrans)
            .await?
            .filter(|(_, creds)| {
                !creds.server_key.is_empty()
                    && midtrans_notification_signature(
                        &notification.order_id,
                        &notification.status_code,
                        &notification.gross_amount,
                        &creds.server_key,
                    )
                    .eq_ignore_ascii_case(notification.signature_key.trim())
            });
        let Some((payment, _)) = verified else {
            warn!(order_id = %notification.order_id, "midtrans signature mismatch");
            return Err(PaymentError::Signature("invalid signature key".to_string()));
        };
        let payment = Self::accept_open(payment)?;

        let status = map_transaction_status(&notification.transaction_status)?;
        if status == payment.status {
            return Err(PaymentError::Accepted("notification has been accepted".to_string()));
        }
        let payload = serde_json::to_value(&notification).map_err(|e| PaymentError::Internal(e.to_string()))?;
        let change = StatusChange::new(payment.id, status, "webhook_midtrans", payload, Actor::midtrans_callback())
            .with_reference(notification.transaction_id.clone())
            .with_note(format!("midtrans reported {}", notification.transaction_status));
        self.apply(change).await
    }

    pub async fn senangpay(&self, callback: SenangpayCallback) -> Result<Payment, PaymentError> {
        let verified = self
            .routed_payment(&callback.order_id, AggregatorFamily::Senangpay)
            .await?
            .filter(|(_, creds)| {
                verify_senangpay_callback(
                    &creds.secret_key,
                    &callback.status_id,
                    &callback.order_id,
                    &callback.transaction_id,
                    &callback.msg,
                    &callback.hash,
                )
            });
        let Some((payment, _)) = verified else {
            warn!(order_id = %callback.order_id, "senangpay hash mismatch");
            return Err(PaymentError::Signature("invalid hash".to_string()));
        };
        let payment = Self::accept_open(payment)?;

        let status = map_callback_status(&callback.status_id);
        let payload = serde_json::to_value(&callback).map_err(|e| PaymentError::Internal(e.to_string()))?;
        let change = StatusChange::new(
            payment.id,
            status,
            "webhook_senangpay",
            payload,
            Actor::callback(AggregatorFamily::Senangpay.as_str()),
        )
        .with_reference(Some(callback.transaction_id.clone()))
        .with_note(callback.msg.clone());
        self.apply(change).await
    }

    /// Checks `X-SIGNATURE` against the Espay configuration's public key.
    pub async fn verify_espay(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: &str,
        signature: &str,
    ) -> Result<(), PaymentError> {
        let configuration = self
            .store
            .find_configuration_by_slug(AggregatorFamily::Espay.as_str(), Currency::Idr)
            .await?
            .ok_or_else(|| PaymentError::NotFound("espay configuration".to_string()))?;
        if timestamp.is_empty() || signature.is_empty() {
            return Err(PaymentError::Signature("X-TIMESTAMP and X-SIGNATURE are required".to_string()));
        }
        if !verify_espay_signature(&configuration.config_json.public_key, method, path, body, timestamp, signature) {
            warn!(path, "espay signature mismatch");
            return Err(PaymentError::Signature("invalid X-SIGNATURE".to_string()));
        }
        Ok(())
    }

    pub async fn espay_inquiry(&self, inquiry: EspayInquiry) -> EspayAck {
        let order_id = inquiry.virtual_account_no.trim();
        let payment = match self.routed_payment(order_id, AggregatorFamily::Espay).await {
            Ok(Some((p, _))) => p,
            Ok(None) => return EspayAck::failure(404, EspayService::Inquiry, "01", ""),
            Err(e) => {
                error!(order_id, error = %e, "espay inquiry lookup failed");
                return EspayAck::failure(500, EspayService::Inquiry, "01", "");
            }
        };
        if payment.status == PaymentStatus::Success {
            return EspayAck::failure(404, EspayService::Inquiry, "14", "");
        }
        if payment.status.is_terminal() {
            return EspayAck::failure(404, EspayService::Inquiry, "01", "");
        }

        EspayAck::success(
            EspayService::Inquiry,
            json!({
                "virtualAccountData": {
                    "partnerServiceId": inquiry.partner_service_id,
                    "customerNo": inquiry.customer_no,
                    "virtualAccountNo": inquiry.virtual_account_no,
                    "virtualAccountName": payment.customer.name,
                    "virtualAccountEmail": payment.customer.email,
                    "virtualAccountPhone": payment.customer.phone,
                    "inquiryRequestId": inquiry.inquiry_request_id,
                    "totalAmount": {
                        "value": format!("{}.00", payment.amount.trunc()),
                        "currency": payment.currency.as_str(),
                    },
                    "billDetails": [{
                        "billDescription": {
                            "english": format!("Invoice No {}", payment.order_id),
                            "indonesia": format!("Tagihan No {}", payment.order_id),
                        }
                    }],
                }
            }),
        )
    }

    pub async fn espay_payment(&self, notification: EspayPaymentNotification) -> EspayAck {
        let order_id = notification.virtual_account_no.trim().to_string();
        let payment = match self.routed_payment(&order_id, AggregatorFamily::Espay).await {
            Ok(Some((p, _))) => p,
            Ok(None) => return EspayAck::failure(404, EspayService::Payment, "01", ""),
            Err(e) => {
                error!(order_id = %order_id, error = %e, "espay payment lookup failed");
                return EspayAck::failure(500, EspayService::Payment, "01", "");
            }
        };

        let paid = if payment.status == PaymentStatus::Success {
            payment
        } else if payment.status.is_terminal() {
            return EspayAck::failure(404, EspayService::Payment, "01", "");
        } else {
            let payload = match serde_json::to_value(&notification) {
                Ok(v) => v,
                Err(e) => {
                    error!(error = %e, "espay payment payload not serializable");
                    return EspayAck::failure(500, EspayService::Payment, "01", "");
                }
            };
            let change = StatusChange::new(
                payment.id,
                PaymentStatus::Success,
                "webhook_espay",
                payload,
                Actor::callback(AggregatorFamily::Espay.as_str()),
            )
            .with_reference(Some(notification.payment_request_id.clone()).filter(|r| !r.is_empty()))
            .with_note("espay payment notification");
            match self.apply(change).await {
                Ok(p) => p,
                Err(PaymentError::Accepted(_)) => match self.store.find_by_order_id(&order_id).await {
                    Ok(Some(p)) if p.status == PaymentStatus::Success => p,
                    _ => return EspayAck::failure(404, EspayService::Payment, "01", ""),
                },
                Err(e) => {
                    error!(order_id = %order_id, error = %e, "espay payment update failed");
                    return EspayAck::failure(500, EspayService::Payment, "01", "");
                }
            }
        };

        EspayAck::success(
            EspayService::Payment,
            json!({
                "virtualAccountData": {
                    "partnerServiceId": notification.partner_service_id,
                    "customerNo": notification.customer_no,
                    "virtualAccountNo": notification.virtual_account_no,
                    "paymentRequestId": notification.payment_request_id,
                    "paidAmount": notification.paid_amount,
                },
                "additionalInfo": {
                    "reconcileId": paid.transaction_id,
                    "reconcileDatetime": paid.paid_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                }
            }),
        )
    }

    pub async fn espay_topup(&self, notification: EspayTopupNotification) -> EspayAck {
        match self.topup(&notification).await {
            Ok(transaction_code) => EspayAck::success(
                EspayService::Payment,
                json!({
                    "virtualAccountNo": notification.virtual_account_no,
                    "additionalInfo": { "reconcileId": transaction_code },
                }),
            ),
            Err(PaymentError::Accepted(_)) => {
                info!(trx_id = %notification.trx_id, "duplicate espay top-up ignored");
                EspayAck::success(
                    EspayService::Payment,
                    json!({
                        "virtualAccountNo": notification.virtual_account_no,
                        "additionalInfo": { "reconcileId": notification.trx_id },
                    }),
                )
            }
            Err(PaymentError::NotFound(what)) => EspayAck::failure(404, EspayService::Payment, "01", &what),
            Err(PaymentError::Validation(msg)) => EspayAck::failure(400, EspayService::Payment, "01", &msg),
            Err(e) => {
                error!(trx_id = %notification.trx_id, error = %e, "espay top-up failed");
                EspayAck::failure(500, EspayService::Payment, "01", "")
            }
        }
    }

    async fn topup(&self, notification: &EspayTopupNotification) -> Result<String, PaymentError> {
        let info = &notification.additional_info;
        let gen_va = info
            .gen_va()
            .ok_or_else(|| PaymentError::Validation("additionalInfo.userId".to_string()))?;
        if notification.trx_id.trim().is_empty() {
            return Err(PaymentError::Validation("trxId".to_string()));
        }
        let currency = match notification.total_amount.currency.trim() {
            "" => Currency::Idr,
            other => Currency::parse(other)
                .ok_or_else(|| PaymentError::Validation("totalAmount.currency".to_string()))?,
        };
        let amount = Decimal::from_str(notification.total_amount.value.trim())
            .map_err(|_| PaymentError::Validation("totalAmount.value".to_string()))?;
        let channel = self
            .store
            .find_channel_by_bank_code(PaymentMethod::VirtualAccount, info.debit_from_bank.trim(), currency)
            .await?
            .ok_or_else(|| PaymentError::NotFound("channel".to_string()))?;

        let command = TopupCommand {
            gen_va: gen_va.to_string(),
            channel_id: channel.id,
            aggregator: AggregatorFamily::Espay.as_str().to_string(),
            merchant: info.member_code.clone(),
            amount,
            fee: fee::calculate(amount, &channel.fee_policy).fee,
            currency,
            reference_id: notification.trx_id.clone(),
            transaction_code: Uuid::new_v4().to_string(),
        };
        let (wallet, entry) = self.store.topup(&command).await?;
        info!(
            wallet_id = wallet.id,
            credited = %entry.amount,
            balance = %wallet.balance,
            "k-wallet topped up"
        );
        Ok(command.transaction_code)
    }
}
