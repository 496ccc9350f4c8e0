use crate::domain::channel::Channel;
use crate::domain::payment::{
    BankChannel, Currency, Payment, PaymentMethod, PaymentStatus, PaymentType,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregator-agnostic response returned to platforms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResponse {
    pub id: i64,
    pub transaction_id: String,
    pub order_id: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub fee_admin: i64,
    pub total_amount: i64,
    pub currency: Currency,
    pub payment_method: PaymentMethod,
    pub payment_type: PaymentType,
    pub payment_detail: PaymentDetail,
    pub customer: CanonicalCustomer,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetail {
    pub bank: Option<BankChannel>,
    pub redirect_actions: Vec<RedirectAction>,
    pub va_number: String,
    pub bill_key: String,
    pub bill_code: String,
    pub transaction_time: String,
    pub expire_time: String,
    pub instruction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedirectAction {
    pub name: String,
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalCustomer {
    pub member_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Body posted to the platform's notification URL after a status change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCallback {
    pub transaction_id: String,
    pub order_id: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: Currency,
}

pub fn whole(value: Decimal) -> i64 {
    value.trunc().to_i64().unwrap_or_default()
}

/// Payment-level fields shared by every adapter; callers fill in the detail.
pub fn base_response(
    payment: &Payment,
    channel: &Channel,
    payment_type: PaymentType,
    detail: PaymentDetail,
) -> CanonicalResponse {
    CanonicalResponse {
        id: payment.id,
        transaction_id: payment.transaction_id.clone(),
        order_id: payment.order_id.clone(),
        status: payment.status,
        amount: whole(payment.amount),
        fee_admin: whole(payment.fee_amount),
        total_amount: whole(payment.total_amount),
        currency: payment.currency,
        payment_method: channel.payment_method,
        payment_type,
        payment_detail: PaymentDetail {
            bank: detail.bank.or(channel.bank_name),
            instruction: if detail.instruction.is_empty() {
                channel.instruction.clone()
            } else {
                detail.instruction
            },
            ..detail
        },
        customer: CanonicalCustomer {
            member_id: payment.customer.id.clone(),
            name: payment.customer.name.clone(),
            email: payment.customer.email.clone(),
            phone: payment.customer.phone.clone(),
        },
        created_at: payment.created_at,
        updated_at: payment.updated_at,
    }
}

impl PlatformCallback {
    pub fn from_payment(payment: &Payment) -> Self {
        Self {
            transaction_id: payment.transaction_id.clone(),
            order_id: payment.order_id.clone(),
            status: payment.status,
            amount: whole(payment.total_amount),
            currency: payment.currency,
        }
    }
}
