use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "success" => Some(PaymentStatus::Success),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            "expired" => Some(PaymentStatus::Expired),
            _ => None,
        }
    }

    /// Terminal payments are never mutated again by reconciliation or webhooks.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Success
                | PaymentStatus::Failed
                | PaymentStatus::Expired
                | PaymentStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "CREDIT_CARD")]
    CreditCard,
    #[serde(rename = "BANK_TRANSFER")]
    BankTransfer,
    #[serde(rename = "VIRTUAL_ACCOUNT")]
    VirtualAccount,
    #[serde(rename = "QRIS")]
    Qris,
    #[serde(rename = "GOPAY")]
    Gopay,
    #[serde(rename = "K-WALLET")]
    KWallet,
    #[serde(rename = "E-WALLET")]
    EWallet,
    #[serde(rename = "RETAIL_OUTLET")]
    RetailOutlet,
    #[serde(rename = "SENANGPAY")]
    Senangpay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::VirtualAccount => "VIRTUAL_ACCOUNT",
            PaymentMethod::Qris => "QRIS",
            PaymentMethod::Gopay => "GOPAY",
            PaymentMethod::KWallet => "K-WALLET",
            PaymentMethod::EWallet => "E-WALLET",
            PaymentMethod::RetailOutlet => "RETAIL_OUTLET",
            PaymentMethod::Senangpay => "SENANGPAY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREDIT_CARD" => Some(PaymentMethod::CreditCard),
            "BANK_TRANSFER" => Some(PaymentMethod::BankTransfer),
            "VIRTUAL_ACCOUNT" => Some(PaymentMethod::VirtualAccount),
            "QRIS" => Some(PaymentMethod::Qris),
            "GOPAY" => Some(PaymentMethod::Gopay),
            "K-WALLET" => Some(PaymentMethod::KWallet),
            "E-WALLET" => Some(PaymentMethod::EWallet),
            "RETAIL_OUTLET" => Some(PaymentMethod::RetailOutlet),
            "SENANGPAY" => Some(PaymentMethod::Senangpay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BankChannel {
    #[serde(rename = "BCA")]
    Bca,
    #[serde(rename = "BNI")]
    Bni,
    #[serde(rename = "BRI")]
    Bri,
    #[serde(rename = "CIMB")]
    Cimb,
    #[serde(rename = "MANDIRI")]
    Mandiri,
    #[serde(rename = "PERMATA")]
    Permata,
    #[serde(rename = "GOPAY")]
    Gopay,
    #[serde(rename = "SHOPEE")]
    Shopee,
    #[serde(rename = "SENANGPAY")]
    Senangpay,
    #[serde(rename = "DANAMON")]
    Danamon,
    #[serde(rename = "MAYBANK")]
    Maybank,
    #[serde(rename = "K-WALLET")]
    KWallet,
    #[serde(rename = "QRIS")]
    Qris,
    #[serde(rename = "DANA")]
    Dana,
}

impl BankChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankChannel::Bca => "BCA",
            BankChannel::Bni => "BNI",
            BankChannel::Bri => "BRI",
            BankChannel::Cimb => "CIMB",
            BankChannel::Mandiri => "MANDIRI",
            BankChannel::Permata => "PERMATA",
            BankChannel::Gopay => "GOPAY",
            BankChannel::Shopee => "SHOPEE",
            BankChannel::Senangpay => "SENANGPAY",
            BankChannel::Danamon => "DANAMON",
            BankChannel::Maybank => "MAYBANK",
            BankChannel::KWallet => "K-WALLET",
            BankChannel::Qris => "QRIS",
            BankChannel::Dana => "DANA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BCA" => Some(BankChannel::Bca),
            "BNI" => Some(BankChannel::Bni),
            "BRI" => Some(BankChannel::Bri),
            "CIMB" => Some(BankChannel::Cimb),
            "MANDIRI" => Some(BankChannel::Mandiri),
            "PERMATA" => Some(BankChannel::Permata),
            "GOPAY" => Some(BankChannel::Gopay),
            "SHOPEE" => Some(BankChannel::Shopee),
            "SENANGPAY" => Some(BankChannel::Senangpay),
            "DANAMON" => Some(BankChannel::Danamon),
            "MAYBANK" => Some(BankChannel::Maybank),
            "K-WALLET" => Some(BankChannel::KWallet),
            "QRIS" => Some(BankChannel::Qris),
            "DANA" => Some(BankChannel::Dana),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "IDR")]
    Idr,
    #[serde(rename = "MYR")]
    Myr,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Idr => "IDR",
            Currency::Myr => "MYR",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Idr => "Rp",
            Currency::Myr => "RM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "IDR" => Some(Currency::Idr),
            "MYR" => Some(Currency::Myr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Va,
    Redirect,
    Qris,
    Bill,
}

/// Inbound create-payment body. One request may carry several intents.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub payments: Vec<PaymentIntent>,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub reference_type: Option<String>,
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub order_id: String,
    pub amount: i64,
    pub channel: Vec<ChannelAllocation>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAllocation {
    pub id: i64,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub no_rekening: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusRequest {
    pub transaction_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl Customer {
    /// First token is the first name, the remainder the last name.
    pub fn split_name(&self) -> (String, String) {
        let mut parts = self.name.trim().splitn(2, ' ');
        let first = parts.next().unwrap_or_default().to_string();
        let last = parts.next().unwrap_or_default().trim().to_string();
        (first, last)
    }
}

/// Persisted canonical transaction record.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: i64,
    pub transaction_id: String,
    pub order_id: String,
    pub platform_id: i64,
    pub channel_id: i64,
    pub aggregator_id: Option<i64>,
    pub amount: Decimal,
    pub fee_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub customer: Customer,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub gateway_reference: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub return_url: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values needed to insert a payment row.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub transaction_id: String,
    pub order_id: String,
    pub platform_id: i64,
    pub channel_id: i64,
    pub aggregator_id: Option<i64>,
    pub amount: Decimal,
    pub fee_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub customer: Customer,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub gateway_reference: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub return_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}
