use crate::domain::payment::{BankChannel, Currency, PaymentMethod};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    None,
    Fixed,
    Percentage,
    FixedPercentage,
}

impl FeeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeType::None => "none",
            FeeType::Fixed => "fixed",
            FeeType::Percentage => "percentage",
            FeeType::FixedPercentage => "fixed_percentage",
        }
    }

    /// Unknown values fall back to `None`, matching how channels without a
    /// fee policy behave.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => FeeType::Fixed,
            "percentage" => FeeType::Percentage,
            "fixed_percentage" => FeeType::FixedPercentage,
            _ => FeeType::None,
        }
    }
}

/// `percentage_bp` is expressed in basis points of 10 000 (250 = 2.5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeePolicy {
    pub fee_type: FeeType,
    pub fixed_amount: Decimal,
    pub percentage_bp: Decimal,
}

impl FeePolicy {
    pub fn none() -> Self {
        Self {
            fee_type: FeeType::None,
            fixed_amount: Decimal::ZERO,
            percentage_bp: Decimal::ZERO,
        }
    }
}

/// Payment method offered by a platform. Read-only to the core.
#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub payment_method: PaymentMethod,
    pub currency: Currency,
    pub fee_policy: FeePolicy,
    pub is_active: bool,
    pub product_name: String,
    pub product_code: String,
    pub instruction: String,
    pub bank_name: Option<BankChannel>,
    pub bank_code: String,
}

impl Channel {
    pub fn is_wallet(&self) -> bool {
        self.payment_method == PaymentMethod::KWallet
    }
}
