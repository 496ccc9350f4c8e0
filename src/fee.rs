use crate::domain::channel::{FeePolicy, FeeType};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub total: Decimal,
    pub fee: Decimal,
}

/// Percentage part of a fee, rounded up to the next whole unit.
pub fn percentage_fee(amount: Decimal, percentage_bp: Decimal) -> Decimal {
    (amount * percentage_bp / dec!(10000)).ceil()
}

pub fn calculate(amount: Decimal, policy: &FeePolicy) -> FeeBreakdown {
    match policy.fee_type {
        FeeType::None => FeeBreakdown {
            total: amount,
            fee: policy.fixed_amount,
        },
        FeeType::Fixed => FeeBreakdown {
            total: amount + policy.fixed_amount,
            fee: policy.fixed_amount,
        },
        FeeType::Percentage => {
            let fee = percentage_fee(amount, policy.percentage_bp);
            FeeBreakdown {
                total: amount + fee,
                fee,
            }
        }
        FeeType::FixedPercentage => {
            let fee = percentage_fee(amount, policy.percentage_bp) + policy.fixed_amount;
            FeeBreakdown {
                total: amount + fee,
                fee,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_partial_units_up() {
        assert_eq!(percentage_fee(dec!(10001), dec!(100)), dec!(101));
        assert_eq!(percentage_fee(dec!(10000), dec!(100)), dec!(100));
        assert_eq!(percentage_fee(Decimal::ZERO, dec!(250)), Decimal::ZERO);
    }
}
