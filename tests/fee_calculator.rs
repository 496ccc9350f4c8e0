use kpay_orchestrator::domain::channel::{FeePolicy, FeeType};
use kpay_orchestrator::fee::{calculate, percentage_fee};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn policy(fee_type: FeeType, fixed: i64, bp: i64) -> FeePolicy {
    FeePolicy {
        fee_type,
        fixed_amount: Decimal::from(fixed),
        percentage_bp: Decimal::from(bp),
    }
}

#[test]
fn total_is_amount_plus_fee_for_charged_policies() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let amount = Decimal::from(rng.gen_range(0..10_000_000i64));
        let fixed = rng.gen_range(0..10_000i64);
        let bp = rng.gen_range(0..1_000i64);
        for fee_type in [FeeType::Fixed, FeeType::Percentage, FeeType::FixedPercentage] {
            let b = calculate(amount, &policy(fee_type, fixed, bp));
            assert_eq!(b.total, amount + b.fee);
            assert!(b.fee >= Decimal::ZERO);
        }
    }
}

#[test]
fn fixed_percentage_is_rounded_percentage_plus_fixed() {
    let b = calculate(dec!(100001), &policy(FeeType::FixedPercentage, 1_000, 250));
    assert_eq!(b.fee, percentage_fee(dec!(100001), dec!(250)) + dec!(1000));
    assert_eq!(b.fee, dec!(3501));
    assert_eq!(b.total, dec!(103502));
}

#[test]
fn percentage_rounds_up() {
    assert_eq!(percentage_fee(dec!(10), dec!(1)), dec!(1));
    assert_eq!(percentage_fee(dec!(0), dec!(250)), dec!(0));
}

#[test]
fn no_fee_policy_keeps_total_at_amount() {
    let b = calculate(dec!(75000), &policy(FeeType::None, 0, 0));
    assert_eq!(b.total, dec!(75000));
    assert_eq!(b.fee, dec!(0));
}
