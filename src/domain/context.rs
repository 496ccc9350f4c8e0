use crate::domain::channel::Channel;
use crate::domain::payment::{CreatePaymentRequest, Customer, PaymentIntent};
use crate::domain::platform::Platform;
use crate::error::PaymentError;
use rust_decimal::Decimal;

/// One channel's share of an intent after intake validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCharge {
    pub channel_id: i64,
    pub amount: i64,
    pub no_rekening: Option<String>,
    /// True when the intent splits across more than one channel.
    pub split: bool,
}

/// Validates the split of an intent and returns the charges to run, in
/// order, stopping once the requested total is reached.
pub fn plan_charges(intent: &PaymentIntent) -> Result<Vec<PlannedCharge>, PaymentError> {
    if intent.order_id.trim().is_empty() {
        return Err(PaymentError::Validation("orderId is required".to_string()));
    }
    if intent.amount <= 0 {
        return Err(PaymentError::Validation("amount must be greater than zero".to_string()));
    }
    if intent.channel.is_empty() {
        return Err(PaymentError::Validation("at least one channel is required".to_string()));
    }

    if let [only] = intent.channel.as_slice() {
        if only.amount != 0 && only.amount != intent.amount {
            return Err(PaymentError::InvalidSplit(
                "channel amount must equal the payment amount".to_string(),
            ));
        }
        return Ok(vec![PlannedCharge {
            channel_id: only.id,
            amount: intent.amount,
            no_rekening: only.no_rekening.clone(),
            split: false,
        }]);
    }

    if intent.channel.iter().any(|c| c.amount <= 0) {
        return Err(PaymentError::InvalidSplit(
            "every channel of a split payment needs a positive amount".to_string(),
        ));
    }
    let allocated = intent
        .channel
        .iter()
        .try_fold(0i64, |acc, c| acc.checked_add(c.amount))
        .ok_or_else(|| PaymentError::InvalidSplit("channel amounts exceed the payment amount".to_string()))?;
    if allocated > intent.amount {
        return Err(PaymentError::InvalidSplit(
            "channel amounts exceed the payment amount".to_string(),
        ));
    }
    if allocated != intent.amount {
        return Err(PaymentError::InvalidSplit(
            "channel amounts must add up to the payment amount".to_string(),
        ));
    }

    let mut running = 0i64;
    let mut charges = Vec::new();
    for c in &intent.channel {
        if running == intent.amount {
            break;
        }
        running += c.amount;
        charges.push(PlannedCharge {
            channel_id: c.id,
            amount: c.amount,
            no_rekening: c.no_rekening.clone(),
            split: true,
        });
    }
    Ok(charges)
}

/// Immutable per-charge input shared by the wallet path and the failover
/// orchestrator.
#[derive(Debug, Clone)]
pub struct PaymentContext {
    pub platform: Platform,
    pub channel: Channel,
    pub order_id: String,
    pub amount: Decimal,
    pub customer: Customer,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub return_url: Option<String>,
    pub no_rekening: Option<String>,
    pub split: bool,
}

pub fn build_context(
    req: &CreatePaymentRequest,
    intent: &PaymentIntent,
    charge: &PlannedCharge,
    platform: &Platform,
    channel: &Channel,
) -> PaymentContext {
    PaymentContext {
        platform: platform.clone(),
        channel: channel.clone(),
        order_id: intent.order_id.clone(),
        amount: Decimal::from(charge.amount),
        customer: Customer {
            id: req.customer_id.clone(),
            name: req.customer_name.clone(),
            email: req.customer_email.clone(),
            phone: req.customer_phone.clone(),
        },
        reference_id: req.reference_id.clone(),
        reference_type: req.reference_type.clone(),
        return_url: req.return_url.clone(),
        no_rekening: charge.no_rekening.clone(),
        split: charge.split,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::ChannelAllocation;

    fn intent(amount: i64, channels: &[(i64, i64)]) -> PaymentIntent {
        PaymentIntent {
            order_id: "ORD-1".to_string(),
            amount,
            channel: channels
                .iter()
                .map(|(id, amount)| ChannelAllocation {
                    id: *id,
                    amount: *amount,
                    no_rekening: None,
                })
                .collect(),
        }
    }

    #[test]
    fn single_channel_takes_full_amount() {
        let plan = plan_charges(&intent(30_000, &[(1, 0)])).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].amount, 30_000);
        assert!(!plan[0].split);
    }

    #[test]
    fn split_must_sum_to_total() {
        let err = plan_charges(&intent(30_000, &[(1, 10_000), (2, 10_000)])).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSplit(_)));
    }

    #[test]
    fn split_over_total_is_rejected() {
        let err = plan_charges(&intent(30_000, &[(1, 20_000), (2, 20_000)])).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSplit(_)));
    }

    #[test]
    fn valid_split_keeps_channel_order() {
        let plan = plan_charges(&intent(30_000, &[(4, 20_000), (9, 10_000)])).unwrap();
        assert_eq!(plan.iter().map(|c| c.channel_id).collect::<Vec<_>>(), vec![4, 9]);
        assert!(plan.iter().all(|c| c.split));
    }

    #[test]
    fn overflowing_allocations_are_an_invalid_split() {
        let err = plan_charges(&intent(100, &[(1, i64::MAX), (2, 2)])).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSplit(_)));
    }
}
