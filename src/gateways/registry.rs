use crate::domain::channel::Channel;
use crate::domain::payment::{BankChannel, PaymentMethod};
use crate::error::PaymentError;
use crate::gateways::espay::{EspayCreditCard, EspayQris, EspayVirtualAccount};
use crate::gateways::midtrans::{MidtransAdapter, MidtransProduct};
use crate::gateways::senangpay::SenangpayAdapter;
use crate::gateways::{GatewayAdapter, HttpTransport};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregatorFamily {
    Espay,
    Midtrans,
    Senangpay,
}

impl AggregatorFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregatorFamily::Espay => "espay",
            AggregatorFamily::Midtrans => "midtrans",
            AggregatorFamily::Senangpay => "senangpay",
        }
    }

    pub fn parse_slug(slug: &str) -> Result<Self, ResolveError> {
        match slug.trim().to_ascii_lowercase().as_str() {
            "espay" => Ok(AggregatorFamily::Espay),
            "midtrans" => Ok(AggregatorFamily::Midtrans),
            "senangpay" => Ok(AggregatorFamily::Senangpay),
            _ => Err(ResolveError::UnknownAggregator(slug.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("unknown aggregator slug `{0}`")]
    UnknownAggregator(String),
    #[error("no {family} adapter for method {method} and bank {bank}")]
    NoAdapter {
        family: &'static str,
        method: &'static str,
        bank: String,
    },
}

impl From<ResolveError> for PaymentError {
    fn from(e: ResolveError) -> Self {
        PaymentError::Internal(e.to_string())
    }
}

/// Key shape inside one family, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterRoute {
    MethodBank(PaymentMethod, BankChannel),
    Bank(BankChannel),
    Method(PaymentMethod),
    Any,
}

/// Dispatch table keyed by aggregator family and route. Adding an adapter is
/// one `register` call.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    routes: HashMap<(AggregatorFamily, AdapterRoute), Arc<dyn GatewayAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        family: AggregatorFamily,
        route: AdapterRoute,
        adapter: Arc<dyn GatewayAdapter>,
    ) -> &mut Self {
        self.routes.insert((family, route), adapter);
        self
    }

    pub fn resolve_family(&self, slug: &str) -> Result<AggregatorFamily, ResolveError> {
        AggregatorFamily::parse_slug(slug)
    }

    pub fn resolve(
        &self,
        family: AggregatorFamily,
        method: PaymentMethod,
        bank: Option<BankChannel>,
    ) -> Result<Arc<dyn GatewayAdapter>, ResolveError> {
        let mut candidates = Vec::with_capacity(4);
        if let Some(bank) = bank {
            candidates.push(AdapterRoute::MethodBank(method, bank));
            candidates.push(AdapterRoute::Bank(bank));
        }
        candidates.push(AdapterRoute::Method(method));
        candidates.push(AdapterRoute::Any);

        candidates
            .into_iter()
            .find_map(|route| self.routes.get(&(family, route)).cloned())
            .ok_or_else(|| ResolveError::NoAdapter {
                family: family.as_str(),
                method: method.as_str(),
                bank: bank.map(|b| b.as_str().to_string()).unwrap_or_else(|| "-".to_string()),
            })
    }

    /// Both lookups in one call: slug to family, then channel to adapter.
    pub fn resolve_for(
        &self,
        slug: &str,
        channel: &Channel,
    ) -> Result<(AggregatorFamily, Arc<dyn GatewayAdapter>), ResolveError> {
        let family = self.resolve_family(slug)?;
        let adapter = self.resolve(family, channel.payment_method, channel.bank_name)?;
        Ok((family, adapter))
    }

    /// Every production adapter sharing one outbound client.
    pub fn standard(transport: HttpTransport) -> Self {
        let mut r = Self::new();

        r.register(
            AggregatorFamily::Espay,
            AdapterRoute::Method(PaymentMethod::VirtualAccount),
            Arc::new(EspayVirtualAccount { transport: transport.clone() }),
        );
        r.register(
            AggregatorFamily::Espay,
            AdapterRoute::Method(PaymentMethod::CreditCard),
            Arc::new(EspayCreditCard { transport: transport.clone() }),
        );
        r.register(
            AggregatorFamily::Espay,
            AdapterRoute::Method(PaymentMethod::Qris),
            Arc::new(EspayQris { transport: transport.clone() }),
        );

        let midtrans = |product| -> Arc<dyn GatewayAdapter> {
            Arc::new(MidtransAdapter::new(transport.clone(), product))
        };
        for method in [PaymentMethod::VirtualAccount, PaymentMethod::BankTransfer] {
            for bank in [BankChannel::Bca, BankChannel::Bni, BankChannel::Bri, BankChannel::Cimb] {
                r.register(
                    AggregatorFamily::Midtrans,
                    AdapterRoute::MethodBank(method, bank),
                    midtrans(MidtransProduct::BankTransfer(bank)),
                );
            }
            r.register(
                AggregatorFamily::Midtrans,
                AdapterRoute::MethodBank(method, BankChannel::Permata),
                midtrans(MidtransProduct::Permata),
            );
            r.register(
                AggregatorFamily::Midtrans,
                AdapterRoute::MethodBank(method, BankChannel::Mandiri),
                midtrans(MidtransProduct::Echannel),
            );
        }
        r.register(
            AggregatorFamily::Midtrans,
            AdapterRoute::Bank(BankChannel::Gopay),
            midtrans(MidtransProduct::Gopay),
        );
        r.register(
            AggregatorFamily::Midtrans,
            AdapterRoute::Bank(BankChannel::Shopee),
            midtrans(MidtransProduct::ShopeePay),
        );
        r.register(
            AggregatorFamily::Midtrans,
            AdapterRoute::Bank(BankChannel::Dana),
            midtrans(MidtransProduct::Dana),
        );
        r.register(
            AggregatorFamily::Midtrans,
            AdapterRoute::Method(PaymentMethod::Qris),
            midtrans(MidtransProduct::Qris),
        );

        r.register(
            AggregatorFamily::Senangpay,
            AdapterRoute::Any,
            Arc::new(SenangpayAdapter { transport }),
        );
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midtrans_mandiri_is_echannel() {
        let r = AdapterRegistry::standard(HttpTransport::new(1000));
        let a = r
            .resolve(AggregatorFamily::Midtrans, PaymentMethod::VirtualAccount, Some(BankChannel::Mandiri))
            .unwrap();
        assert_eq!(a.name(), "midtrans_echannel");
    }

    #[test]
    fn bank_route_wins_over_method() {
        let r = AdapterRegistry::standard(HttpTransport::new(1000));
        let a = r
            .resolve(AggregatorFamily::Midtrans, PaymentMethod::EWallet, Some(BankChannel::Shopee))
            .unwrap();
        assert_eq!(a.name(), "midtrans_shopeepay");
    }
}
