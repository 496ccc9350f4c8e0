#![allow(dead_code)]

use kpay_orchestrator::domain::channel::{Channel, FeePolicy, FeeType};
use kpay_orchestrator::domain::configuration::{ConfigJson, Environment, GatewayConfiguration};
use kpay_orchestrator::domain::payment::{BankChannel, Currency, PaymentMethod};
use kpay_orchestrator::domain::platform::Platform;
use kpay_orchestrator::domain::wallet::{KWallet, WalletStatus};
use kpay_orchestrator::gateways::registry::AdapterRegistry;
use kpay_orchestrator::gateways::HttpTransport;
use kpay_orchestrator::service::failover::FailoverOrchestrator;
use kpay_orchestrator::service::k_wallet_service::KWalletService;
use kpay_orchestrator::service::memory_store::MemoryStore;
use kpay_orchestrator::service::payment_service::PaymentService;
use kpay_orchestrator::service::reconciliation::Reconciler;
use kpay_orchestrator::service::store::PaymentStore;
use kpay_orchestrator::service::webhook_dispatcher::WebhookDispatcher;
use rust_decimal::Decimal;
use std::sync::Arc;

pub const PLATFORM_ID: i64 = 1;

pub fn platform() -> Platform {
    Platform {
        id: PLATFORM_ID,
        code: "KLIK".to_string(),
        name: "Klik Store".to_string(),
        api_key: "pk_test".to_string(),
        secret_key: "sk_test".to_string(),
        is_active: true,
        notification_url: None,
    }
}

pub fn channel(id: i64, method: PaymentMethod, bank: Option<BankChannel>, fee: FeePolicy) -> Channel {
    Channel {
        id,
        code: format!("CH-{id}"),
        name: format!("channel {id}"),
        payment_method: method,
        currency: Currency::Idr,
        fee_policy: fee,
        is_active: true,
        product_name: String::new(),
        product_code: String::new(),
        instruction: String::new(),
        bank_name: bank,
        bank_code: bank.map(|b| b.as_str().to_string()).unwrap_or_default(),
    }
}

pub fn fixed_fee(amount: i64) -> FeePolicy {
    FeePolicy {
        fee_type: FeeType::Fixed,
        fixed_amount: Decimal::from(amount),
        percentage_bp: Decimal::ZERO,
    }
}

pub fn configuration(id: i64, aggregator_id: i64, slug: &str) -> GatewayConfiguration {
    GatewayConfiguration {
        id,
        platform_id: PLATFORM_ID,
        aggregator_id,
        aggregator_slug: slug.to_string(),
        aggregator_name: slug.to_uppercase(),
        currency: Currency::Idr,
        environment: Environment::Sandbox,
        config_json: ConfigJson {
            sandbox_server_key: "server-key".to_string(),
            sandbox_secret_key: "secret-key".to_string(),
            return_url: "https://merchant.example/return".to_string(),
            ..Default::default()
        },
        is_active: true,
    }
}

pub fn wallet(member_id: &str, no_rekening: &str, balance: i64) -> KWallet {
    KWallet {
        id: 0,
        member_id: member_id.to_string(),
        full_name: "Budi Santoso".to_string(),
        no_rekening: no_rekening.to_string(),
        gen_va: no_rekening[no_rekening.len().saturating_sub(8)..].to_string(),
        balance: Decimal::from(balance),
        currency: Currency::Idr,
        status: WalletStatus::Active,
        version: 0,
        virtual_accounts: Vec::new(),
    }
}

/// Services wired against the in-memory store and the given registry.
pub fn services(store: Arc<MemoryStore>, registry: AdapterRegistry) -> (PaymentService, Reconciler) {
    let dyn_store: Arc<dyn PaymentStore> = store;
    let registry = Arc::new(registry);
    let reconciler = Reconciler {
        store: dyn_store.clone(),
        registry: registry.clone(),
        notifier: WebhookDispatcher::new(dyn_store.clone(), 1_000),
    };
    let service = PaymentService {
        store: dyn_store.clone(),
        failover: FailoverOrchestrator {
            store: dyn_store.clone(),
            registry,
            va_expiry_minutes: 180,
        },
        wallet: KWalletService {
            store: dyn_store,
            transport: HttpTransport::new(1_000),
        },
        reconciler: reconciler.clone(),
    };
    (service, reconciler)
}
